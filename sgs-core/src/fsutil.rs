//! Recursive, sorted directory walking used by archive packing and script
//! batch export/import.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A depth-first, name-sorted walk over every regular file under `root`.
///
/// Sorting keeps archive-packing order and batch processing order
/// deterministic across platforms, which matters for byte-exact round trips.
pub struct PathWalker {
    pending_dirs: Vec<PathBuf>,
    pending_files: Vec<PathBuf>,
}

impl PathWalker {
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut walker = PathWalker {
            pending_dirs: vec![],
            pending_files: vec![],
        };
        if root.is_dir() {
            walker.pending_dirs.push(root);
        } else {
            walker.pending_files.push(root);
        }
        walker.fill()?;
        Ok(walker)
    }

    fn fill(&mut self) -> io::Result<()> {
        while self.pending_files.is_empty() && !self.pending_dirs.is_empty() {
            let dir = self.pending_dirs.remove(0);
            let mut entries: Vec<_> = fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
            entries.sort_by_key(|e| e.path());
            for entry in entries {
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    self.pending_dirs.push(path);
                } else if file_type.is_file() {
                    self.pending_files.push(path);
                }
            }
        }
        Ok(())
    }
}

impl Iterator for PathWalker {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending_files.is_empty() {
            if let Err(e) = self.fill() {
                return Some(Err(e));
            }
        }
        if self.pending_files.is_empty() {
            None
        } else {
            Some(Ok(self.pending_files.remove(0)))
        }
    }
}

/// `path`, relative to `root`, with components joined by `/` regardless of
/// the host platform's path separator.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Creates `out_dir / name`'s parent directories, where `name` may contain
/// forward slashes denoting subdirectories.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
