use anyhow::Context;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ArcAction {
    /// Unpack an archive into a directory, decompressing packed entries.
    Extract {
        archive: PathBuf,
        out_dir: PathBuf,
    },
    /// Pack a directory tree into a new archive.
    Pack {
        in_dir: PathBuf,
        archive: PathBuf,

        /// Compress entries with the dictionary-window codec.
        #[clap(short, long)]
        compress: bool,
    },
}

impl ArcAction {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            ArcAction::Extract { archive, out_dir } => extract(archive, out_dir),
            ArcAction::Pack {
                in_dir,
                archive,
                compress,
            } => pack(in_dir, archive, *compress),
        }
    }
}

fn extract(archive_path: &std::path::Path, out_dir: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("reading archive {}", archive_path.display()))?;
    let archive = sgs_core::arc::Archive::unpack(bytes)
        .with_context(|| format!("parsing archive {}", archive_path.display()))?;
    log::info!("{} entries", archive.entries.len());
    archive
        .extract_all(out_dir)
        .with_context(|| format!("extracting to {}", out_dir.display()))?;
    Ok(())
}

fn pack(in_dir: &std::path::Path, archive_path: &std::path::Path, compress: bool) -> anyhow::Result<()> {
    let bytes = sgs_core::arc::Archive::pack(in_dir, compress)
        .with_context(|| format!("packing {}", in_dir.display()))?;
    std::fs::write(archive_path, &bytes)
        .with_context(|| format!("writing archive {}", archive_path.display()))?;
    log::info!("wrote {} bytes to {}", bytes.len(), archive_path.display());
    Ok(())
}
