//! The `SGS.` archive container: a flat index of named, optionally
//! dictionary-compressed entries.

use crate::error::{CoreError, Result};
use crate::fsutil::{ensure_parent_dir, relative_slash_path, PathWalker};
use crate::lzw;
use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, warn};
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"SGS.";
const VERSION_TAG: &[u8; 8] = b"DAT 1.00";
const NAME_LEN: usize = 16;
const ENTRY_LEN: usize = 0x20;
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_packed: bool,
    pub stored_size: u32,
    pub unpacked_size: u32,
    pub offset: u32,
}

#[derive(Debug)]
pub struct Archive {
    pub entries: Vec<ArchiveEntry>,
    data: Vec<u8>,
}

impl Archive {
    /// Parses the header and index of an in-memory archive image.
    ///
    /// The payload bytes stay where they are in `data`; entries are read out
    /// lazily by [`Archive::extract_entry`].
    pub fn unpack(data: Vec<u8>) -> Result<Self> {
        if data.len() < HEADER_LEN || &data[0..4] != MAGIC.as_slice() {
            return Err(CoreError::BadMagic {
                expected: MAGIC.to_vec(),
                got: data.get(0..4).unwrap_or(&[]).to_vec(),
            });
        }
        if &data[4..12] != VERSION_TAG.as_slice() {
            return Err(CoreError::BadMagic {
                expected: VERSION_TAG.to_vec(),
                got: data[4..12].to_vec(),
            });
        }

        let count = u32::from_le_bytes(data[12..16].try_into().unwrap()) as usize;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let base = HEADER_LEN + ENTRY_LEN * i;
            if base + ENTRY_LEN > data.len() {
                return Err(CoreError::Truncated {
                    expected: base + ENTRY_LEN,
                    got: data.len(),
                });
            }
            let raw_name = &data[base..base + NAME_LEN];
            let nul = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            let name = String::from_utf8_lossy(&raw_name[..nul]).into_owned();

            let is_packed = data[base + 0x13] != 0;
            let stored_size = u32::from_le_bytes(data[base + 0x14..base + 0x18].try_into().unwrap());
            let unpacked_size = u32::from_le_bytes(data[base + 0x18..base + 0x1C].try_into().unwrap());
            let offset = u32::from_le_bytes(data[base + 0x1C..base + 0x20].try_into().unwrap());

            if offset as u64 + stored_size as u64 > data.len() as u64 {
                return Err(CoreError::BadPlacement {
                    offset: offset as u64,
                    size: stored_size as u64,
                    length: data.len() as u64,
                });
            }

            entries.push(ArchiveEntry {
                name,
                is_packed,
                stored_size,
                unpacked_size,
                offset,
            });
        }

        Ok(Archive { entries, data })
    }

    /// Returns the decompressed bytes of a single entry.
    pub fn extract_entry(&self, entry: &ArchiveEntry) -> Vec<u8> {
        let start = entry.offset as usize;
        let end = start + entry.stored_size as usize;
        let stored = &self.data[start..end];
        if entry.is_packed {
            lzw::decode(stored, entry.unpacked_size as usize)
        } else {
            stored.to_vec()
        }
    }

    /// Extracts every entry to `out_dir`, recreating subdirectories implied
    /// by forward slashes in entry names.
    pub fn extract_all(&self, out_dir: &Path) -> Result<()> {
        for entry in &self.entries {
            let bytes = self.extract_entry(entry);
            let out_path = out_dir.join(&entry.name);
            ensure_parent_dir(&out_path)?;
            fs::write(&out_path, &bytes)?;
            debug!("extracted {} ({} bytes)", entry.name, bytes.len());
        }
        Ok(())
    }

    /// Packs every regular file under `in_dir` into a new archive image.
    ///
    /// Names are truncated to 16 bytes with no attempt at preserving an
    /// extension if that truncates it away, matching the original tool.
    pub fn pack(in_dir: &Path, compress: bool) -> Result<Vec<u8>> {
        let mut records: Vec<(String, Vec<u8>)> = Vec::new();
        for file in PathWalker::new(in_dir)? {
            let file = file?;
            let rel = relative_slash_path(in_dir, &file);
            let bytes = fs::read(&file)?;
            if rel.len() > NAME_LEN {
                warn!("entry name {rel:?} exceeds {NAME_LEN} bytes and will be truncated");
            }
            records.push((rel, bytes));
        }

        let mut entries = Vec::with_capacity(records.len());
        let mut payload = Vec::new();
        let data_base = HEADER_LEN + ENTRY_LEN * records.len();
        let mut offset = data_base as u32;

        for (name, bytes) in &records {
            let unpacked_size = bytes.len() as u32;
            let stored = if compress { lzw::encode(bytes) } else { bytes.clone() };
            let stored_size = stored.len() as u32;
            entries.push(ArchiveEntry {
                name: truncate_name(name),
                is_packed: compress,
                stored_size,
                unpacked_size,
                offset,
            });
            offset += stored_size;
            payload.extend_from_slice(&stored);
        }

        let mut out = Vec::with_capacity(data_base + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(VERSION_TAG);
        out.write_u32::<LittleEndian>(entries.len() as u32)?;

        for entry in &entries {
            let mut name_bytes = [0u8; NAME_LEN];
            let raw = entry.name.as_bytes();
            let n = raw.len().min(NAME_LEN);
            name_bytes[..n].copy_from_slice(&raw[..n]);
            out.extend_from_slice(&name_bytes);
            out.extend_from_slice(&[0u8; 3]); // reserved
            out.push(entry.is_packed as u8);
            out.write_u32::<LittleEndian>(entry.stored_size)?;
            out.write_u32::<LittleEndian>(entry.unpacked_size)?;
            out.write_u32::<LittleEndian>(entry.offset)?;
        }
        out.write_all(&payload)?;

        Ok(out)
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= NAME_LEN {
        return name.to_string();
    }
    // Truncate on a char boundary at or before NAME_LEN bytes.
    let mut end = NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn round_trips_two_uncompressed_entries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut f = fs::File::create(dir.path().join("sub/b.bin")).unwrap();
        f.write_all(&[0x00, 0xFF]).unwrap();
        drop(f);

        let packed = Archive::pack(dir.path(), false).unwrap();
        // 16-byte fixed header (magic + version tag + count) + 2 * 32-byte
        // index entries + 5 + 2 payload bytes.
        assert_eq!(packed.len(), 16 + 2 * ENTRY_LEN + 5 + 2);

        let archive = Archive::unpack(packed).unwrap();
        assert_eq!(archive.entries.len(), 2);

        let out_dir = tempdir().unwrap();
        archive.extract_all(out_dir.path()).unwrap();
        assert_eq!(fs::read(out_dir.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(
            fs::read(out_dir.path().join("sub/b.bin")).unwrap(),
            vec![0x00, 0xFF]
        );
    }

    #[test]
    fn round_trips_compressed_entries() {
        let dir = tempdir().unwrap();
        let payload = vec![42u8; 2000];
        fs::write(dir.path().join("big.bin"), &payload).unwrap();

        let packed = Archive::pack(dir.path(), true).unwrap();
        let archive = Archive::unpack(packed).unwrap();
        let extracted = archive.extract_entry(&archive.entries[0]);
        assert_eq!(extracted, payload);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = vec![0u8; 32];
        match Archive::unpack(bytes) {
            Err(CoreError::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }
}
