use super::{ArchiveStore, EntryTable};
use crate::common;
use crate::KilnError;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Smallest well-formed tar stream: one 512-byte header block.
const TAR_BLOCK: u64 = 512;

/// Read-only view of an uncompressed tar archive.
///
/// Only regular files are listed. The data offset of every entry is recorded
/// while listing so extraction can seek straight to it.
#[derive(Debug)]
pub struct TarStore {
    path: PathBuf,
    offsets: Vec<u64>,
    table: EntryTable,
}

impl TarStore {
    pub fn open(path: &Path) -> Result<Self, KilnError> {
        let file = File::open(path).map_err(|e| KilnError::io(e, path))?;
        let len = file.metadata().map_err(|e| KilnError::io(e, path))?.len();
        if len < TAR_BLOCK {
            return Err(KilnError::io(
                std::io::Error::new(std::io::ErrorKind::InvalidData, "too short for a tar archive"),
                path,
            ));
        }

        let mut archive = tar::Archive::new(file);
        let mut offsets = Vec::new();
        let mut table = EntryTable::default();
        for entry in archive.entries().map_err(|e| KilnError::io(e, path))? {
            let entry = entry.map_err(|e| KilnError::io(e, path))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(|e| KilnError::io(e, path))?;
            let name = common::normalize_path(&name.to_string_lossy());
            offsets.push(entry.raw_file_position());
            table.push(name, entry.size() as u32);
        }
        Ok(Self { path: path.to_path_buf(), offsets, table })
    }
}

impl ArchiveStore for TarStore {
    table_listing!();

    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError> {
        let offset = self.offsets.get(index as usize).copied().ok_or_else(|| {
            KilnError::io(
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no entry #{index}")),
                &self.path,
            )
        })?;
        let size = self.size(index) as u64;
        let mut file = File::open(&self.path).map_err(|e| KilnError::io(e, &self.path))?;
        file.seek(SeekFrom::Start(offset)).map_err(|e| KilnError::io(e, &self.path))?;
        let mut data = Vec::with_capacity(size as usize);
        file.take(size).read_to_end(&mut data).map_err(|e| KilnError::io(e, &self.path))?;
        Ok(data)
    }
}
