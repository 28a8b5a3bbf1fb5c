use super::{ArchiveStore, EntryTable};
use crate::KilnError;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Read-only view of a zip archive.
pub struct ZipStore {
    path: PathBuf,
    archive: ZipArchive<File>,
    table: EntryTable,
}

impl std::fmt::Debug for ZipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipStore")
            .field("path", &self.path)
            .field("entries", &self.table.len())
            .finish()
    }
}

impl ZipStore {
    pub fn open(path: &Path) -> Result<Self, KilnError> {
        let file = File::open(path).map_err(|e| KilnError::io(e, path))?;
        let mut archive = ZipArchive::new(file).map_err(|e| KilnError::zip(e, path))?;
        let mut table = EntryTable::default();
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| KilnError::zip(e, path))?;
            if entry.is_dir() {
                // Keep indices aligned with the archive; directories are empty.
                table.push(entry.name().to_string(), 0);
                continue;
            }
            table.push(entry.name().to_string(), entry.size() as u32);
        }
        Ok(Self { path: path.to_path_buf(), archive, table })
    }
}

impl ArchiveStore for ZipStore {
    table_listing!();

    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError> {
        let mut entry = self
            .archive
            .by_index(index as usize)
            .map_err(|e| KilnError::zip(e, &self.path))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data).map_err(|e| KilnError::io(e, &self.path))?;
        Ok(data)
    }
}
