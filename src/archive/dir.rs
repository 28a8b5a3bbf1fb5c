use super::{ArchiveStore, EntryTable};
use crate::common;
use crate::KilnError;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A plain directory exposed as a store.
///
/// Entry names are `/`-separated paths relative to the directory. Only names
/// produced by the listing are ever read back, so extraction cannot reach
/// outside the mounted root.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    table: EntryTable,
}

impl DirStore {
    pub fn open(root: &Path) -> Result<Self, KilnError> {
        if !root.is_dir() {
            return Err(KilnError::UnsupportedMount { path: root.to_path_buf() });
        }
        let mut table = EntryTable::default();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !common::is_hidden(&e.file_name().to_string_lossy()));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else { continue };
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            table.push(common::normalize_path(&rel.to_string_lossy()), size as u32);
        }
        Ok(Self { root: root.to_path_buf(), table })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveStore for DirStore {
    table_listing!();

    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError> {
        let Some(entry) = self.table.get(index) else {
            return Err(KilnError::io(
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no entry #{index}")),
                &self.root,
            ));
        };
        let path = self.root.join(&entry.name);
        std::fs::read(&path).map_err(|e| KilnError::io(e, path))
    }
}
