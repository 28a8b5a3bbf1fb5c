//! # Archive Stores
//!
//! A uniform read interface over the four mountable backends: zip and tar
//! archives, the lightweight `PACK` container and plain directories.
//!
//! Every backend lists its entries once when opened into an [`EntryTable`]
//! and then answers `count`/`name`/`size`/`extract` by index. The [`Store`]
//! enum is the dispatch point used by the virtual filesystem, so call sites
//! never branch on the format themselves.
//!
//! The zip backend doubles as the cooker's asset database, see [`cookdb`].

/// Implements the listing half of [`ArchiveStore`] for a backend that keeps
/// its entries in a `table: EntryTable` field.
macro_rules! table_listing {
    () => {
        fn count(&self) -> u32 {
            self.table.len()
        }

        fn name(&self, index: u32) -> Option<&str> {
            self.table.get(index).map(|e| e.name.as_str())
        }

        fn size(&self, index: u32) -> u32 {
            self.table.get(index).map(|e| e.size).unwrap_or(0)
        }

        fn find(&self, name: &str) -> Option<u32> {
            self.table.find(name)
        }
    };
}

pub mod cookdb;
mod dir;
mod pak;
mod tar_store;
mod zip_store;

pub use dir::DirStore;
pub use pak::{PakStore, PakWriter};
pub use tar_store::TarStore;
pub use zip_store::ZipStore;

use crate::KilnError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Backend kind of a mounted store, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountKind {
    Zip,
    Tar,
    Pack,
    Directory,
}

/// Read capability shared by every backend.
pub trait ArchiveStore {
    /// Number of entries, including duplicates and tombstones.
    fn count(&self) -> u32;

    /// Stored name of the entry at `index`.
    fn name(&self, index: u32) -> Option<&str>;

    /// Uncompressed size of the entry at `index`, `0` when out of range.
    fn size(&self, index: u32) -> u32;

    /// Reads the whole entry into an owned buffer.
    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError>;

    /// Index of the latest entry stored under `name`.
    fn find(&self, name: &str) -> Option<u32>;
}

/// One listed entry of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub size: u32,
}

/// Entry listing plus a name index; later duplicates shadow earlier ones.
#[derive(Debug, Default, Clone)]
pub struct EntryTable {
    entries: Vec<StoredEntry>,
    by_name: HashMap<String, u32>,
}

impl EntryTable {
    pub fn push(&mut self, name: String, size: u32) -> u32 {
        let index = self.entries.len() as u32;
        self.by_name.insert(name.clone(), index);
        self.entries.push(StoredEntry { name, size });
        index
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&StoredEntry> {
        self.entries.get(index as usize)
    }

    pub fn find(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}

/// Tagged union over the concrete backends.
#[derive(Debug)]
pub enum Store {
    Zip(ZipStore),
    Tar(TarStore),
    Pack(PakStore),
    Directory(DirStore),
}

impl Store {
    /// Opens `path` as a store.
    ///
    /// A trailing path separator designates a directory; anything else is
    /// tried as zip, then tar, then pak, and the first backend that accepts
    /// it wins.
    pub fn open(path: &str) -> Result<Store, KilnError> {
        if path.ends_with('/') || path.ends_with('\\') {
            return DirStore::open(Path::new(path)).map(Store::Directory);
        }
        let file = Path::new(path);
        if let Ok(store) = ZipStore::open(file) {
            return Ok(Store::Zip(store));
        }
        if let Ok(store) = TarStore::open(file) {
            return Ok(Store::Tar(store));
        }
        if let Ok(store) = PakStore::open(file) {
            return Ok(Store::Pack(store));
        }
        Err(KilnError::UnsupportedMount { path: file.to_path_buf() })
    }

    pub fn kind(&self) -> MountKind {
        match self {
            Store::Zip(_) => MountKind::Zip,
            Store::Tar(_) => MountKind::Tar,
            Store::Pack(_) => MountKind::Pack,
            Store::Directory(_) => MountKind::Directory,
        }
    }

    fn inner(&self) -> &dyn ArchiveStore {
        match self {
            Store::Zip(s) => s,
            Store::Tar(s) => s,
            Store::Pack(s) => s,
            Store::Directory(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ArchiveStore {
        match self {
            Store::Zip(s) => s,
            Store::Tar(s) => s,
            Store::Pack(s) => s,
            Store::Directory(s) => s,
        }
    }
}

impl ArchiveStore for Store {
    fn count(&self) -> u32 {
        self.inner().count()
    }

    fn name(&self, index: u32) -> Option<&str> {
        self.inner().name(index)
    }

    fn size(&self, index: u32) -> u32 {
        self.inner().size(index)
    }

    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError> {
        self.inner_mut().extract(index)
    }

    fn find(&self, name: &str) -> Option<u32> {
        self.inner().find(name)
    }
}
