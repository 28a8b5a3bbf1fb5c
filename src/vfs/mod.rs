//! # Virtual Filesystem
//!
//! A stack of mounted stores searched most-recent-first, plus one flat index
//! of every entry ever mounted. Requests are matched loosely through
//! [`file_id`], so `textures/rock_diffuse.tga` can find a stored
//! `assets/textures/diffuse_rock.png`.
//!
//! A [`VfsContext`] is not synchronized. Mount during start-up, then read.

mod id;

pub use id::file_id;

use crate::archive::{ArchiveStore, MountKind, Store};
use crate::cache::ContentCache;
use crate::common;
use crate::config::KilnConfig;
use crate::KilnError;

use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;

/// One entry of the flat index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VfsEntry {
    /// Name as stored in its mount.
    pub name: String,
    pub id: String,
    pub size: u32,
}

/// A mounted store and the path prefix requests are relative to.
#[derive(Debug)]
pub struct MountEntry {
    path: String,
    prefix: String,
    store: Store,
}

impl MountEntry {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Leading part of a request that is removed before lookup: the
    /// archive's parent directory, or the directory itself.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn kind(&self) -> MountKind {
        self.store.kind()
    }

    pub fn entry_count(&self) -> u32 {
        self.store.count()
    }

    fn local_name<'a>(&self, request: &'a str) -> &'a str {
        let p = self.prefix.len();
        let rest = match request.get(..p) {
            Some(head) if p > 0 && head.eq_ignore_ascii_case(&self.prefix) => &request[p..],
            _ => request,
        };
        rest.trim_start_matches('/')
    }
}

/// Mount stack, entry index, last-item memo and content cache.
#[derive(Debug)]
pub struct VfsContext {
    /// Oldest first; searched in reverse.
    mounts: Vec<MountEntry>,
    entries: Vec<VfsEntry>,
    cache: ContentCache,
    last: Option<(String, Arc<[u8]>)>,
}

impl Default for VfsContext {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_CAPACITY)
    }
}

impl VfsContext {
    pub fn new(cache_capacity: usize) -> Self {
        Self { mounts: Vec::new(), entries: Vec::new(), cache: ContentCache::new(cache_capacity), last: None }
    }

    pub fn with_config(config: &KilnConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    /// Mounts an archive or, when `path` ends with a separator, a directory.
    ///
    /// Mounting the same path twice adds its entries twice.
    pub fn mount(&mut self, path: &str) -> Result<MountKind, KilnError> {
        let mut path = path;
        while let Some(rest) = path.strip_prefix("./") {
            path = rest;
        }
        let store = Store::open(path)?;
        let kind = store.kind();
        let prefix = common::normalize_path(common::file_dir(path));

        let before = self.entries.len();
        for index in 0..store.count() {
            let Some(name) = store.name(index) else { continue };
            self.entries.push(VfsEntry { name: name.to_string(), id: file_id(name), size: store.size(index) });
        }
        tracing::info!(path, ?kind, entries = self.entries.len() - before, "mounted");

        self.mounts.push(MountEntry { path: path.to_string(), prefix, store });
        Ok(kind)
    }

    /// Best stored name for a loosely written request.
    ///
    /// Absolute and drive-letter paths are returned unchanged, as is any
    /// request that matches nothing.
    pub fn resolve<'a>(&'a self, fuzzy: &'a str) -> &'a str {
        if common::is_absolute_like(fuzzy) {
            return fuzzy;
        }
        let id = file_id(fuzzy);
        self.entries
            .iter()
            .rev()
            .find(|e| e.id.starts_with(&id))
            .map(|e| e.name.as_str())
            .unwrap_or(fuzzy)
    }

    /// Loads a file through the VFS.
    ///
    /// Order: absolute paths straight from disk, then the last loaded item,
    /// then the content cache, then the mounts most-recent-first. A miss is
    /// `None`, never an error.
    pub fn load(&mut self, path: &str) -> Option<Arc<[u8]>> {
        if common::is_absolute_like(path) {
            return match std::fs::read(path) {
                Ok(data) => Some(Arc::from(data)),
                Err(e) => {
                    tracing::debug!(path, error = %e, "not found on disk");
                    None
                }
            };
        }

        // Material references look like "dir/shader+diffuse.png".
        let base = common::file_name(path);
        let base = base.split_once('+').map(|(_, rest)| rest).unwrap_or(base);
        let request = format!("{}{}", common::file_dir(path), base);

        let mut key = self.resolve(&request).to_string();
        while let Some(rest) = key.strip_prefix("./") {
            key = rest.to_string();
        }
        let key = key.trim_start_matches('/').to_string();
        tracing::trace!(path, resolved = %key, "loading");

        if let Some((last_key, data)) = &self.last {
            if last_key.eq_ignore_ascii_case(&key) {
                return Some(Arc::clone(data));
            }
        }

        let data = match self.cache.lookup(&key) {
            Some(data) => {
                tracing::trace!(key = %key, "cache hit");
                Some(data)
            }
            None => {
                let data = self.unpack(&key);
                match &data {
                    Some(bytes) => {
                        self.cache.insert(key.clone(), Arc::clone(bytes));
                    }
                    None => tracing::debug!(key = %key, "not found"),
                }
                data
            }
        };

        if let Some(bytes) = &data {
            self.last = Some((key, Arc::clone(bytes)));
        }
        data
    }

    /// Walks the mounts most-recent-first. Zero-length entries are
    /// tombstones left by a cook pass and never shadow older data.
    fn unpack(&mut self, key: &str) -> Option<Arc<[u8]>> {
        for mount in self.mounts.iter_mut().rev() {
            let name = mount.local_name(key).to_string();
            let Some(index) = mount.store.find(&name) else { continue };
            if mount.store.size(index) == 0 {
                tracing::trace!(mount = %mount.path, entry = %name, "skipping empty entry");
                continue;
            }
            match mount.store.extract(index) {
                Ok(data) if data.is_empty() => continue,
                Ok(data) => return Some(Arc::from(data)),
                Err(e) => tracing::warn!(mount = %mount.path, entry = %name, error = %e, "extract failed"),
            }
        }
        None
    }

    /// Size of a file, `0` when it cannot be loaded.
    pub fn size(&mut self, path: &str) -> usize {
        self.load(path).map(|d| d.len()).unwrap_or(0)
    }

    /// Loads a file as text, replacing invalid UTF-8.
    pub fn read_to_string(&mut self, path: &str) -> Option<String> {
        self.load(path).map(|d| String::from_utf8_lossy(&d).into_owned())
    }

    /// In-memory reader over a file; empty when the file cannot be loaded.
    pub fn handle(&mut self, path: &str) -> Cursor<Arc<[u8]>> {
        Cursor::new(self.load(path).unwrap_or_else(|| Arc::from(&b""[..])))
    }

    /// Every entry ever mounted, in mount order.
    pub fn entries(&self) -> &[VfsEntry] {
        &self.entries
    }

    /// Mounts, most recent first.
    pub fn mounts(&self) -> impl Iterator<Item = &MountEntry> {
        self.mounts.iter().rev()
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::PakWriter;
    use std::io::{Read, Write};
    use std::path::Path;
    use tempfile::tempdir;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, data) in files {
            zip.start_file(*name, zip::write::FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn dir_mount(path: &Path) -> String {
        format!("{}/", path.display())
    }

    #[test]
    fn later_mounts_win() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.zip");
        let b = dir.path().join("b.zip");
        write_zip(&a, &[("x_y.txt", &b"from a"[..])]);
        write_zip(&b, &[("y_x.txt", &b"from b"[..])]);

        let mut vfs = VfsContext::default();
        assert_eq!(vfs.mount(&a.to_string_lossy()).unwrap(), MountKind::Zip);
        vfs.mount(&b.to_string_lossy()).unwrap();

        assert_eq!(vfs.resolve("x_y.txt"), "y_x.txt");
        assert_eq!(vfs.load("x_y.txt").as_deref(), Some(&b"from b"[..]));
        assert_eq!(vfs.mounts().next().unwrap().path(), b.to_string_lossy());
    }

    #[test]
    fn empty_entries_fall_through_to_older_mounts() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.zip");
        let new = dir.path().join("new.zip");
        write_zip(&old, &[("assets/c.txt", &b"payload c"[..])]);
        write_zip(&new, &[("assets/c.txt", &b""[..]), ("assets/gone.txt", &b""[..])]);

        let mut vfs = VfsContext::default();
        vfs.mount(&old.to_string_lossy()).unwrap();
        vfs.mount(&new.to_string_lossy()).unwrap();

        assert_eq!(vfs.load("assets/c.txt").as_deref(), Some(&b"payload c"[..]));
        assert!(vfs.load("assets/gone.txt").is_none());
        assert_eq!(vfs.size("assets/gone.txt"), 0);
    }

    #[test]
    fn fuzzy_names_collapse_to_one_entry() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dir")).unwrap();
        std::fs::write(dir.path().join("dir/file_name.png"), b"pixels").unwrap();

        let mut vfs = VfsContext::default();
        vfs.mount(&dir_mount(dir.path())).unwrap();
        assert_eq!(vfs.resolve("dir/file_name.png"), "dir/file_name.png");
        assert_eq!(vfs.resolve("dir/name_file.tga"), "dir/file_name.png");
        assert_eq!(vfs.load("dir/name_file.tga").as_deref(), Some(&b"pixels"[..]));
    }

    #[test]
    fn absolute_paths_bypass_the_index() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("loose.txt");
        std::fs::write(&file, b"disk").unwrap();

        let mut vfs = VfsContext::default();
        vfs.mount(&dir_mount(dir.path())).unwrap();
        let abs = file.to_string_lossy().into_owned();
        assert_eq!(vfs.resolve(&abs), abs);
        assert_eq!(vfs.resolve("C:/games/loose.txt"), "C:/games/loose.txt");
        assert_eq!(vfs.load(&abs).as_deref(), Some(&b"disk"[..]));
    }

    #[test]
    fn misses_are_not_errors() {
        let mut vfs = VfsContext::default();
        assert_eq!(vfs.resolve("nothing/here.txt"), "nothing/here.txt");
        assert!(vfs.load("nothing/here.txt").is_none());
        assert_eq!(vfs.size("nothing/here.txt"), 0);
        let mut out = Vec::new();
        vfs.handle("nothing/here.txt").read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn archive_parent_prefix_and_material_garbage_are_stripped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let pak = dir.path().join("data/base.pak");
        let mut writer = PakWriter::new();
        writer.add("shaders/lit.fs", b"void main(){}".to_vec());
        writer.write_to(&pak).unwrap();

        let mut vfs = VfsContext::default();
        let mount = pak.to_string_lossy().into_owned();
        assert_eq!(vfs.mount(&mount).unwrap(), MountKind::Pack);
        assert_eq!(vfs.mounts().next().unwrap().prefix(), format!("{}/", dir.path().join("data").display()));

        assert_eq!(vfs.read_to_string("shaders/lit.fs").as_deref(), Some("void main(){}"));
        assert_eq!(vfs.size("shaders/phong+lit.fs"), 13);
    }

    #[test]
    fn repeated_mounts_duplicate_entries() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let mut vfs = VfsContext::default();
        vfs.mount(&dir_mount(dir.path())).unwrap();
        vfs.mount(&dir_mount(dir.path())).unwrap();
        assert_eq!(vfs.entries().len(), 2);
        assert_eq!(vfs.mounts().count(), 2);
    }

    #[test]
    fn loads_fill_the_cache() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        let mut vfs = VfsContext::new(1);
        vfs.mount(&dir_mount(dir.path())).unwrap();

        vfs.load("a.txt").unwrap();
        vfs.load("b.txt").unwrap();
        assert_eq!(vfs.cache().len(), 1);
        assert!(vfs.cache().lookup("b.txt").is_some());
        // Evicted from the cache, but still reachable through the mounts.
        assert_eq!(vfs.load("a.txt").as_deref(), Some(&b"a"[..]));
    }

    #[test]
    fn contexts_are_independent() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("only_here.txt"), b"x").unwrap();
        let mut one = VfsContext::default();
        let mut two = VfsContext::default();
        one.mount(&dir_mount(dir.path())).unwrap();

        assert!(one.load("only_here.txt").is_some());
        assert!(two.load("only_here.txt").is_none());
        assert!(two.entries().is_empty());
    }

    #[test]
    fn unmountable_paths_are_rejected() {
        let dir = tempdir().unwrap();
        let mut vfs = VfsContext::default();
        assert!(vfs.mount(&dir.path().join("missing.zip").to_string_lossy()).is_err());
        assert!(vfs.mounts().next().is_none());
    }
}
