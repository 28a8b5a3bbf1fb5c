//! # Cook Database
//!
//! The cooker stores its output in a zip archive that doubles as a build
//! database. Each entry carries a small side-channel "comment" record holding
//! the decimal *original* (pre-cook) size of its source, and its modification
//! time is the source's timestamp. Together they let the differ detect real
//! source changes without decompressing payloads.
//!
//! Entries are only ever appended. A name written twice keeps both copies in
//! the archive; readers use the latest. Deleted sources are hidden by a
//! zero-byte tombstone with comment `"0"`.
//!
//! ## Where the size lives
//!
//! `zip` 0.6 cannot set a per-entry file comment when writing, so the decimal
//! size goes into a private extra-field record tagged [`COMMENT_TAG`]
//! (`0xC00C`) instead, read back through `ZipFile::extra_data`. Other
//! zip tools skip unknown extra-field tags and will not show the size, but
//! they still extract the payloads normally.

use crate::common;
use crate::config::Codec;
use crate::KilnError;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Private extra-field tag for the comment record.
pub const COMMENT_TAG: u16 = 0xC00C;

/// Comment written on tombstones.
pub const TOMBSTONE_COMMENT: &str = "0";

/// Encodes a comment as one extra-field record: tag, length, bytes.
fn encode_comment(comment: &str) -> Vec<u8> {
    let bytes = comment.as_bytes();
    let mut record = Vec::with_capacity(4 + bytes.len());
    record.extend_from_slice(&COMMENT_TAG.to_le_bytes());
    record.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    record.extend_from_slice(bytes);
    record
}

/// Finds the comment record in a raw extra field and parses its decimal value.
fn decode_comment(mut extra: &[u8]) -> Option<u64> {
    while extra.len() >= 4 {
        let tag = u16::from_le_bytes([extra[0], extra[1]]);
        let len = u16::from_le_bytes([extra[2], extra[3]]) as usize;
        let body = extra.get(4..4 + len)?;
        if tag == COMMENT_TAG {
            return std::str::from_utf8(body).ok()?.trim().parse().ok();
        }
        extra = &extra[4 + len..];
    }
    None
}

fn zip_time(stamp: u64) -> zip::DateTime {
    let (year, month, day, hour, minute, second) = common::split_stamp(stamp);
    zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}

/// Manifest view of one archived entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedEntry {
    pub name: String,
    /// Original size from the comment record; `None` when the entry carries
    /// no record, which the differ treats as absent.
    pub original_size: Option<u64>,
    /// Human stamp of the entry's modification time.
    pub stamp: u64,
    /// Stored (cooked, uncompressed) size.
    pub size: u64,
}

/// Entry metadata of a cook database, read without touching payloads.
#[derive(Debug, Clone, Default)]
pub struct CookManifest {
    entries: Vec<ArchivedEntry>,
    latest: HashMap<String, usize>,
}

impl CookManifest {
    pub fn from_entries(entries: Vec<ArchivedEntry>) -> Self {
        let latest = entries.iter().enumerate().map(|(i, e)| (e.name.clone(), i)).collect();
        Self { entries, latest }
    }

    /// Reads the manifest of the archive at `path`.
    ///
    /// Returns `Ok(None)` when there is no archive yet (missing or empty file).
    pub fn open(path: &Path) -> Result<Option<Self>, KilnError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Ok(None),
        }
        let file = File::open(path).map_err(|e| KilnError::io(e, path))?;
        let mut archive = ZipArchive::new(file).map_err(|e| KilnError::zip(e, path))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| KilnError::zip(e, path))?;
            let modified = entry.last_modified();
            entries.push(ArchivedEntry {
                name: entry.name().to_string(),
                original_size: decode_comment(entry.extra_data()),
                stamp: common::join_stamp(
                    modified.year(),
                    modified.month(),
                    modified.day(),
                    modified.hour(),
                    modified.minute(),
                    modified.second(),
                ),
                size: entry.size(),
            });
        }
        Ok(Some(Self::from_entries(entries)))
    }

    /// Every entry in archive order, duplicates included.
    pub fn entries(&self) -> &[ArchivedEntry] {
        &self.entries
    }

    /// Latest entry stored under `name`.
    pub fn find(&self, name: &str) -> Option<&ArchivedEntry> {
        self.latest.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-mode writer over a cook database.
pub struct CookDb {
    path: PathBuf,
    codec: Codec,
    zip: ZipWriter<File>,
    appended: usize,
}

impl CookDb {
    /// Opens `path` for appending, creating it when missing.
    ///
    /// An empty file is deleted first. If opening fails the file is deleted
    /// and recreated once; a second failure is fatal.
    pub fn open_for_update(path: &Path, codec: Codec) -> Result<Self, KilnError> {
        if std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false) {
            let _ = std::fs::remove_file(path);
        }
        let zip = match Self::try_open(path) {
            Ok(zip) => zip,
            Err(first) => {
                tracing::warn!(path = %path.display(), error = %first, "cook database unreadable; recreating");
                let _ = std::fs::remove_file(path);
                Self::try_open(path).map_err(|reason| KilnError::ArchiveOpen { path: path.to_path_buf(), reason })?
            }
        };
        Ok(Self { path: path.to_path_buf(), codec, zip, appended: 0 })
    }

    fn try_open(path: &Path) -> Result<ZipWriter<File>, String> {
        if path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(path).map_err(|e| e.to_string())?;
            ZipWriter::new_append(file).map_err(|e| e.to_string())
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let file = File::create(path).map_err(|e| e.to_string())?;
            Ok(ZipWriter::new(file))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries appended through this writer.
    pub fn appended(&self) -> usize {
        self.appended
    }

    fn options(&self, level: i32, stamp: u64, len: usize) -> FileOptions {
        let method = match (self.codec, level) {
            (_, 0) | (Codec::Store, _) => CompressionMethod::Stored,
            (Codec::Deflate, _) => CompressionMethod::Deflated,
            (Codec::Zstd, _) => CompressionMethod::Zstd,
        };
        let level = match method {
            CompressionMethod::Deflated => Some(level.clamp(1, 9)),
            CompressionMethod::Zstd => Some(level.clamp(1, 22)),
            _ => None,
        };
        FileOptions::default()
            .compression_method(method)
            .compression_level(level)
            .last_modified_time(zip_time(stamp))
            .large_file(len as u64 >= u32::MAX as u64)
    }

    /// Appends `data` under `name`, tagged with `comment`, at `level`.
    pub fn append(&mut self, name: &str, comment: &str, stamp: u64, data: &[u8], level: i32) -> Result<(), KilnError> {
        let options = self.options(level, stamp, data.len());
        let path = self.path.clone();
        self.zip
            .start_file_with_extra_data(name, options)
            .map_err(|e| KilnError::zip(e, &path))?;
        self.zip.write_all(&encode_comment(comment)).map_err(|e| KilnError::io(e, &path))?;
        self.zip.end_extra_data().map_err(|e| KilnError::zip(e, &path))?;
        self.zip.write_all(data).map_err(|e| KilnError::io(e, &path))?;
        self.appended += 1;
        Ok(())
    }

    /// Appends a zero-byte tombstone hiding every earlier copy of `name`.
    pub fn tombstone(&mut self, name: &str) -> Result<(), KilnError> {
        self.append(name, TOMBSTONE_COMMENT, 0, &[], 0)
    }

    /// Writes the central directory and closes the archive.
    pub fn finish(mut self) -> Result<(), KilnError> {
        let file = self.zip.finish().map_err(|e| KilnError::zip(e, &self.path))?;
        file.sync_all().map_err(|e| KilnError::io(e, &self.path))
    }
}
