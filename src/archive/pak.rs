//! # PACK Container
//!
//! The lightweight, uncompressed pack format. Layout (all integers are
//! little-endian `u32`):
//!
//! 1. **Header** (12 bytes): magic `b"PACK"`, directory offset, directory length.
//! 2. **Payloads**: file contents, concatenated.
//! 3. **Directory**: one 64-byte record per file: a NUL-padded 56-byte name,
//!    the payload offset and the payload size.

use super::{ArchiveStore, EntryTable};
use crate::KilnError;

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAK_MAGIC: &[u8; 4] = b"PACK";
const HEADER_SIZE: u32 = 12;
const RECORD_SIZE: u32 = 64;
const NAME_SIZE: usize = 56;

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read-only view of a pack file.
#[derive(Debug)]
pub struct PakStore {
    path: PathBuf,
    file: File,
    offsets: Vec<u32>,
    table: EntryTable,
}

impl PakStore {
    pub fn open(path: &Path) -> Result<Self, KilnError> {
        let invalid = |reason: &str| KilnError::Pak { path: path.to_path_buf(), reason: reason.to_string() };

        let mut file = File::open(path).map_err(|e| KilnError::io(e, path))?;
        let len = file.metadata().map_err(|e| KilnError::io(e, path))?.len();

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header).map_err(|_| invalid("missing header"))?;
        if &header[..4] != PAK_MAGIC {
            return Err(invalid("bad magic bytes"));
        }
        let dir_offset = le_u32(&header[4..8]);
        let dir_length = le_u32(&header[8..12]);
        if dir_length % RECORD_SIZE != 0 || dir_offset as u64 + dir_length as u64 > len {
            return Err(invalid("directory out of bounds"));
        }

        let mut directory = vec![0u8; dir_length as usize];
        file.seek(SeekFrom::Start(dir_offset as u64)).map_err(|e| KilnError::io(e, path))?;
        file.read_exact(&mut directory).map_err(|e| KilnError::io(e, path))?;

        let mut offsets = Vec::new();
        let mut table = EntryTable::default();
        for record in directory.chunks_exact(RECORD_SIZE as usize) {
            let raw_name = &record[..NAME_SIZE];
            let end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
            let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
            let offset = le_u32(&record[NAME_SIZE..NAME_SIZE + 4]);
            let size = le_u32(&record[NAME_SIZE + 4..NAME_SIZE + 8]);
            if offset as u64 + size as u64 > len {
                return Err(invalid("entry out of bounds"));
            }
            offsets.push(offset);
            table.push(name, size);
        }

        Ok(Self { path: path.to_path_buf(), file, offsets, table })
    }
}

impl ArchiveStore for PakStore {
    table_listing!();

    fn extract(&mut self, index: u32) -> Result<Vec<u8>, KilnError> {
        let Some(&offset) = self.offsets.get(index as usize) else {
            return Err(KilnError::Pak { path: self.path.clone(), reason: format!("no entry #{index}") });
        };
        let mut data = vec![0u8; self.size(index) as usize];
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.read_exact(&mut data))
            .map_err(|e| KilnError::io(e, &self.path))?;
        Ok(data)
    }
}

/// Builds a pack file in memory and writes it out in one go.
#[derive(Debug, Default)]
pub struct PakWriter {
    files: Vec<(String, Vec<u8>)>,
}

impl PakWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a file. Names longer than 55 bytes are truncated on write.
    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.push((name.into(), data));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn write_to(&self, path: &Path) -> Result<(), KilnError> {
        let file = File::create(path).map_err(|e| KilnError::io(e, path))?;
        let mut out = BufWriter::new(file);
        self.write(&mut out).map_err(|e| KilnError::io(e, path))?;
        out.flush().map_err(|e| KilnError::io(e, path))
    }

    fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let payload: u64 = self.files.iter().map(|(_, d)| d.len() as u64).sum();
        let dir_offset = u32::try_from(HEADER_SIZE as u64 + payload)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pack exceeds 4 GiB"))?;
        let dir_length = self.files.len() as u32 * RECORD_SIZE;

        out.write_all(PAK_MAGIC)?;
        out.write_all(&dir_offset.to_le_bytes())?;
        out.write_all(&dir_length.to_le_bytes())?;

        for (_, data) in &self.files {
            out.write_all(data)?;
        }

        let mut offset = HEADER_SIZE;
        for (name, data) in &self.files {
            let mut record = [0u8; RECORD_SIZE as usize];
            let bytes = name.as_bytes();
            let n = bytes.len().min(NAME_SIZE - 1);
            record[..n].copy_from_slice(&bytes[..n]);
            record[NAME_SIZE..NAME_SIZE + 4].copy_from_slice(&offset.to_le_bytes());
            record[NAME_SIZE + 4..].copy_from_slice(&(data.len() as u32).to_le_bytes());
            out.write_all(&record)?;
            offset += data.len() as u32;
        }
        Ok(())
    }
}
