//! Runtime configuration shared by the cooker, the VFS and the CLI.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::KilnError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON config file for the CLI.
pub const CONFIG_ENV: &str = "KILN_CONFIG";

/// Upper bound for the automatic worker count.
const MAX_AUTO_WORKERS: usize = 4;

/// Compression codec used for cooked entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Deflate,
    Zstd,
    /// Never compress, whatever level the transform asks for.
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Program root. Scanned paths are relative to it.
    pub root: PathBuf,
    /// Base path of the cook database; shard `i` lives at `<stem>[i].<ext>`.
    /// Relative paths are resolved against `root`.
    pub archive: PathBuf,
    /// Worker count for asynchronous cooking, `0` picks one per core (max 4).
    pub workers: usize,
    /// Tolerated difference between archived and on-disk timestamps.
    pub stamp_epsilon: u64,
    /// Number of entries kept by the VFS content cache.
    pub cache_capacity: usize,
    pub codec: Codec,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            archive: PathBuf::from(".cook.zip"),
            workers: 0,
            stamp_epsilon: 1,
            cache_capacity: 16,
            codec: Codec::Deflate,
        }
    }
}

impl KilnConfig {
    /// Loads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, KilnError> {
        let text = std::fs::read_to_string(path).map_err(|e| KilnError::io(e, path))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Loads the file named by `KILN_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self, KilnError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Effective number of async workers.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().clamp(1, MAX_AUTO_WORKERS)
        } else {
            self.workers
        }
    }

    /// Cook database path of shard `index`: `.cook.zip` becomes `.cook[0].zip`.
    pub fn shard_archive(&self, index: usize) -> PathBuf {
        let base = if self.archive.is_absolute() {
            self.archive.clone()
        } else {
            self.root.join(&self.archive)
        };
        let name = base.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        // Split on the last dot that is not the leading one of a dotfile.
        let shard = match name.rfind('.').filter(|&pos| pos > 0) {
            Some(pos) => format!("{}[{}]{}", &name[..pos], index, &name[pos..]),
            None => format!("{name}[{index}]"),
        };
        base.with_file_name(shard)
    }
}
