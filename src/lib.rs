//! # Kiln Core Library
//!
//! Incremental asset cooking plus a read-only virtual filesystem over the
//! cooked output.
//!
//! The cooker scans a program root with glob masks, diffs the result against
//! a zip archive that doubles as its build database, and appends transformed
//! copies of every added or changed file. The VFS mounts such archives (or
//! tar, pak and plain directories) and resolves loosely written asset names
//! against everything mounted.
//!
//! ## Key Modules
//!
//! - [`scan`]: glob mask scanning of the live disk tree.
//! - [`diff`]: change detection against a previous cook database.
//! - [`cooker`]: the synchronous and sharded background cook passes.
//! - [`archive`]: zip, tar, pak and directory stores, plus the cook database.
//! - [`vfs`]: mounting, fuzzy resolution and loading.
//! - [`cache`]: the bounded content cache behind the VFS.
//!
//! ## Examples
//!
//! ```no_run
//! use kiln::cooker::{Cooker, PassThrough};
//! use kiln::vfs::VfsContext;
//! use kiln::KilnConfig;
//!
//! # fn main() -> Result<(), kiln::KilnError> {
//! let mut cooker = Cooker::new(KilnConfig::default());
//! cooker.cook("assets/**", &PassThrough { level: 6 })?;
//!
//! let mut vfs = VfsContext::default();
//! for archive in cooker.archives() {
//!     vfs.mount(&archive.to_string_lossy())?;
//! }
//! let bytes = vfs.load("assets/readme.txt");
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod common;
pub mod config;
pub mod cooker;
pub mod diff;
pub mod error;
pub mod progress;
pub mod scan;
pub mod vfs;

pub use config::KilnConfig;
pub use error::KilnError;
