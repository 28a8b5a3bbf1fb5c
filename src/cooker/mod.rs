//! # Cooker
//!
//! Incremental asset build: scan the source tree, diff it against the cook
//! database, tombstone deleted sources and run every added or changed file
//! through a pluggable [`Transform`], appending the result to the database.
//!
//! ## Strategy
//!
//! 1. The masks are listed once and split into contiguous shards.
//! 2. Each shard owns its own database (`.cook[i].zip`), so shards never
//!    share mutable archive state.
//! 3. Synchronous cooking runs shard `0` over the whole list on the calling
//!    thread; asynchronous cooking runs one worker per shard (see [`worker`]).
//!
//! A failing transform never aborts a pass: the file is logged, recorded in
//! the [`CookReport`] and skipped. Only a cook database that cannot be opened
//! (after one delete-and-retry) or written is fatal.

mod worker;

pub use worker::{CookHandle, ReadySignal};

use crate::archive::cookdb::{CookDb, CookManifest};
use crate::common::{self, FileRecord};
use crate::config::KilnConfig;
use crate::diff::{ArchiveDiffer, DiffResult};
use crate::progress::{step_percent, CookProgress};
use crate::scan::FileScanner;
use crate::KilnError;

use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of leading bytes handed to transforms for format sniffing.
pub const HEADER_LEN: usize = 16;

/// Everything a transform gets to see about one source file.
pub struct CookJob<'a> {
    /// Normalized path relative to the program root.
    pub path: &'a str,
    /// Extension including the dot (".png"), empty when there is none.
    pub extension: &'a str,
    /// First bytes of the file, zero padded.
    pub header: [u8; HEADER_LEN],
    /// The raw source contents.
    pub input: &'a mut dyn Read,
    /// Cooked bytes to store.
    pub output: &'a mut Vec<u8>,
    /// Human progress label, e.g. `"Cooking 042% assets/a.png"`.
    pub label: &'a str,
}

/// What to do with a transform's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookOutcome {
    /// Store the output at the given compression level (`0` = stored).
    Archive { level: u32 },
    /// Do not store anything for this file.
    Bypass,
}

/// A per-file transform failure. Recorded, never fatal.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl From<std::io::Error> for TransformError {
    fn from(err: std::io::Error) -> Self {
        TransformError(err.to_string())
    }
}

/// Converts one source file into its cooked form.
pub trait Transform: Send + Sync {
    fn cook(&self, job: &mut CookJob<'_>) -> Result<CookOutcome, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(&mut CookJob<'_>) -> Result<CookOutcome, TransformError> + Send + Sync,
{
    fn cook(&self, job: &mut CookJob<'_>) -> Result<CookOutcome, TransformError> {
        self(job)
    }
}

/// Stores sources unchanged.
#[derive(Debug, Clone, Copy)]
pub struct PassThrough {
    pub level: u32,
}

impl Transform for PassThrough {
    fn cook(&self, job: &mut CookJob<'_>) -> Result<CookOutcome, TransformError> {
        std::io::copy(job.input, job.output)?;
        Ok(CookOutcome::Archive { level: self.level })
    }
}

/// Stores sources unchanged, except for the listed extensions which are
/// bypassed (nothing is archived for them).
#[derive(Debug, Clone)]
pub struct BypassExtensions {
    pub level: u32,
    extensions: Vec<String>,
}

impl BypassExtensions {
    /// `extensions` may be given with or without the leading dot.
    pub fn new<I, S>(level: u32, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_ascii_lowercase();
                if e.starts_with('.') { e } else { format!(".{e}") }
            })
            .collect();
        Self { level, extensions }
    }
}

impl Transform for BypassExtensions {
    fn cook(&self, job: &mut CookJob<'_>) -> Result<CookOutcome, TransformError> {
        let ext = job.extension.to_ascii_lowercase();
        if self.extensions.iter().any(|e| *e == ext) {
            return Ok(CookOutcome::Bypass);
        }
        PassThrough { level: self.level }.cook(job)
    }
}

/// Outcome of one cook pass over one shard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CookReport {
    pub shard: usize,
    pub archive: PathBuf,
    pub diff: DiffResult,
    /// Files whose output was appended to the database.
    pub cooked: Vec<String>,
    /// Files the transform chose not to archive.
    pub bypassed: Vec<String>,
    /// Files skipped because reading or transforming them failed.
    pub failed: Vec<(String, String)>,
}

/// Cooker context: configuration, scanner and the progress of the latest run.
#[derive(Debug)]
pub struct Cooker {
    config: KilnConfig,
    scanner: FileScanner,
    progress: Arc<CookProgress>,
}

impl Cooker {
    pub fn new(config: KilnConfig) -> Self {
        let scanner = FileScanner::new(config.root.clone());
        Self { config, scanner, progress: Arc::new(CookProgress::new(1)) }
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    /// Progress of the latest run in `[0, 100]`.
    pub fn progress(&self) -> u32 {
        self.progress.percent()
    }

    /// Shared progress of the current pass. A handle taken before [`cook`]
    /// (or [`cook_async`]) can be polled from another thread while it runs.
    ///
    /// [`cook`]: Cooker::cook
    /// [`cook_async`]: Cooker::cook_async
    pub fn progress_handle(&self) -> Arc<CookProgress> {
        Arc::clone(&self.progress)
    }

    /// Resets progress for a pass over `shards` shards, keeping the existing
    /// handle when its shape already fits.
    fn start_progress(&mut self, shards: usize) {
        if self.progress.shard_count() == shards.max(1) {
            self.progress.reset();
        } else {
            self.progress = Arc::new(CookProgress::new(shards));
        }
    }

    /// Existing shard databases, in shard order, ready to be mounted.
    pub fn archives(&self) -> Vec<PathBuf> {
        (0..self.config.worker_count().max(1))
            .map(|i| self.config.shard_archive(i))
            .filter(|p| p.is_file())
            .collect()
    }

    /// Cooks everything matching `masks` on the calling thread into shard `0`.
    pub fn cook(&mut self, masks: &str, transform: &dyn Transform) -> Result<CookReport, KilnError> {
        self.start_progress(1);
        let paths = self.scanner.list(masks)?;
        let archive = self.config.shard_archive(0);
        cook_shard(0, &self.scanner, &paths, &archive, &self.config, transform, &self.progress)
    }

    /// Splits the file list over the configured number of workers and cooks
    /// the shards on background threads, each of which first waits for
    /// `ready`. Returns immediately.
    pub fn cook_async(
        &mut self,
        masks: &str,
        transform: Arc<dyn Transform>,
        ready: ReadySignal,
    ) -> Result<CookHandle, KilnError> {
        let paths = self.scanner.list(masks)?;
        let workers = self.config.worker_count();
        self.start_progress(workers);
        worker::spawn_shards(
            shard_ranges(paths.len(), workers)
                .into_iter()
                .map(|range| paths[range].to_vec())
                .collect(),
            &self.scanner,
            &self.config,
            transform,
            Arc::clone(&self.progress),
            ready,
        )
    }
}

/// Contiguous index ranges splitting `len` items over `shards` shards.
pub(crate) fn shard_ranges(len: usize, shards: usize) -> Vec<std::ops::Range<usize>> {
    let shards = shards.max(1);
    let mut ranges = Vec::with_capacity(shards);
    let mut from = 0;
    for i in 0..shards {
        let to = if i == shards - 1 { len } else { len * (i + 1) / shards };
        ranges.push(from..to);
        from = to;
    }
    ranges
}

fn read_header(data: &[u8]) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    let n = data.len().min(HEADER_LEN);
    header[..n].copy_from_slice(&data[..n]);
    header
}

/// Runs one full pass over one shard: scan, diff, tombstone, transform, append.
pub(crate) fn cook_shard(
    shard: usize,
    scanner: &FileScanner,
    paths: &[String],
    archive: &Path,
    config: &KilnConfig,
    transform: &dyn Transform,
    progress: &CookProgress,
) -> Result<CookReport, KilnError> {
    let records = scanner.records(paths);

    let previous = CookManifest::open(archive).unwrap_or_else(|e| {
        tracing::warn!(archive = %archive.display(), error = %e, "cannot read previous cook database");
        None
    });
    let mut differ = ArchiveDiffer::new(config.stamp_epsilon);
    let diff = differ.diff(previous.as_ref(), &records).clone();

    let mut report = CookReport { shard, archive: archive.to_path_buf(), diff, ..CookReport::default() };
    let mut db = CookDb::open_for_update(archive, config.codec)?;

    for (i, path) in report.diff.deleted.iter().enumerate() {
        tracing::info!("Deleting {:03}% {}", step_percent(i, report.diff.deleted.len()), path);
        db.tombstone(path)?;
    }

    let by_path: HashMap<&str, &FileRecord> = records.iter().map(|r| (r.path.as_str(), r)).collect();
    let total = report.diff.uncooked.len();
    let mut scratch = Vec::new();
    let mut output = Vec::new();

    for (i, path) in report.diff.uncooked.iter().enumerate() {
        let percent = step_percent(i, total).min(99);
        progress.advance(shard, percent);
        let label = format!("Cooking {percent:03}% {path}");
        tracing::debug!("{label}");

        scratch.clear();
        output.clear();
        let source = config.root.join(path);
        if let Err(e) = File::open(&source).and_then(|mut f| f.read_to_end(&mut scratch)) {
            tracing::warn!(path = %path, error = %e, "cannot read source; skipping");
            report.failed.push((path.clone(), e.to_string()));
            continue;
        }

        let mut input = Cursor::new(scratch.as_slice());
        let mut job = CookJob {
            path,
            extension: common::file_ext(path),
            header: read_header(&scratch),
            input: &mut input,
            output: &mut output,
            label: &label,
        };
        match transform.cook(&mut job) {
            Ok(CookOutcome::Archive { level }) => {
                let stamp = by_path.get(path.as_str()).map(|r| r.stamp).unwrap_or(0);
                let comment = scratch.len().to_string();
                db.append(path, &comment, stamp, &output, level as i32)?;
                report.cooked.push(path.clone());
            }
            Ok(CookOutcome::Bypass) => {
                tracing::debug!(path = %path, "bypassed");
                report.bypassed.push(path.clone());
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "importing failed");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    db.finish()?;
    progress.complete(shard);

    tracing::info!(
        shard,
        archive = %archive.display(),
        added = report.diff.added.len(),
        changed = report.diff.changed.len(),
        deleted = report.diff.deleted.len(),
        cooked = report.cooked.len(),
        failed = report.failed.len(),
        "cook pass finished"
    );
    Ok(report)
}
