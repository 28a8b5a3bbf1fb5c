//! Background cook workers.
//!
//! One named thread per shard. Every worker blocks on a shared
//! [`ReadySignal`] before touching the disk, cooks its contiguous slice of the
//! file list into its own database and sends its report back over a channel.

use super::{cook_shard, CookReport, Transform};
use crate::config::KilnConfig;
use crate::progress::CookProgress;
use crate::scan::FileScanner;
use crate::KilnError;

use crossbeam_channel::{unbounded, Receiver};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// One-shot "go" flag shared between the host and the cook workers.
///
/// Once set it stays set; waiting on a set signal returns immediately.
#[derive(Debug, Clone, Default)]
pub struct ReadySignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is already set.
    pub fn ready() -> Self {
        let signal = Self::new();
        signal.set();
        signal
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.flag()
    }

    /// Blocks until the signal is set.
    pub fn wait(&self) {
        let mut flag = self.flag();
        while !*flag {
            flag = self.inner.1.wait(flag).unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

type ShardResult = (usize, Result<CookReport, KilnError>);

/// Handle on a running asynchronous cook.
///
/// Dropping the handle detaches the workers; they still finish their shards.
#[derive(Debug)]
pub struct CookHandle {
    progress: Arc<CookProgress>,
    archives: Vec<PathBuf>,
    results: Receiver<ShardResult>,
    workers: Vec<JoinHandle<()>>,
}

impl CookHandle {
    /// Overall progress in `[0, 100]`. `100` means every shard database is
    /// finished and can be mounted.
    pub fn progress(&self) -> u32 {
        self.progress.percent()
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }

    /// Shard databases written by this run, in shard order.
    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    /// Joins every worker and returns the shard reports in shard order.
    ///
    /// The first fatal shard error (or worker panic) is returned instead.
    pub fn wait(self) -> Result<Vec<CookReport>, KilnError> {
        let mut panicked = None;
        for (i, worker) in self.workers.into_iter().enumerate() {
            if worker.join().is_err() && panicked.is_none() {
                panicked = Some(i);
            }
        }
        if let Some(shard) = panicked {
            return Err(KilnError::WorkerPanicked(shard));
        }

        let mut results: Vec<ShardResult> = self.results.try_iter().collect();
        results.sort_by_key(|(shard, _)| *shard);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Spawns one worker per shard slice.
pub(super) fn spawn_shards(
    shards: Vec<Vec<String>>,
    scanner: &FileScanner,
    config: &KilnConfig,
    transform: Arc<dyn Transform>,
    progress: Arc<CookProgress>,
    ready: ReadySignal,
) -> Result<CookHandle, KilnError> {
    let (tx, rx) = unbounded::<ShardResult>();
    let mut workers = Vec::with_capacity(shards.len());
    let mut archives = Vec::with_capacity(shards.len());

    tracing::info!(workers = shards.len(), "spawning cook workers");
    for (shard, paths) in shards.into_iter().enumerate() {
        let archive = config.shard_archive(shard);
        archives.push(archive.clone());

        let scanner = scanner.clone();
        let config = config.clone();
        let transform = Arc::clone(&transform);
        let progress = Arc::clone(&progress);
        let ready = ready.clone();
        let tx = tx.clone();

        let worker = thread::Builder::new()
            .name(format!("kiln-cook-{shard}"))
            .spawn(move || {
                ready.wait();
                tracing::debug!(shard, files = paths.len(), "cook worker started");
                let result = cook_shard(shard, &scanner, &paths, &archive, &config, transform.as_ref(), &progress);
                if let Err(e) = &result {
                    tracing::error!(shard, error = %e, "cook worker failed");
                    progress.complete(shard);
                }
                let _ = tx.send((shard, result));
            })?;
        workers.push(worker);
    }

    Ok(CookHandle { progress, archives, results: rx, workers })
}
