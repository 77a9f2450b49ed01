//! Parallel content hashing for both pipelines.
//!
//! # Overview
//!
//! [`hash_entries`] computes the digest of every regular file it is given on
//! a bounded rayon pool. Each file is hashed by exactly one worker; results
//! come back in input order and are merged on the calling thread, so no
//! shared map is ever written concurrently.
//!
//! Files that cannot be read are logged, collected in
//! [`HashOutcome::failures`] and otherwise skipped.
//!
//! # Example
//!
//! ```no_run
//! use treesift::duplicates::{hash_entries, HashConfig};
//! use treesift::scanner::{Hasher, HashAlgorithm, FileEntry};
//!
//! let files: Vec<FileEntry> = Vec::new();
//! let outcome = hash_entries(files, &Hasher::new(HashAlgorithm::Sha256), &HashConfig::default());
//! println!("{} hashed, {} failed", outcome.hashed.len(), outcome.failures.len());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::progress::{ProgressCallback, PHASE_SCAN};
use crate::scanner::{ContentDigest, FileEntry, HashError, Hasher};

/// Files above this size get a debug line before hashing.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Default number of hashing threads.
pub const DEFAULT_IO_THREADS: usize = 4;

/// Configuration for a hashing pass.
#[derive(Clone)]
pub struct HashConfig {
    /// Number of worker threads (at least 1)
    pub io_threads: usize,
    /// Phase name reported to the progress callback
    pub phase: &'static str,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for HashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashConfig")
            .field("io_threads", &self.io_threads)
            .field("phase", &self.phase)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            io_threads: DEFAULT_IO_THREADS,
            phase: PHASE_SCAN,
            progress_callback: None,
        }
    }
}

impl HashConfig {
    /// Set the number of worker threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the phase name used for progress reporting.
    #[must_use]
    pub fn with_phase(mut self, phase: &'static str) -> Self {
        self.phase = phase;
        self
    }

    /// Set a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Option<Arc<dyn ProgressCallback>>) -> Self {
        self.progress_callback = callback;
        self
    }
}

/// Result of a hashing pass.
#[derive(Debug, Default)]
pub struct HashOutcome {
    /// Successfully hashed files with their digests, in input order
    pub hashed: Vec<(FileEntry, ContentDigest)>,
    /// Files that could not be hashed
    pub failures: Vec<HashError>,
    /// Total bytes read
    pub bytes_hashed: u64,
}

/// Hash every file on a pool of `config.io_threads` workers.
#[must_use]
pub fn hash_entries(files: Vec<FileEntry>, hasher: &Hasher, config: &HashConfig) -> HashOutcome {
    let mut outcome = HashOutcome::default();
    if files.is_empty() {
        log::debug!("No files to hash");
        return outcome;
    }

    let total = files.len();
    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start(config.phase, total);
    }
    log::info!(
        "Hashing {} files with {} ({} threads)",
        total,
        hasher.algorithm(),
        config.io_threads
    );

    let done = AtomicUsize::new(0);
    let work = || -> Vec<(FileEntry, Result<ContentDigest, HashError>)> {
        files
            .into_par_iter()
            .map(|file| {
                if file.size > LARGE_FILE_THRESHOLD {
                    log::debug!(
                        "Hashing large file ({} MB): {}",
                        file.size / (1024 * 1024),
                        file.path.display()
                    );
                }

                let result = hasher.digest(&file.path);

                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = config.progress_callback {
                    callback.on_progress(current, file.path.to_string_lossy().as_ref());
                }
                (file, result)
            })
            .collect()
    };

    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.io_threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(e) => {
            log::warn!(
                "Failed to create hashing pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            work()
        }
    };

    for (file, result) in results {
        match result {
            Ok(digest) => {
                log::trace!("{}  {}", digest, file.path.display());
                outcome.bytes_hashed += file.size;
                outcome.hashed.push((file, digest));
            }
            Err(e) => {
                log::warn!("Skipping unreadable file: {}", e);
                outcome.failures.push(e);
            }
        }
    }

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end(config.phase);
    }
    log::info!(
        "Hashed {} files ({} bytes), {} skipped",
        outcome.hashed.len(),
        outcome.bytes_hashed,
        outcome.failures.len()
    );
    outcome
}
