//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`ProgressCallback`] trait that the pipelines
//! report through, and the [`Progress`] struct which renders it as a
//! terminal progress bar with elapsed time and ETA.
//!
//! Progress is purely cosmetic: every pipeline accepts `None` in its place.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Phase name for hashing the reference (current) tree.
pub const PHASE_INDEX: &str = "index";
/// Phase name for hashing the scanned (or older) tree.
pub const PHASE_SCAN: &str = "scan";
/// Phase name for executing a relocation plan.
pub const PHASE_RELOCATE: &str = "relocate";
/// Phase name for empty-directory reclamation.
pub const PHASE_RECLAIM: &str = "reclaim";

/// Progress callback for pipeline phases.
///
/// Implement this trait to receive progress updates. Implementations must
/// tolerate calls from rayon worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (one of the `PHASE_*` constants)
    /// * `total` - Total number of items to process, 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of items processed so far
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
///
/// Shows one bar for the active phase. Bars draw to stderr and hide
/// themselves automatically when stderr is not a terminal.
pub struct Progress {
    current: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use treesift::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            current: Mutex::new(None),
            quiet,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn label(phase: &str) -> &'static str {
        match phase {
            PHASE_INDEX => "Indexing current tree",
            PHASE_SCAN => "Hashing",
            PHASE_RELOCATE => "Moving",
            PHASE_RECLAIM => "Removing empty directories",
            _ => "Working",
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = ProgressBar::new_spinner().with_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::new(total as u64).with_style(Self::bar_style())
        };
        pb.set_message(Self::label(phase));

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Ok(guard) = self.current.lock() {
            if let Some(ref pb) = *guard {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 30));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Ok(mut guard) = self.current.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_with_message(format!("{} complete", Self::label(phase)));
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count + 4 > max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
