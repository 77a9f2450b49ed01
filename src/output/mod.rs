//! Output formatters for run reports.
//!
//! This module renders the reports returned by the pipelines:
//! - Plain text summaries and previews for the terminal
//!
//! # Example
//!
//! ```no_run
//! use treesift::duplicates::{run_dedup, DedupOptions};
//! use treesift::output::text::write_dedup_report;
//! use std::path::PathBuf;
//!
//! let report = run_dedup(&DedupOptions::new(PathBuf::from(".")).with_dry_run(true)).unwrap();
//! write_dedup_report(&mut std::io::stdout(), &report, None).unwrap();
//! ```

pub mod text;

// Re-export main types
pub use text::{format_size, write_dedup_report, write_reconcile_report, PREVIEW_LIMIT};
