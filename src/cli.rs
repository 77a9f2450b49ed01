//! Command-line interface definitions for treesift.
//!
//! This module defines all CLI arguments and subcommands using the clap derive API.
//! Global options (verbosity, quiet) apply to both subcommands.
//!
//! # Example
//!
//! ```bash
//! # Preview which duplicates would be quarantined
//! treesift dedup ~/Pictures --dry-run
//!
//! # Quarantine duplicates, keeping the newest copy of each in place
//! treesift dedup ~/Pictures
//!
//! # Preview what an old backup holds that the current tree does not
//! treesift reconcile --current ~/Docs --older /mnt/old/Docs \
//!     --dest ~/rescued --symlinks-dest ~/rescued-links
//!
//! # Same, for real, with info lines echoed to the console
//! treesift -v reconcile --current ~/Docs --older /mnt/old/Docs \
//!     --dest ~/rescued --symlinks-dest ~/rescued-links --apply
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::scanner::HashAlgorithm;

/// Content-based deduplication and reconciliation of directory trees.
///
/// `dedup` keeps the newest copy of every file content in place and moves
/// the other copies into a quarantine folder. `reconcile` rescues files from
/// an older copy of a tree whose content no longer exists in the current one.
#[derive(Debug, Parser)]
#[command(name = "treesift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Quarantine duplicate files inside one directory tree
    Dedup(DedupArgs),
    /// Move files from an older tree whose content is missing from the current tree
    Reconcile(ReconcileArgs),
}

/// Arguments for the dedup subcommand.
#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Directory tree to deduplicate
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Only print the plan; change nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Descend into symlinked directories
    ///
    /// Loops are detected and skipped.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Name of the quarantine folder created inside ROOT (default: Duplicates)
    #[arg(long, value_name = "NAME")]
    pub quarantine_dir: Option<String>,

    /// Hash algorithm (default: sha256)
    #[arg(long, value_name = "NAME", value_parser = parse_algorithm)]
    pub algo: Option<HashAlgorithm>,

    /// Do not remove directories left empty after the moves
    #[arg(long)]
    pub keep_empty_dirs: bool,

    /// Append a detailed log of every move to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of I/O threads for hashing (default: 4)
    #[arg(long, value_name = "N", value_parser = parse_threads)]
    pub io_threads: Option<usize>,
}

/// Arguments for the reconcile subcommand.
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Current tree (reference, never modified)
    #[arg(long, value_name = "PATH", visible_alias = "main")]
    pub current: PathBuf,

    /// Older copy of the tree
    #[arg(long, value_name = "PATH")]
    pub older: PathBuf,

    /// Destination for files whose content is missing from the current tree
    #[arg(long, value_name = "PATH")]
    pub dest: PathBuf,

    /// Destination for every symbolic link found in the older tree
    #[arg(long, value_name = "PATH")]
    pub symlinks_dest: PathBuf,

    /// Perform the moves and cleanup (default is a preview)
    #[arg(long)]
    pub apply: bool,

    /// Do not remove directories left empty in the older tree
    #[arg(long)]
    pub keep_empty_dirs: bool,

    /// Hash algorithm (default: sha256)
    #[arg(long, value_name = "NAME", value_parser = parse_algorithm)]
    pub algo: Option<HashAlgorithm>,

    /// Log file (default: move_unique.log)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of I/O threads for hashing (default: 4)
    #[arg(long, value_name = "N", value_parser = parse_threads)]
    pub io_threads: Option<usize>,
}

/// Parse a hash algorithm name.
///
/// # Errors
///
/// Returns a message listing the accepted names.
pub fn parse_algorithm(s: &str) -> Result<HashAlgorithm, String> {
    s.parse().map_err(|e: crate::scanner::hasher::UnknownAlgorithm| e.to_string())
}

/// Parse a positive thread count.
///
/// # Errors
///
/// Rejects zero and non-numbers.
pub fn parse_threads(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("thread count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid thread count '{s}': {e}")),
    }
}
