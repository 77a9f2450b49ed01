//! treesift - content-based deduplication and reconciliation of directory trees
//!
//! Two pipelines share one set of building blocks:
//!
//! - **dedup** ([`duplicates::run_dedup`]): within one tree, keep the newest
//!   copy of every distinct file content in place and move the other copies
//!   into a quarantine folder, preserving relative paths.
//! - **reconcile** ([`reconcile::run_reconcile`]): move the files of an older
//!   tree whose content is missing from the current tree into a destination
//!   tree, and every symbolic link of the older tree into a link destination.
//!
//! Both are built from the [`scanner`] (walking and hashing), the
//! [`actions`] (collision-safe moves and empty-directory cleanup) and the
//! [`duplicates`] grouping logic.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod scanner;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, DedupArgs, ReconcileArgs};
use crate::config::Config;
use crate::duplicates::DedupOptions;
use crate::error::ExitCode;
use crate::logging::LogOptions;
use crate::progress::{Progress, ProgressCallback};
use crate::reconcile::ReconcileOptions;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error only when the report cannot be written. Invalid roots
/// are reported and mapped to an [`ExitCode`] instead, and a log file that
/// cannot be opened only costs the audit trail.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let config = Config::load();
    let progress: Option<Arc<dyn ProgressCallback>> = Some(Arc::new(Progress::new(cli.quiet)));

    let requested_log = match cli.command {
        Commands::Dedup(ref args) => args.log_file.clone(),
        Commands::Reconcile(ref args) => Some(
            args.log_file
                .clone()
                .unwrap_or_else(|| config.log_file.clone()),
        ),
    };
    let log_file = logging::init_logging(&LogOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        log_file: requested_log,
    });

    log::info!("=== Start ===");
    let code = match cli.command {
        Commands::Dedup(args) => run_dedup_command(args, &config, progress, log_file.as_deref()),
        Commands::Reconcile(args) => {
            run_reconcile_command(args, &config, progress, log_file.as_deref())
        }
    }?;
    log::info!("=== Done ===");
    Ok(code)
}

fn run_dedup_command(
    args: DedupArgs,
    config: &Config,
    progress: Option<Arc<dyn ProgressCallback>>,
    log_file: Option<&Path>,
) -> Result<ExitCode> {
    let options = DedupOptions::new(args.root)
        .with_dry_run(args.dry_run)
        .with_follow_symlinks(args.follow_symlinks)
        .with_keep_empty_dirs(args.keep_empty_dirs)
        .with_quarantine_name(
            args.quarantine_dir
                .unwrap_or_else(|| config.quarantine_dir.clone()),
        )
        .with_hasher(config.hasher(args.algo))
        .with_io_threads(args.io_threads.unwrap_or(config.io_threads))
        .with_progress(progress);

    let report = match duplicates::run_dedup(&options) {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("[ERROR] {}", e);
            return Ok(ExitCode::Failure);
        }
    };

    output::write_dedup_report(&mut io::stdout().lock(), &report, log_file)
        .context("failed to write report")?;
    Ok(ExitCode::Success)
}

fn run_reconcile_command(
    args: ReconcileArgs,
    config: &Config,
    progress: Option<Arc<dyn ProgressCallback>>,
    log_file: Option<&Path>,
) -> Result<ExitCode> {
    let options = ReconcileOptions::new(args.current, args.older, args.dest, args.symlinks_dest)
        .with_apply(args.apply)
        .with_keep_empty_dirs(args.keep_empty_dirs)
        .with_hasher(config.hasher(args.algo))
        .with_io_threads(args.io_threads.unwrap_or(config.io_threads))
        .with_progress(progress);

    let report = match reconcile::run_reconcile(&options) {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("[ERROR] {}", e);
            return Ok(ExitCode::ConfigurationError);
        }
    };

    output::write_reconcile_report(
        &mut io::stdout().lock(),
        &report,
        log_file,
        args.keep_empty_dirs,
    )
    .context("failed to write report")?;
    Ok(ExitCode::Success)
}
