//! Logging infrastructure for treesift.
//!
//! This module provides structured logging using the `log` facade and `env_logger` backend.
//! Library code only ever calls the `log` macros; when no logger is installed
//! they are no-ops, so every pipeline also runs silently (as unit tests do).
//!
//! Console levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. CLI flags: `--quiet` (error only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info, or warn when a log file keeps the detail
//!
//! With a log file, records are also appended there from `debug` up, each
//! line carrying a timestamp, so the file is a full audit trail of every
//! move attempt regardless of what the console shows.
//!
//! # Example
//!
//! ```rust,no_run
//! use treesift::logging::{init_logging, LogOptions};
//! use std::path::PathBuf;
//!
//! let active = init_logging(&LogOptions {
//!     verbose: 0,
//!     quiet: false,
//!     log_file: Some(PathBuf::from("move_unique.log")),
//! });
//! assert!(active.is_some());
//!
//! log::info!("goes to the file only");
//! log::warn!("goes to both");
//! ```

use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

/// Logging setup chosen on the command line.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Verbosity count (0=normal, 1=debug, 2+=trace)
    pub verbose: u8,
    /// Only show errors on the console
    pub quiet: bool,
    /// Append-only audit log
    pub log_file: Option<PathBuf>,
}

/// Initialize the logging subsystem.
///
/// Call once at startup, before any logging calls are made. Logging is
/// never required for a run to proceed: a log file that cannot be opened
/// leaves a console-only logger (with a warning on stderr), and a logger
/// installed earlier in the process is kept as is.
///
/// Returns the log file actually receiving records, if any.
pub fn init_logging(options: &LogOptions) -> Option<PathBuf> {
    let (logger, active_file) = build_logger(options);
    let filter = logger.filter();

    if log::set_boxed_logger(Box::new(logger)).is_err() {
        log::debug!("Logger already installed, keeping it");
        return None;
    }
    log::set_max_level(filter);

    log::debug!(
        "Logging initialized (console: {:?}, file: {:?})",
        env::var("RUST_LOG").ok().unwrap_or_else(|| {
            determine_level(options.verbose, options.quiet, active_file.is_some()).to_string()
        }),
        active_file
    );
    active_file
}

/// Build the logger for `options`, dropping the file sink if it cannot be opened.
fn build_logger(options: &LogOptions) -> (DualLogger, Option<PathBuf>) {
    let file = options
        .log_file
        .as_ref()
        .and_then(|path| match file_logger(path) {
            Ok(logger) => Some((logger, path.clone())),
            Err(e) => {
                eprintln!(
                    "[WARN] cannot open log file {}: {}; continuing without it",
                    path.display(),
                    e
                );
                None
            }
        });

    let console = console_logger(options.verbose, options.quiet, file.is_some());
    match file {
        Some((logger, path)) => (DualLogger::new(console, Some(logger)), Some(path)),
        None => (DualLogger::new(console, None), None),
    }
}

/// Determine the console log level from CLI flags.
///
/// # Arguments
///
/// * `verbose` - Verbosity count (0=info, 1=debug, 2+=trace)
/// * `quiet` - If true, use error level
/// * `file_keeps_detail` - A log file records info lines, so the console
///   drops to warn unless `-v` is given
fn determine_level(verbose: u8, quiet: bool, file_keeps_detail: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 if file_keeps_detail => LevelFilter::Warn,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn console_logger(verbose: u8, quiet: bool, file_keeps_detail: bool) -> Logger {
    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet, file_keeps_detail));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        }
    });

    builder.build()
}

/// Build an append-only file logger that records everything from `debug` up.
fn file_logger(path: &Path) -> io::Result<Logger> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut builder = Builder::new();
    builder
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .filter_level(LevelFilter::Debug)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        });
    Ok(builder.build())
}

/// Routes each record to a console logger and, optionally, a file logger,
/// each applying its own filter.
pub struct DualLogger {
    console: Logger,
    file: Option<Logger>,
}

impl DualLogger {
    /// Combine a console logger with an optional file logger.
    #[must_use]
    pub fn new(console: Logger, file: Option<Logger>) -> Self {
        Self { console, file }
    }

    /// The most verbose level either sink accepts.
    #[must_use]
    pub fn filter(&self) -> LevelFilter {
        let file = self.file.as_ref().map_or(LevelFilter::Off, Logger::filter);
        self.console.filter().max(file)
    }
}

impl Log for DualLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || self.file.as_ref().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record<'_>) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if let Some(ref file) = self.file {
            if file.matches(record) {
                file.log(record);
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(ref file) = self.file {
            file.flush();
        }
    }
}
