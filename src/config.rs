//! Application configuration management.
//!
//! Persisted defaults for values that are usually the same run to run:
//! the hash algorithm, read chunk size, hashing threads, the quarantine
//! directory name and the reconcile log file. Command-line flags override
//! every value here.

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::duplicates::{DEFAULT_IO_THREADS, DEFAULT_QUARANTINE_DIR};
use crate::scanner::{HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// Default reconcile log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "move_unique.log";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Digest algorithm used by both pipelines.
    pub hash_algorithm: HashAlgorithm,
    /// Read chunk size in bytes (never below 1 MiB).
    pub chunk_size: usize,
    /// Number of hashing threads.
    pub io_threads: usize,
    /// Quarantine directory name for `dedup`.
    pub quarantine_dir: String,
    /// Audit log for `reconcile`.
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            io_threads: DEFAULT_IO_THREADS,
            quarantine_dir: DEFAULT_QUARANTINE_DIR.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    /// Load the configuration from the default platform-specific path.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Save the configuration to the default platform-specific path.
    ///
    /// # Errors
    ///
    /// Fails if the config directory cannot be determined or written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save the configuration to `path` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Fails if the file or its parent directories cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Hasher built from the configured algorithm and chunk size.
    #[must_use]
    pub fn hasher(&self, algorithm: Option<HashAlgorithm>) -> Hasher {
        Hasher::new(algorithm.unwrap_or(self.hash_algorithm)).with_chunk_size(self.chunk_size)
    }

    /// Clamp values into their valid ranges.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(MIN_CHUNK_SIZE);
        self.io_threads = self.io_threads.max(1);
        self
    }

    /// Get the default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Fails when no home directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("io", "treesift", "treesift")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.json"))
    }
}
