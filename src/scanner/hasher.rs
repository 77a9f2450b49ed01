//! Content hasher with streaming support.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing content digests
//! of files using bounded-size chunks, so memory use does not grow with the
//! file and a stalled read only ever blocks a single call.
//!
//! Digests are rendered as lowercase hexadecimal [`ContentDigest`] values.
//! Both sides of any comparison must use the same [`HashAlgorithm`].
//!
//! # Example
//!
//! ```no_run
//! use treesift::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Sha256);
//! let digest = hasher.digest(Path::new("photo.jpg")).unwrap();
//! println!("{}", digest);
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use digest::Digest;
use serde::{Deserialize, Serialize};

use super::HashError;

/// Smallest chunk the hasher will read at a time (1 MiB).
pub const MIN_CHUNK_SIZE: usize = 1024 * 1024;

/// Default chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = MIN_CHUNK_SIZE;

/// Digest algorithms understood by the hasher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256 (the default)
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-224
    #[serde(rename = "sha224")]
    Sha224,
    /// SHA-384
    #[serde(rename = "sha384")]
    Sha384,
    /// SHA-512
    #[serde(rename = "sha512")]
    Sha512,
    /// SHA3-256
    #[serde(rename = "sha3-256")]
    Sha3_256,
    /// SHA3-512
    #[serde(rename = "sha3-512")]
    Sha3_512,
    /// BLAKE2b-512
    #[serde(rename = "blake2b")]
    Blake2b,
    /// BLAKE3
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlgorithm {
    /// All supported algorithms.
    pub const ALL: [HashAlgorithm; 8] = [
        Self::Sha256,
        Self::Sha224,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_256,
        Self::Sha3_512,
        Self::Blake2b,
        Self::Blake3,
    ];

    /// Canonical name, as accepted on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha224 => "sha224",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_512 => "sha3-512",
            Self::Blake2b => "blake2b",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the hex-encoded digest.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha224 => 56,
            Self::Sha256 | Self::Sha3_256 | Self::Blake3 => 64,
            Self::Sha384 => 96,
            Self::Sha512 | Self::Sha3_512 | Self::Blake2b => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown hash algorithm '{0}' (expected one of: sha256, sha224, sha384, sha512, sha3-256, sha3-512, blake2b, blake3)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        let wanted = match wanted.as_str() {
            "sha-256" => "sha256",
            "sha-512" => "sha512",
            "blake2b512" | "blake2b-512" => "blake2b",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == wanted)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Fixed-length content identifier, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Wrap an existing hex digest, normalizing it to lowercase.
    #[must_use]
    pub fn from_hex(hex: &str) -> Self {
        Self(hex.to_ascii_lowercase())
    }

    /// The hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streaming file hasher.
///
/// Cheap to clone and safe to share between worker threads; every call to
/// [`Hasher::digest`] owns its own accumulator and buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl Hasher {
    /// Create a hasher with the default chunk size.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different chunk size. Values below [`MIN_CHUNK_SIZE`] are raised to it.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compute the digest of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or a read fails
    /// mid-stream. Callers skip the file and carry on.
    pub fn digest(&self, path: &Path) -> Result<ContentDigest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.digest_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Compute the digest of any byte stream.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub fn digest_reader<R: Read>(&self, reader: R) -> std::io::Result<ContentDigest> {
        let hex = match self.algorithm {
            HashAlgorithm::Sha256 => stream::<sha2::Sha256, _>(reader, self.chunk_size)?,
            HashAlgorithm::Sha224 => stream::<sha2::Sha224, _>(reader, self.chunk_size)?,
            HashAlgorithm::Sha384 => stream::<sha2::Sha384, _>(reader, self.chunk_size)?,
            HashAlgorithm::Sha512 => stream::<sha2::Sha512, _>(reader, self.chunk_size)?,
            HashAlgorithm::Sha3_256 => stream::<sha3::Sha3_256, _>(reader, self.chunk_size)?,
            HashAlgorithm::Sha3_512 => stream::<sha3::Sha3_512, _>(reader, self.chunk_size)?,
            HashAlgorithm::Blake2b => stream::<blake2::Blake2b512, _>(reader, self.chunk_size)?,
            HashAlgorithm::Blake3 => stream_blake3(reader, self.chunk_size)?,
        };
        Ok(ContentDigest(hex))
    }
}

/// Feed `reader` through a RustCrypto digest in `chunk_size` pieces.
fn stream<D: Digest, R: Read>(mut reader: R, chunk_size: usize) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let count = read_chunk(&mut reader, &mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

fn stream_blake3<R: Read>(mut reader: R, chunk_size: usize) -> std::io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let count = read_chunk(&mut reader, &mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Read once, retrying on `Interrupted`.
fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
