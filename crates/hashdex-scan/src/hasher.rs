//! Streaming content hashing.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use thiserror::Error;

use hashdex_core::{ErrorPhase, HashAlgorithm, ProcessingError};

/// Why hashing a file failed.
#[derive(Debug, Error)]
pub enum HashFailure {
    /// The file could not be opened.
    #[error("open failed: {0}")]
    Open(#[source] io::Error),
    /// A read failed part way through the file.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
}

impl HashFailure {
    /// Pipeline phase this failure belongs to.
    pub fn phase(&self) -> ErrorPhase {
        match self {
            Self::Open(_) => ErrorPhase::HashOpen,
            Self::Read(_) => ErrorPhase::HashRead,
        }
    }

    /// Attach the failing path.
    pub fn into_processing_error(self, path: &Path) -> ProcessingError {
        let phase = self.phase();
        let source = match self {
            Self::Open(e) | Self::Read(e) => e,
        };
        ProcessingError::new(path, phase, source)
    }
}

/// Digest of one file's full byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Hex-encoded digest.
    pub hex: String,
    /// Number of bytes fed to the digest.
    pub bytes: u64,
}

/// Incremental digest state for the supported algorithms.
enum DigestState {
    Blake3(Box<blake3::Hasher>),
    Md5(Md5),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(hasher) => {
                hasher.update(data);
            }
            Self::Md5(hasher) => hasher.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
            Self::Md5(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Hashes files in fixed-size chunks with a reusable buffer.
///
/// Each worker owns one hasher, so peak memory is one buffer per worker
/// regardless of file sizes. Failures are never retried.
pub struct ContentHasher {
    algorithm: HashAlgorithm,
    buffer: Vec<u8>,
}

impl ContentHasher {
    /// Create a hasher with the given algorithm and chunk size.
    pub fn new(algorithm: HashAlgorithm, buffer_size: usize) -> Self {
        Self {
            algorithm,
            buffer: vec![0; buffer_size.max(1)],
        }
    }

    /// Algorithm applied by this hasher.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the file at `path`.
    ///
    /// The handle is closed before returning on every path, including read
    /// failures.
    pub fn hash_file(&mut self, path: &Path) -> Result<FileDigest, HashFailure> {
        let mut file = File::open(path).map_err(HashFailure::Open)?;
        let result = self.hash_reader(&mut file);
        drop(file);
        result.map_err(HashFailure::Read)
    }

    /// Hash everything `reader` yields until EOF.
    pub fn hash_reader<R: Read>(&mut self, reader: &mut R) -> io::Result<FileDigest> {
        let mut state = DigestState::new(self.algorithm);
        let mut bytes = 0u64;

        loop {
            let n = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            state.update(&self.buffer[..n]);
            bytes += n as u64;
        }

        Ok(FileDigest {
            hex: state.finalize_hex(),
            bytes,
        })
    }
}
