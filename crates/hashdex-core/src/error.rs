//! Error types for inventory scans.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that stop a scan from starting or from walking its root.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A pipeline thread could not be started.
    #[error("Failed to spawn {name}: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline thread panicked.
    #[error("{name} panicked")]
    ThreadPanicked { name: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Stage of the pipeline in which a per-file error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    /// Listing or stat-ing an entry during the walk.
    WalkAccess,
    /// Opening a file for hashing.
    HashOpen,
    /// Reading a file's bytes while hashing.
    HashRead,
}

impl ErrorPhase {
    /// Short identifier used in logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WalkAccess => "walk-access",
            Self::HashOpen => "hash-open",
            Self::HashRead => "hash-read",
        }
    }

    /// Whether the error came from a hashing worker.
    pub fn is_hash_phase(&self) -> bool {
        matches!(self, Self::HashOpen | Self::HashRead)
    }
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure isolated to a single path. Never aborts the scan.
#[derive(Debug, Error)]
#[error("{phase} error at {}: {source}", .path.display())]
pub struct ProcessingError {
    /// Path that failed.
    pub path: PathBuf,
    /// Where it failed.
    pub phase: ErrorPhase,
    /// Underlying cause.
    #[source]
    pub source: std::io::Error,
}

impl ProcessingError {
    /// Create a new processing error.
    pub fn new(path: impl Into<PathBuf>, phase: ErrorPhase, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            phase,
            source,
        }
    }
}
