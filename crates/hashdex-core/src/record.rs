//! Work items and output records.

use std::fs::Metadata;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::digest::HashAlgorithm;

/// Fixed UTC format of `FileRecord::modified_date`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A regular file discovered by the walker and queued for hashing.
///
/// The metadata is captured once at walk time and never re-read, so the
/// record reflects what the walker saw when it listed the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Size in bytes at walk time.
    pub size: u64,
    /// Permission and type bits (0 on platforms without Unix modes).
    pub mode: u32,
    /// Last modification time at walk time.
    pub modified: SystemTime,
}

impl Candidate {
    /// Create a candidate from a metadata snapshot.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        Self {
            path: path.into(),
            size: metadata.len(),
            mode: mode_bits(metadata),
            modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
        }
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn mode_bits(_metadata: &Metadata) -> u32 {
    0
}

/// Inventory entry for one successfully hashed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name without directory.
    pub name: CompactString,
    /// Containing directory, with a trailing separator.
    pub path: String,
    /// Modification time as `YYYY-MM-DDTHH:MM:SSZ`.
    pub modified_date: String,
    /// Digest algorithm used for `digest`.
    pub algorithm: HashAlgorithm,
    /// Hex-encoded digest of the file's contents.
    pub digest: String,
}

impl FileRecord {
    /// Build a record from a hashed candidate.
    pub fn new(candidate: &Candidate, algorithm: HashAlgorithm, digest: String) -> Self {
        let (path, name) = split_path(&candidate.path);
        Self {
            name,
            path,
            modified_date: format_timestamp(candidate.modified),
            algorithm,
            digest,
        }
    }

    /// Full path of the file this record describes.
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.path).join(self.name.as_str())
    }
}

/// Split a file path into its directory (with trailing separator) and name.
fn split_path(path: &Path) -> (String, CompactString) {
    let name = path
        .file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_default();

    let mut dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !dir.is_empty() && !dir.ends_with(MAIN_SEPARATOR) {
        dir.push(MAIN_SEPARATOR);
    }

    (dir, name)
}

/// Format a timestamp in the fixed UTC form used by records.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(TIMESTAMP_FORMAT).to_string()
}
