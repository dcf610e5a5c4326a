//! Completed scan output and statistics.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::record::FileRecord;

/// Counters collected over one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Regular files queued for hashing.
    pub candidates: u64,
    /// Files hashed successfully.
    pub files_hashed: u64,
    /// Bytes read by successful hashes.
    pub bytes_hashed: u64,
    /// Directories descended into.
    pub dirs_visited: u64,
    /// Special entries skipped (symlinks, sockets, devices, FIFOs).
    pub skipped: u64,
    /// Directories and files dropped by skip rules.
    pub pruned: u64,
    /// Entries skipped because access was denied during the walk.
    pub access_denied: u64,
}

impl InventoryStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a finished scan, handed to the serializer.
#[derive(Debug)]
pub struct Inventory {
    /// Root that was scanned.
    pub root: PathBuf,
    /// Records in completion order (not traversal order).
    pub records: Vec<FileRecord>,
    /// Number of per-path errors reported during the scan.
    pub error_count: u64,
    /// Set when the walk could not proceed at all.
    pub walk_error: Option<ScanError>,
    /// Scan counters.
    pub stats: InventoryStats,
    /// Wall time of the scan.
    pub duration: Duration,
}

impl Inventory {
    /// Whether the walk finished without a fatal error.
    pub fn is_complete(&self) -> bool {
        self.walk_error.is_none()
    }

    /// Number of records collected.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no file was hashed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
