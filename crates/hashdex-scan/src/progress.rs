//! Scan progress and side-channel events.

use std::path::PathBuf;
use std::time::Duration;

use hashdex_core::ErrorPhase;

use crate::classify::SkipReason;

/// Capacity of the event broadcast channel.
pub(crate) const EVENT_CAPACITY: usize = 1024;

/// Progress information during a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Files hashed so far.
    pub files_hashed: u64,
    /// Errors reported so far.
    pub errors_count: u64,
    /// Most recently completed file.
    pub current_path: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate hashing rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_hashed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Files hashed plus files that failed.
    pub fn total_items(&self) -> u64 {
        self.files_hashed + self.errors_count
    }
}

/// Notification published on the scanner's broadcast channel.
///
/// Publishing never blocks: events are dropped when nobody subscribes,
/// and a slow subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// The pipeline started.
    Started {
        /// Root being scanned.
        root: PathBuf,
        /// Number of hashing workers.
        workers: usize,
    },
    /// Periodic progress update.
    Progress(ScanProgress),
    /// A single path failed.
    Error {
        /// Offending path.
        path: PathBuf,
        /// Phase in which it failed.
        phase: ErrorPhase,
        /// Human-readable cause.
        message: String,
    },
    /// An entry was skipped without hashing.
    Skipped {
        /// Skipped path.
        path: PathBuf,
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// The pipeline drained completely.
    Finished(ScanProgress),
}
