//! Concurrent traversal-and-hashing pipeline for hashdex.
//!
//! # Overview
//!
//! `hashdex-scan` walks a directory tree and produces one [`FileRecord`]
//! per regular file, carrying its name, directory, modification time and a
//! content digest. Key features:
//!
//! - **Single-threaded walk** via jwalk, feeding a bounded candidate queue
//! - **Fixed worker pool** hashing files in streamed chunks
//! - **Partial-failure tolerance**: unreadable files become errors, never aborts
//! - **Skip rules** pruning excluded directories and path prefixes
//! - **Progress and error events** via a broadcast channel
//!
//! # Example
//!
//! ```rust,no_run
//! use hashdex_scan::{InventoryScanner, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let inventory = InventoryScanner::new().scan(&config).unwrap();
//!
//! println!("Hashed {} files", inventory.records.len());
//! println!("Errors: {}", inventory.error_count);
//! ```
//!
//! # Event Monitoring
//!
//! ```rust,no_run
//! use hashdex_scan::{InventoryScanner, ScanEvent};
//!
//! let scanner = InventoryScanner::new();
//! let mut events = scanner.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = events.blocking_recv() {
//!         if let ScanEvent::Progress(p) = event {
//!             println!("Hashed {} files", p.files_hashed);
//!         }
//!     }
//! });
//! ```

mod aggregate;
mod classify;
mod hasher;
mod pool;
mod progress;
mod scanner;
mod walker;

pub use aggregate::{ErrorAggregator, ResultAggregator};
pub use classify::{Classification, Classifier, SkipReason};
pub use hasher::{ContentHasher, FileDigest, HashFailure};
pub use pool::{WorkerChannels, WorkerPool, WorkerStats};
pub use progress::{ScanEvent, ScanProgress};
pub use scanner::InventoryScanner;
pub use walker::{TreeWalker, WalkOutcome, WalkStats};

// Re-export core types for convenience
pub use hashdex_core::{
    Candidate, ErrorPhase, FileRecord, HashAlgorithm, Inventory, InventoryStats,
    ProcessingError, ScanConfig, ScanError, SkipRules, SpecialEntryPolicy,
};
