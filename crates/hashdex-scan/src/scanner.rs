//! Pipeline coordinator: walker, worker pool and aggregators.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use tokio::sync::broadcast;
use tracing::info;

use hashdex_core::{Inventory, InventoryStats, ScanConfig, ScanError};

use crate::aggregate::{ErrorAggregator, ResultAggregator};
use crate::classify::Classifier;
use crate::pool::{WorkerChannels, WorkerPool};
use crate::progress::{EVENT_CAPACITY, ScanEvent, ScanProgress};
use crate::walker::{TreeWalker, WalkOutcome};

/// Builds a content inventory of a directory tree.
///
/// One thread walks, `config.workers` threads hash, and two threads
/// collect records and errors.
pub struct InventoryScanner {
    events_tx: broadcast::Sender<ScanEvent>,
}

impl InventoryScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { events_tx }
    }

    /// Subscribe to progress, error and skip notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events_tx.subscribe()
    }

    /// Scan `config.root` and return every record produced.
    ///
    /// Fails only on invalid configuration or when a pipeline thread cannot
    /// be started or panics. A root that cannot be walked is reported in
    /// [`Inventory::walk_error`] alongside whatever was collected.
    pub fn scan(&self, config: &ScanConfig) -> Result<Inventory, ScanError> {
        config.validate()?;
        let started = Instant::now();

        info!(
            root = %config.root.display(),
            workers = config.workers,
            algorithm = %config.algorithm,
            "Starting inventory scan"
        );
        let _ = self.events_tx.send(ScanEvent::Started {
            root: config.root.clone(),
            workers: config.workers,
        });

        let (candidate_tx, candidate_rx) = bounded(config.queue_capacity());
        let (result_tx, result_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();

        let errors = ErrorAggregator::spawn(error_rx, self.events_tx.clone())?;
        let results = ResultAggregator::spawn(
            result_rx,
            errors.counter(),
            self.events_tx.clone(),
            config.progress_interval,
            started,
        )?;

        let pool = WorkerPool::spawn(
            config.workers,
            config.algorithm,
            config.buffer_size,
            WorkerChannels {
                candidates: candidate_rx,
                results: result_tx,
                errors: error_tx.clone(),
            },
        )?;

        let walker = TreeWalker::new(
            Classifier::new(Arc::new(config.skip_rules.normalized())),
            config.special_entries,
            self.events_tx.clone(),
        );
        let root = config.root.clone();
        // The walker owns the only candidate sender and the last error
        // sender outside the pool. Once it returns the candidate queue is
        // closed; once the pool is joined, results and errors close too.
        let walk_handle = thread::Builder::new()
            .name("hashdex-walker".to_string())
            .spawn(move || walker.walk(&root, candidate_tx, &error_tx))
            .map_err(|source| ScanError::ThreadSpawn {
                name: "hashdex-walker".to_string(),
                source,
            })?;

        let walk = walk_handle.join().map_err(|_| ScanError::ThreadPanicked {
            name: "hashdex-walker".to_string(),
        });
        let hashed = pool.join();
        let records = results.join()?;
        let error_count = errors.join()?;
        let WalkOutcome {
            root,
            stats: walk_stats,
            walk_error,
        } = walk?;
        let hashed = hashed?;

        let duration = started.elapsed();
        let stats = InventoryStats {
            candidates: walk_stats.candidates,
            files_hashed: hashed.files_hashed,
            bytes_hashed: hashed.bytes_hashed,
            dirs_visited: walk_stats.dirs_visited,
            skipped: walk_stats.skipped,
            pruned: walk_stats.pruned,
            access_denied: walk_stats.access_denied,
        };

        info!(
            files = records.len(),
            errors = error_count,
            bytes = stats.bytes_hashed,
            duration_ms = duration.as_millis() as u64,
            "Inventory scan finished"
        );
        let _ = self.events_tx.send(ScanEvent::Finished(ScanProgress {
            files_hashed: records.len() as u64,
            errors_count: error_count,
            current_path: root.clone(),
            elapsed: duration,
        }));

        Ok(Inventory {
            root,
            records,
            error_count,
            walk_error,
            stats,
            duration,
        })
    }
}

impl Default for InventoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let config = ScanConfig::new(temp.path());

        let inventory = InventoryScanner::new().scan(&config).unwrap();

        assert!(inventory.is_complete());
        assert_eq!(inventory.len(), 4);
        assert_eq!(inventory.error_count, 0);
        assert_eq!(inventory.stats.candidates, 4);
        assert_eq!(inventory.stats.files_hashed, 4);
        assert_eq!(inventory.stats.dirs_visited, 4);
        assert_eq!(inventory.stats.bytes_hashed, 5 + 17 + 4 + 17);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScanConfig::new(".");
        config.workers = 0;
        assert!(matches!(
            InventoryScanner::new().scan(&config),
            Err(ScanError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_missing_root_reports_walk_error() {
        let temp = TempDir::new().unwrap();
        let config = ScanConfig::new(temp.path().join("missing"));

        let inventory = InventoryScanner::new().scan(&config).unwrap();
        assert!(!inventory.is_complete());
        assert!(inventory.is_empty());
        assert_eq!(inventory.error_count, 0);
    }

    #[test]
    fn test_events_bracket_the_scan() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .progress_interval(1u64)
            .build()
            .unwrap();

        let scanner = InventoryScanner::new();
        let mut rx = scanner.subscribe();
        scanner.scan(&config).unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ScanEvent::Started { .. })));
        assert!(matches!(events.last(), Some(ScanEvent::Finished(p)) if p.files_hashed == 4));
        let progress = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Progress(_)))
            .count();
        assert_eq!(progress, 4);
    }
}
