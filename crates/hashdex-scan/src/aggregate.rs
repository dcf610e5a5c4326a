//! Result and error collectors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use tokio::sync::broadcast;
use tracing::warn;

use hashdex_core::{FileRecord, ProcessingError, ScanError};

use crate::progress::{ScanEvent, ScanProgress};

/// Collects records until the result queue closes.
pub struct ResultAggregator {
    handle: JoinHandle<Vec<FileRecord>>,
}

impl ResultAggregator {
    /// Start collecting from `results`.
    ///
    /// Every `progress_interval` records (0 disables) a progress event is
    /// published; `errors_seen` is read for the error count it carries.
    pub fn spawn(
        results: Receiver<FileRecord>,
        errors_seen: Arc<AtomicU64>,
        events: broadcast::Sender<ScanEvent>,
        progress_interval: u64,
        started: Instant,
    ) -> Result<Self, ScanError> {
        let name = "hashdex-results";
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut records = Vec::new();
                for record in results.iter() {
                    records.push(record);
                    let done = records.len() as u64;
                    if progress_interval > 0 && done % progress_interval == 0 {
                        let _ = events.send(ScanEvent::Progress(ScanProgress {
                            files_hashed: done,
                            errors_count: errors_seen.load(Ordering::Relaxed),
                            current_path: records[records.len() - 1].full_path(),
                            elapsed: started.elapsed(),
                        }));
                    }
                }
                records
            })
            .map_err(|source| ScanError::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;

        Ok(Self { handle })
    }

    /// Wait for the queue to close and return every record received.
    pub fn join(self) -> Result<Vec<FileRecord>, ScanError> {
        self.handle.join().map_err(|_| ScanError::ThreadPanicked {
            name: "hashdex-results".to_string(),
        })
    }
}

/// Counts and reports per-path errors until the error queue closes.
pub struct ErrorAggregator {
    handle: JoinHandle<()>,
    count: Arc<AtomicU64>,
}

impl ErrorAggregator {
    /// Start draining `errors`.
    ///
    /// Each error is logged and published as it arrives; none of them
    /// stops the pipeline.
    pub fn spawn(
        errors: Receiver<ProcessingError>,
        events: broadcast::Sender<ScanEvent>,
    ) -> Result<Self, ScanError> {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let name = "hashdex-errors";

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for error in errors.iter() {
                    counter.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        path = %error.path.display(),
                        phase = %error.phase,
                        error = %error.source,
                        "Failed to process path"
                    );
                    let _ = events.send(ScanEvent::Error {
                        path: error.path,
                        phase: error.phase,
                        message: error.source.to_string(),
                    });
                }
            })
            .map_err(|source| ScanError::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;

        Ok(Self { handle, count })
    }

    /// Live view of the error count.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.count)
    }

    /// Wait for the queue to close and return the final count.
    pub fn join(self) -> Result<u64, ScanError> {
        self.handle.join().map_err(|_| ScanError::ThreadPanicked {
            name: "hashdex-errors".to_string(),
        })?;
        Ok(self.count.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    use crossbeam_channel::unbounded;
    use hashdex_core::{Candidate, ErrorPhase, HashAlgorithm};

    fn record(i: usize) -> FileRecord {
        let candidate = Candidate {
            path: PathBuf::from(format!("/d/f{i}")),
            size: 1,
            mode: 0,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(i as u64),
        };
        FileRecord::new(&candidate, HashAlgorithm::Md5, format!("{i:032x}"))
    }

    #[test]
    fn test_result_aggregator_drains_everything() {
        let (tx, rx) = unbounded();
        let (events, mut events_rx) = broadcast::channel(16);
        let agg = ResultAggregator::spawn(rx, Arc::new(AtomicU64::new(0)), events, 2, Instant::now())
            .unwrap();

        for i in 0..5 {
            tx.send(record(i)).unwrap();
        }
        drop(tx);

        let records = agg.join().unwrap();
        assert_eq!(records.len(), 5);

        let mut progress = 0;
        while let Ok(event) = events_rx.try_recv() {
            if let ScanEvent::Progress(p) = event {
                progress += 1;
                assert_eq!(p.files_hashed % 2, 0);
            }
        }
        assert_eq!(progress, 2);
    }

    #[test]
    fn test_error_aggregator_counts_and_publishes() {
        let (tx, rx) = unbounded();
        let (events, mut events_rx) = broadcast::channel(16);
        let agg = ErrorAggregator::spawn(rx, events).unwrap();
        let live = agg.counter();

        for phase in [ErrorPhase::HashOpen, ErrorPhase::HashRead, ErrorPhase::WalkAccess] {
            tx.send(ProcessingError::new(
                "/bad",
                phase,
                std::io::Error::other("boom"),
            ))
            .unwrap();
        }
        drop(tx);

        assert_eq!(agg.join().unwrap(), 3);
        assert_eq!(live.load(Ordering::Relaxed), 3);

        let mut seen = Vec::new();
        while let Ok(ScanEvent::Error { phase, message, .. }) = events_rx.try_recv() {
            assert_eq!(message, "boom");
            seen.push(phase);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_error_aggregator_without_subscribers() {
        let (tx, rx) = unbounded();
        let (events, _) = broadcast::channel(1);
        let agg = ErrorAggregator::spawn(rx, events).unwrap();
        for _ in 0..10 {
            tx.send(ProcessingError::new("/x", ErrorPhase::HashOpen, std::io::Error::other("e")))
                .unwrap();
        }
        drop(tx);
        assert_eq!(agg.join().unwrap(), 10);
    }
}
