//! Fixed-size pool of hashing workers.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

use hashdex_core::{Candidate, FileRecord, HashAlgorithm, ProcessingError, ScanError};

use crate::hasher::ContentHasher;

/// Per-worker counters, summed when the pool is joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Files hashed successfully.
    pub files_hashed: u64,
    /// Bytes read by successful hashes.
    pub bytes_hashed: u64,
    /// Files that failed to hash.
    pub failures: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.files_hashed += other.files_hashed;
        self.bytes_hashed += other.bytes_hashed;
        self.failures += other.failures;
    }
}

/// Channels a worker reads from and writes to.
#[derive(Clone)]
pub struct WorkerChannels {
    /// Shared candidate queue.
    pub candidates: Receiver<Candidate>,
    /// Outbound records.
    pub results: Sender<FileRecord>,
    /// Outbound per-file errors.
    pub errors: Sender<ProcessingError>,
}

/// Running hashing workers.
///
/// Workers share nothing but their channels. Each one exits when the
/// candidate queue is closed and empty, dropping its result and error
/// senders; those queues close once the last worker is gone.
pub struct WorkerPool {
    handles: Vec<(String, JoinHandle<WorkerStats>)>,
}

impl WorkerPool {
    /// Spawn `count` workers.
    pub fn spawn(
        count: usize,
        algorithm: HashAlgorithm,
        buffer_size: usize,
        channels: WorkerChannels,
    ) -> Result<Self, ScanError> {
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let name = format!("hashdex-worker-{id}");
            let channels = channels.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    let hasher = ContentHasher::new(algorithm, buffer_size);
                    run_worker(id, hasher, channels)
                })
                .map_err(|source| ScanError::ThreadSpawn {
                    name: name.clone(),
                    source,
                })?;
            handles.push((name, handle));
        }

        Ok(Self { handles })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the pool has no workers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit and sum their counters.
    ///
    /// Only returns once the candidate queue has been closed and drained.
    pub fn join(self) -> Result<WorkerStats, ScanError> {
        let mut total = WorkerStats::default();
        let mut panicked = None;

        for (name, handle) in self.handles {
            match handle.join() {
                Ok(stats) => total.merge(stats),
                Err(_) => panicked = Some(name),
            }
        }

        match panicked {
            Some(name) => Err(ScanError::ThreadPanicked { name }),
            None => Ok(total),
        }
    }
}

fn run_worker(id: usize, mut hasher: ContentHasher, channels: WorkerChannels) -> WorkerStats {
    let mut stats = WorkerStats::default();
    let algorithm = hasher.algorithm();

    for candidate in channels.candidates.iter() {
        match hasher.hash_file(&candidate.path) {
            Ok(digest) => {
                stats.files_hashed += 1;
                stats.bytes_hashed += digest.bytes;
                let record = FileRecord::new(&candidate, algorithm, digest.hex);
                if channels.results.send(record).is_err() {
                    break;
                }
            }
            Err(failure) => {
                stats.failures += 1;
                let error = failure.into_processing_error(&candidate.path);
                if channels.errors.send(error).is_err() {
                    break;
                }
            }
        }
    }

    trace!(worker = id, files = stats.files_hashed, failures = stats.failures, "Worker exiting");
    stats
}
