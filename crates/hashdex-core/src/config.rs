//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::digest::HashAlgorithm;
use crate::error::ScanError;
use crate::rules::SkipRules;

/// Smallest accepted hasher read buffer.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Largest accepted hasher read buffer.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Upper bound for the auto-detected worker count. Explicit values may exceed it.
const MAX_DEFAULT_WORKERS: usize = 64;

/// What to do with entries that are neither regular files nor directories
/// (symbolic links, sockets, FIFOs, device nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialEntryPolicy {
    /// Skip the entry and report it on the log and event stream.
    #[default]
    Log,
    /// Skip the entry without any notification.
    Silent,
}

/// Configuration for an inventory scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directory to inventory.
    pub root: PathBuf,

    /// Number of hashing workers.
    #[builder(default = "default_workers()")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Candidate queue capacity as a multiple of `workers`.
    #[builder(default = "2")]
    #[serde(default = "default_queue_factor")]
    pub queue_factor: usize,

    /// Digest algorithm applied to file contents.
    #[builder(default)]
    #[serde(default)]
    pub algorithm: HashAlgorithm,

    /// Read chunk size used by the hasher.
    #[builder(default = "DEFAULT_BUFFER_SIZE")]
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Names and path prefixes excluded from the scan.
    #[builder(default)]
    #[serde(default)]
    pub skip_rules: SkipRules,

    /// Handling of symlinks, sockets, FIFOs and devices.
    #[builder(default)]
    #[serde(default)]
    pub special_entries: SpecialEntryPolicy,

    /// Emit a progress event every N completed files (0 = never).
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

/// Worker count derived from available parallelism, at least 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

fn default_queue_factor() -> usize {
    2
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_progress_interval() -> u64 {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.workers == Some(0) {
            return Err("Worker count must be at least 1".to_string());
        }
        if self.queue_factor == Some(0) {
            return Err("Queue factor must be at least 1".to_string());
        }
        if let Some(size) = self.buffer_size {
            check_buffer_size(size)?;
        }
        Ok(())
    }
}

fn check_buffer_size(size: usize) -> Result<(), String> {
    if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&size) {
        return Err(format!(
            "Buffer size {size} outside {MIN_BUFFER_SIZE}..={MAX_BUFFER_SIZE} bytes"
        ));
    }
    Ok(())
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config for scanning a path with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: default_workers(),
            queue_factor: default_queue_factor(),
            algorithm: HashAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            skip_rules: SkipRules::default(),
            special_entries: SpecialEntryPolicy::default(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Capacity of the bounded candidate queue.
    pub fn queue_capacity(&self) -> usize {
        self.workers.saturating_mul(self.queue_factor).max(1)
    }

    /// Re-check the invariants the builder enforces.
    ///
    /// Configs can be assembled field by field or deserialized, so the
    /// scanner calls this before starting any thread.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |message: String| ScanError::InvalidConfig { message };
        if self.root.as_os_str().is_empty() {
            return Err(invalid("Root path cannot be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(invalid("Worker count must be at least 1".to_string()));
        }
        if self.queue_factor == 0 {
            return Err(invalid("Queue factor must be at least 1".to_string()));
        }
        check_buffer_size(self.buffer_size).map_err(invalid)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
