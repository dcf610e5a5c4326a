//! Exclusion rules consulted by the path classifier.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Base names skipped by default: version control metadata, trash and
/// recycle bins, and volume metadata directories.
const DEFAULT_NAMES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "$RECYCLE.BIN",
    ".Trash",
    ".Trashes",
    ".Spotlight-V100",
    ".fseventsd",
    ".DocumentRevisions-V100",
    "System Volume Information",
    "lost+found",
];

/// Virtual filesystems skipped by default.
const DEFAULT_PREFIXES: &[&str] = &["/proc", "/sys", "/dev"];

/// Immutable set of excluded base names and path prefixes.
///
/// Built once before a scan starts and shared read-only with the walker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRules {
    /// Exact base names to exclude.
    #[serde(default)]
    pub names: BTreeSet<String>,
    /// Path prefixes to exclude (matched component-wise).
    #[serde(default)]
    pub prefixes: Vec<PathBuf>,
}

impl SkipRules {
    /// Rules that exclude nothing.
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
            prefixes: Vec::new(),
        }
    }

    /// Add an excluded base name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Add an excluded path prefix.
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Check whether an entry is excluded by name or by path prefix.
    pub fn is_excluded(&self, name: &str, path: &Path) -> bool {
        self.names.contains(name) || self.prefixes.iter().any(|p| path.starts_with(p))
    }

    /// Resolve every prefix to the form walked paths take.
    ///
    /// Walked paths hang off a canonical root, so a prefix must be
    /// canonical too before `starts_with` can match it. Prefixes that do
    /// not exist are made absolute against the current directory instead.
    pub fn normalized(&self) -> Self {
        let prefixes = self
            .prefixes
            .iter()
            .map(|prefix| {
                prefix
                    .canonicalize()
                    .or_else(|_| std::path::absolute(prefix))
                    .unwrap_or_else(|_| prefix.clone())
            })
            .collect();
        Self {
            names: self.names.clone(),
            prefixes,
        }
    }

    /// Check whether no rule is configured.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prefixes.is_empty()
    }
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            names: DEFAULT_NAMES.iter().map(|n| n.to_string()).collect(),
            prefixes: DEFAULT_PREFIXES.iter().map(PathBuf::from).collect(),
        }
    }
}
