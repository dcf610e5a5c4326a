//! Path classification: hash, skip, descend or prune.

use std::fmt;
use std::fs::FileType;
use std::path::Path;
use std::sync::Arc;

use hashdex_core::SkipRules;

/// Why an entry produced no work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Symbolic link. Links are never followed.
    Symlink,
    /// Unix domain socket.
    Socket,
    /// Named pipe.
    Fifo,
    /// Block device node.
    BlockDevice,
    /// Character device node.
    CharDevice,
    /// Non-directory entry matching a skip rule.
    Excluded,
    /// Any other file type.
    Other,
}

impl SkipReason {
    /// Short identifier used in logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::Socket => "socket",
            Self::Fifo => "fifo",
            Self::BlockDevice => "block-device",
            Self::CharDevice => "char-device",
            Self::Excluded => "excluded",
            Self::Other => "special",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Regular file that should be hashed.
    Hash,
    /// Directory the walker should descend into.
    Descend,
    /// Single entry that produces no work item.
    SkipEntry(SkipReason),
    /// Excluded directory; its subtree must not be visited.
    PruneSubtree,
}

/// Pure classifier over names, paths and file types.
///
/// Uses only the file type the walker already obtained; never touches the
/// filesystem.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<SkipRules>,
}

impl Classifier {
    /// Create a classifier over a set of skip rules.
    pub fn new(rules: Arc<SkipRules>) -> Self {
        Self { rules }
    }

    /// The rules this classifier consults.
    pub fn rules(&self) -> &SkipRules {
        &self.rules
    }

    /// Classify an entry by base name, full path and file type.
    pub fn classify(&self, name: &str, path: &Path, file_type: FileType) -> Classification {
        if file_type.is_symlink() {
            return Classification::SkipEntry(SkipReason::Symlink);
        }

        let excluded = self.rules.is_excluded(name, path);
        if file_type.is_dir() {
            return if excluded {
                Classification::PruneSubtree
            } else {
                Classification::Descend
            };
        }
        if excluded {
            return Classification::SkipEntry(SkipReason::Excluded);
        }
        if file_type.is_file() {
            return Classification::Hash;
        }

        Classification::SkipEntry(special_reason(file_type))
    }
}

#[cfg(unix)]
fn special_reason(file_type: FileType) -> SkipReason {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_socket() {
        SkipReason::Socket
    } else if file_type.is_fifo() {
        SkipReason::Fifo
    } else if file_type.is_block_device() {
        SkipReason::BlockDevice
    } else if file_type.is_char_device() {
        SkipReason::CharDevice
    } else {
        SkipReason::Other
    }
}

#[cfg(not(unix))]
fn special_reason(_file_type: FileType) -> SkipReason {
    SkipReason::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_type(path: &Path) -> FileType {
        fs::symlink_metadata(path).unwrap().file_type()
    }

    fn classifier(rules: SkipRules) -> Classifier {
        Classifier::new(Arc::new(rules))
    }

    #[test]
    fn test_regular_file_is_hashed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let c = classifier(SkipRules::default());
        assert_eq!(c.classify("a.txt", &path, file_type(&path)), Classification::Hash);
    }

    #[test]
    fn test_directory_descend_and_prune() {
        let temp = TempDir::new().unwrap();
        let keep = temp.path().join("src");
        let skip = temp.path().join(".git");
        fs::create_dir(&keep).unwrap();
        fs::create_dir(&skip).unwrap();

        let c = classifier(SkipRules::default());
        assert_eq!(c.classify("src", &keep, file_type(&keep)), Classification::Descend);
        assert_eq!(c.classify(".git", &skip, file_type(&skip)), Classification::PruneSubtree);
    }

    #[test]
    fn test_prefix_prunes_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("mounted");
        fs::create_dir(&dir).unwrap();

        let c = classifier(SkipRules::empty().with_prefix(&dir));
        assert_eq!(c.classify("mounted", &dir, file_type(&dir)), Classification::PruneSubtree);
    }

    #[test]
    fn test_excluded_file_is_skipped_not_pruned() {
        let temp = TempDir::new().unwrap();
        // git worktrees use a plain file named .git
        let path = temp.path().join(".git");
        fs::write(&path, "gitdir: ../main/.git/worktrees/x").unwrap();

        let c = classifier(SkipRules::default());
        assert_eq!(
            c.classify(".git", &path, file_type(&path)),
            Classification::SkipEntry(SkipReason::Excluded)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_skipped() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target.txt");
        let link = temp.path().join("link.txt");
        fs::write(&target, "x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let c = classifier(SkipRules::empty());
        assert_eq!(
            c.classify("link.txt", &link, file_type(&link)),
            Classification::SkipEntry(SkipReason::Symlink)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_socket_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sock");
        let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();

        let c = classifier(SkipRules::empty());
        assert_eq!(
            c.classify("sock", &path, file_type(&path)),
            Classification::SkipEntry(SkipReason::Socket)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_char_device_is_skipped() {
        let path = Path::new("/dev/null");
        if !path.exists() {
            return;
        }
        let c = classifier(SkipRules::empty());
        assert_eq!(
            c.classify("null", path, file_type(path)),
            Classification::SkipEntry(SkipReason::CharDevice)
        );
    }
}
