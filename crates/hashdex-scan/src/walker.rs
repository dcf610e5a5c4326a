//! Single-threaded tree walk feeding the candidate queue.

use std::io;
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use hashdex_core::{Candidate, ErrorPhase, ProcessingError, ScanError, SpecialEntryPolicy};

use crate::classify::{Classification, Classifier, SkipReason};
use crate::progress::ScanEvent;

/// Counters kept by the walker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Candidates pushed onto the queue.
    pub candidates: u64,
    /// Directories descended into, including the root.
    pub dirs_visited: u64,
    /// Special entries skipped.
    pub skipped: u64,
    /// Entries removed by skip rules.
    pub pruned: u64,
    /// Entries skipped after a permission error.
    pub access_denied: u64,
}

/// What the walk produced besides its candidates.
#[derive(Debug)]
pub struct WalkOutcome {
    /// Resolved root (the configured root if it could not be resolved).
    pub root: PathBuf,
    /// Walk counters.
    pub stats: WalkStats,
    /// Set when the walk could not proceed at all.
    pub walk_error: Option<ScanError>,
}

/// Depth-first producer of hashing candidates.
///
/// Directory reads happen on the calling thread only. Pushing to a full
/// candidate queue blocks, which is what bounds memory when the walk is
/// faster than hashing.
pub struct TreeWalker {
    classifier: Classifier,
    special_entries: SpecialEntryPolicy,
    events: broadcast::Sender<ScanEvent>,
}

impl TreeWalker {
    /// Create a walker.
    pub fn new(
        classifier: Classifier,
        special_entries: SpecialEntryPolicy,
        events: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            classifier,
            special_entries,
            events,
        }
    }

    /// Walk `root`, pushing one candidate per hashable file.
    ///
    /// Takes the candidate sender by value: the queue is closed when this
    /// returns, whether the walk finished or stopped on a fatal error.
    pub fn walk(
        &self,
        root: &Path,
        candidates: Sender<Candidate>,
        errors: &Sender<ProcessingError>,
    ) -> WalkOutcome {
        let mut stats = WalkStats::default();

        let root = match resolve_root(root) {
            Ok(root) => root,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "Cannot walk root");
                return WalkOutcome {
                    root: root.to_path_buf(),
                    stats,
                    walk_error: Some(err),
                };
            }
        };

        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.classifier.rules().is_excluded(&root_name, &root) {
            debug!(root = %root.display(), "Root is excluded by skip rules");
            stats.pruned += 1;
            return WalkOutcome {
                root,
                stats,
                walk_error: None,
            };
        }

        let pruner = self.classifier.clone();
        let walker = WalkDir::new(&root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .process_read_dir(move |_depth, _path, _state, children| {
                for child in children.iter_mut().flatten() {
                    if !child.file_type.is_dir() {
                        continue;
                    }
                    let name = child.file_name.to_string_lossy();
                    let path = child.parent_path.join(&child.file_name);
                    if pruner.classify(&name, &path, child.file_type)
                        == Classification::PruneSubtree
                    {
                        child.read_children_path = None;
                    }
                }
            });

        let mut walk_error = None;

        for entry_result in walker {
            let mut entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let source = jwalk_io_error(err);
                    if path == root {
                        warn!(root = %root.display(), error = %source, "Walk aborted");
                        walk_error = Some(ScanError::io(&root, source));
                        break;
                    }
                    self.access_error(path, source, &mut stats, errors);
                    continue;
                }
            };

            // jwalk yields a directory it could not list as `Ok` and parks
            // the failure on the entry itself.
            let read_error = entry.read_children_error.take().map(jwalk_io_error);

            if entry.depth == 0 {
                if let Some(source) = read_error {
                    warn!(root = %root.display(), error = %source, "Walk aborted");
                    walk_error = Some(ScanError::io(&root, source));
                    break;
                }
                stats.dirs_visited += 1;
                continue;
            }

            let path = entry.path();
            let name = entry.file_name.to_string_lossy();

            match self.classifier.classify(&name, &path, entry.file_type) {
                Classification::Descend => match read_error {
                    Some(source) => self.access_error(path, source, &mut stats, errors),
                    None => stats.dirs_visited += 1,
                },
                Classification::PruneSubtree => {
                    debug!(path = %path.display(), "Pruned excluded directory");
                    stats.pruned += 1;
                }
                Classification::SkipEntry(SkipReason::Excluded) => {
                    debug!(path = %path.display(), "Skipped excluded entry");
                    stats.pruned += 1;
                }
                Classification::SkipEntry(reason) => {
                    stats.skipped += 1;
                    self.report_skip(path, reason);
                }
                Classification::Hash => {
                    let metadata = match entry.metadata() {
                        Ok(metadata) => metadata,
                        Err(err) => {
                            self.access_error(path, jwalk_io_error(err), &mut stats, errors);
                            continue;
                        }
                    };
                    let candidate = Candidate::from_metadata(path, &metadata);
                    if candidates.send(candidate).is_err() {
                        // Every worker is gone; nothing more can be hashed.
                        warn!("Candidate queue closed before the walk finished");
                        break;
                    }
                    stats.candidates += 1;
                }
            }
        }

        WalkOutcome {
            root,
            stats,
            walk_error,
        }
    }

    /// Handle a non-root access failure: permission errors are skipped,
    /// anything else is reported and the walk moves on.
    fn access_error(
        &self,
        path: PathBuf,
        source: io::Error,
        stats: &mut WalkStats,
        errors: &Sender<ProcessingError>,
    ) {
        if source.kind() == io::ErrorKind::PermissionDenied {
            debug!(path = %path.display(), "Permission denied, skipping");
            stats.access_denied += 1;
            return;
        }
        let _ = errors.send(ProcessingError::new(path, ErrorPhase::WalkAccess, source));
    }

    fn report_skip(&self, path: PathBuf, reason: SkipReason) {
        if self.special_entries == SpecialEntryPolicy::Silent {
            return;
        }
        debug!(path = %path.display(), reason = %reason, "Skipped special entry");
        let _ = self.events.send(ScanEvent::Skipped {
            path,
            reason,
        });
    }
}

fn jwalk_io_error(err: jwalk::Error) -> io::Error {
    err.into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop detected"))
}

/// Canonicalize the root and make sure it is a listable directory.
fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let resolved = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
    if !resolved.is_dir() {
        return Err(ScanError::NotADirectory { path: resolved });
    }
    std::fs::read_dir(&resolved).map_err(|e| ScanError::io(&resolved, e))?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::sync::Arc;

    use crossbeam_channel::unbounded;
    use hashdex_core::SkipRules;
    use tempfile::TempDir;

    fn walker(rules: SkipRules) -> TreeWalker {
        let (events, _) = broadcast::channel(16);
        TreeWalker::new(
            Classifier::new(Arc::new(rules)),
            SpecialEntryPolicy::Log,
            events,
        )
    }

    fn walk(walker: &TreeWalker, root: &Path) -> (WalkOutcome, Vec<Candidate>, Vec<ProcessingError>) {
        let (cand_tx, cand_rx) = unbounded();
        let (err_tx, err_rx) = unbounded();
        let outcome = walker.walk(root, cand_tx, &err_tx);
        drop(err_tx);
        (outcome, cand_rx.iter().collect(), err_rx.iter().collect())
    }

    fn names(candidates: &[Candidate]) -> BTreeSet<String> {
        candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_walk_finds_nested_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), "1").unwrap();
        fs::write(root.join("a/mid.txt"), "22").unwrap();
        fs::write(root.join("a/b/deep.txt"), "333").unwrap();

        let (outcome, candidates, errors) = walk(&walker(SkipRules::empty()), root);

        assert!(outcome.walk_error.is_none());
        assert!(errors.is_empty());
        assert_eq!(names(&candidates), set(&["deep.txt", "mid.txt", "top.txt"]));
        assert_eq!(outcome.stats.candidates, 3);
        assert_eq!(outcome.stats.dirs_visited, 3);
        assert!(candidates.iter().all(|c| c.path.is_absolute()));
    }

    #[test]
    fn test_candidate_carries_walk_time_metadata() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("sized.bin"), vec![7u8; 4321]).unwrap();

        let (_, candidates, _) = walk(&walker(SkipRules::empty()), temp.path());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].size, 4321);
    }

    #[test]
    fn test_excluded_directory_is_pruned_transitively() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".git/objects/ab")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join(".git/objects/ab/cdef"), "blob").unwrap();
        fs::write(root.join("README"), "hi").unwrap();

        let (outcome, candidates, _) = walk(&walker(SkipRules::default()), root);

        assert_eq!(names(&candidates), set(&["README"]));
        assert_eq!(outcome.stats.pruned, 1);
        assert!(candidates.iter().all(|c| !c.path.components().any(|p| p.as_os_str() == ".git")));
    }

    #[test]
    fn test_prefix_rule_prunes_subtree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("mnt/inner")).unwrap();
        fs::write(root.join("mnt/inner/x"), "x").unwrap();
        fs::write(root.join("keep"), "k").unwrap();

        let rules = SkipRules::empty().with_prefix(root.join("mnt"));
        let (_, candidates, _) = walk(&walker(rules), &root);
        assert_eq!(names(&candidates), set(&["keep"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), "s").unwrap();
        fs::write(temp.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("linkdir")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real.txt"), temp.path().join("link.txt"))
            .unwrap();

        let (outcome, candidates, _) = walk(&walker(SkipRules::empty()), temp.path());
        assert_eq!(names(&candidates), set(&["real.txt"]));
        assert_eq!(outcome.stats.skipped, 2);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        let (outcome, candidates, errors) = walk(&walker(SkipRules::empty()), &missing);
        assert!(matches!(outcome.walk_error, Some(ScanError::NotFound { .. })));
        assert!(candidates.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_file_root_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, "f").unwrap();

        let (outcome, _, _) = walk(&walker(SkipRules::empty()), &file);
        assert!(matches!(outcome.walk_error, Some(ScanError::NotADirectory { .. })));
    }

    #[test]
    fn test_excluded_root_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".svn");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("entries"), "e").unwrap();

        let (outcome, candidates, _) = walk(&walker(SkipRules::default()), &root);
        assert!(outcome.walk_error.is_none());
        assert!(candidates.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_pruned() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), "h").unwrap();
        fs::write(temp.path().join("open.txt"), "o").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read the directory anyway.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let (outcome, candidates, errors) = walk(&walker(SkipRules::empty()), temp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(outcome.walk_error.is_none());
        assert_eq!(names(&candidates), set(&["open.txt"]));
        assert!(errors.is_empty());
        assert_eq!(outcome.stats.access_denied, 1);
        assert_eq!(outcome.stats.dirs_visited, 1);
    }

    #[test]
    fn test_access_errors_split_by_kind() {
        let walker = walker(SkipRules::empty());
        let (err_tx, err_rx) = unbounded();
        let mut stats = WalkStats::default();

        walker.access_error(
            PathBuf::from("/data/private"),
            io::Error::from(io::ErrorKind::PermissionDenied),
            &mut stats,
            &err_tx,
        );
        walker.access_error(
            PathBuf::from("/data/flaky"),
            io::Error::other("input/output error"),
            &mut stats,
            &err_tx,
        );
        drop(err_tx);

        let errors: Vec<ProcessingError> = err_rx.iter().collect();
        assert_eq!(stats.access_denied, 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, PathBuf::from("/data/flaky"));
        assert_eq!(errors[0].phase, ErrorPhase::WalkAccess);
    }
}
