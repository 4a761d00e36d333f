//! Scanner module - depth-first walk feeding per-directory batches to an indexer

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::filter::{is_hidden_name, ImageFilter};
use crate::indexer::FolderIndexer;
use crate::path::try_canonical_path;
use crate::progress::ScanStatistics;

/// One-shot cancellation flag with an optional collector for unvisited paths.
///
/// When a collector is installed, every entry the walker reaches after the
/// flag is set is recorded instead of visited, so the collected paths form a
/// request that covers all unfinished work.
#[derive(Debug, Default)]
pub struct CancelSignal {
    cancelled: AtomicBool,
    pending: Mutex<Option<Vec<String>>>,
}

impl CancelSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag, installing `collector` for pending paths.
    ///
    /// Only the first call has an effect; returns false if already cancelled.
    pub fn cancel(&self, collector: Option<Vec<String>>) -> bool {
        let mut pending = self.pending.lock();
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        *pending = collector;
        self.cancelled.store(true, Ordering::Release);
        true
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Record an unvisited path if a collector is installed
    pub fn record_pending(&self, path: String) {
        if let Some(pending) = self.pending.lock().as_mut() {
            pending.push(path);
        }
    }

    /// Take the collected paths; `None` if no collector was installed
    pub fn take_pending(&self) -> Option<Vec<String>> {
        self.pending.lock().take()
    }
}

/// Depth-first traversal over directories and image files.
///
/// Each directory's image children go to the indexer as one batch, then the
/// walk recurses into non-hidden subdirectories in name order.
pub struct RecursiveWalker<'a> {
    indexer: &'a dyn FolderIndexer,
    filter: &'a ImageFilter,
    signal: &'a CancelSignal,
    stats: &'a ScanStatistics,
    visited: HashSet<String>,
}

impl<'a> RecursiveWalker<'a> {
    /// Create a walker over the given collaborators
    pub fn new(
        indexer: &'a dyn FolderIndexer,
        filter: &'a ImageFilter,
        signal: &'a CancelSignal,
        stats: &'a ScanStatistics,
    ) -> Self {
        Self {
            indexer,
            filter,
            signal,
            stats,
            visited: HashSet::new(),
        }
    }

    /// Walk all roots and return the total number of index entries changed
    pub fn walk<S: AsRef<str>>(&mut self, roots: &[S]) -> u64 {
        let mut count = 0;
        for root in roots {
            let root = root.as_ref();
            if !root.is_empty() {
                count += self.scan_dir_or_file(Path::new(root));
            }
        }
        count
    }

    fn scan_dir_or_file(&mut self, path: &Path) -> u64 {
        let Some(canonical) = try_canonical_path(path) else {
            return 0;
        };

        if self.signal.is_cancelled() {
            self.signal.record_pending(canonical);
            return 0;
        }

        if !self.visited.insert(canonical.clone()) {
            debug!("Already visited: {}", canonical);
            return 0;
        }

        let entry = Path::new(&canonical);
        if entry.is_dir() {
            return self.scan_dir(&canonical);
        }

        let name = match entry.file_name().and_then(|n| n.to_str()) {
            Some(name) if self.filter.is_image(name) => name.to_string(),
            _ => return 0,
        };
        let parent = entry
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        self.stats.set_current_folder(&parent);
        self.run_batch(&parent, vec![name])
    }

    fn scan_dir(&mut self, dir: &str) -> u64 {
        self.stats.enter_folder(dir);

        let (images, subdirs) = list_children(dir, self.filter);
        let mut count = 0;

        if !images.is_empty() {
            count += self.run_batch(dir, images);
        }

        for subdir in subdirs {
            count += self.scan_dir_or_file(&subdir);
        }
        count
    }

    /// Index one batch; a failing batch counts as zero changes
    fn run_batch(&self, parent: &str, names: Vec<String>) -> u64 {
        let count = match self.indexer.index_batch(parent, &names) {
            Ok(count) => count,
            Err(e) => {
                warn!("Indexing {} file(s) in {} failed: {}", names.len(), parent, e);
                0
            }
        };
        self.stats.add_processed(count);
        count
    }
}

/// List a directory's image file names and non-hidden subdirectories.
///
/// Unreadable entries are skipped; an unreadable directory yields nothing.
fn list_children(dir: &str, filter: &ImageFilter) -> (Vec<String>, Vec<PathBuf>) {
    let mut images = Vec::new();
    let mut subdirs = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let Some(name) = entry.file_name().to_str() else {
                    debug!("Skipping non UTF-8 entry in {}", dir);
                    continue;
                };
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    if !is_hidden_name(name) {
                        subdirs.push(entry.path().to_path_buf());
                    }
                } else if file_type.is_file() && filter.is_image(name) {
                    images.push(name.to_string());
                }
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(dir));
                debug!("{}", ScanError::path_unreadable(path, e.to_string()));
            }
        }
    }

    (images, subdirs)
}

/// Walk the configured roots on the calling thread, without cancellation
pub fn scan_full(config: &ScanConfig, indexer: &dyn FolderIndexer) -> u64 {
    let start = Instant::now();
    let filter = config.image_filter();
    let signal = CancelSignal::new();
    let stats = ScanStatistics::new();

    let changed =
        RecursiveWalker::new(indexer, &filter, &signal, &stats).walk(&config.root_strings());

    info!(
        "Scanned {} dir(s), {} change(s) in {}ms",
        stats.dirs_visited(),
        changed,
        start.elapsed().as_millis()
    );
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ScanDatabase;
    use crate::indexer::DatabaseIndexer;
    use proptest::prelude::*;
    use std::fs;

    /// Remembers every batch and reports one change per file
    #[derive(Default)]
    struct RecordingIndexer {
        batches: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FolderIndexer for RecordingIndexer {
        fn index_batch(&self, parent: &str, names: &[String]) -> Result<u64, ScanError> {
            self.batches.lock().push((parent.to_string(), names.to_vec()));
            Ok(names.len() as u64)
        }
    }

    fn touch(path: &Path) {
        fs::write(path, b"jpeg").unwrap();
    }

    fn canonical(path: &Path) -> String {
        try_canonical_path(path).unwrap()
    }

    /// ```text
    /// root/
    ///   top.jpg
    ///   notes.txt
    ///   x/  a.jpg b.JPEG
    ///   y/  c.jpg d.jpg e.jpg
    ///     deep/ f.jpg
    ///   .thumbs/ hidden.jpg
    ///     inner/ hidden2.jpg
    /// ```
    fn build_tree(root: &Path) {
        for dir in ["x", "y/deep", ".thumbs/inner"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for file in [
            "top.jpg",
            "notes.txt",
            "x/a.jpg",
            "x/b.JPEG",
            "y/c.jpg",
            "y/d.jpg",
            "y/e.jpg",
            "y/deep/f.jpg",
            ".thumbs/hidden.jpg",
            ".thumbs/inner/hidden2.jpg",
        ] {
            touch(&root.join(file));
        }
    }

    /// Creates one directory per entry under a previously created one, each
    /// holding one image. Returns how many directories, root included, are
    /// reachable without passing through a hidden one.
    fn generated_tree(root: &Path, dirs: &[(prop::sample::Index, bool)]) -> u64 {
        let mut nodes = vec![(root.to_path_buf(), true)];
        for (i, (parent, hidden)) in dirs.iter().enumerate() {
            let (parent_path, parent_visible) = nodes[parent.index(nodes.len())].clone();
            let name = if *hidden {
                format!(".d{}", i)
            } else {
                format!("d{}", i)
            };
            let path = parent_path.join(name);
            fs::create_dir(&path).unwrap();
            touch(&path.join("img.jpg"));
            nodes.push((path, parent_visible && !*hidden));
        }
        nodes.iter().filter(|(_, visible)| *visible).count() as u64
    }

    fn walk(
        indexer: &dyn FolderIndexer,
        signal: &CancelSignal,
        roots: &[String],
    ) -> (u64, ScanStatistics) {
        let filter = ImageFilter::default();
        let stats = ScanStatistics::new();
        let count = RecursiveWalker::new(indexer, &filter, signal, &stats).walk(roots);
        (count, stats)
    }

    #[test]
    fn test_one_batch_per_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let indexer = RecordingIndexer::default();

        let (count, stats) = walk(&indexer, &CancelSignal::new(), &[canonical(dir.path())]);

        assert_eq!(count, 7);
        assert_eq!(stats.processed(), 7);
        // root, x, y, y/deep; hidden subtree never entered
        assert_eq!(stats.dirs_visited(), 4);

        let batches = indexer.batches.lock();
        let parents: Vec<&str> = batches.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            parents,
            vec![
                canonical(dir.path()),
                canonical(&dir.path().join("x")),
                canonical(&dir.path().join("y")),
                canonical(&dir.path().join("y/deep")),
            ]
        );
        assert_eq!(batches[1].1, vec!["a.jpg".to_string(), "b.JPEG".to_string()]);
        assert!(batches
            .iter()
            .all(|(_, names)| names.iter().all(|n| !n.starts_with("hidden"))));
    }

    #[test]
    fn test_image_file_roots_indexed_directly() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let indexer = RecordingIndexer::default();
        let roots = vec![
            dir.path().join("x/a.jpg").to_string_lossy().to_string(),
            dir.path().join("y/c.jpg").to_string_lossy().to_string(),
            dir.path().join("notes.txt").to_string_lossy().to_string(),
        ];

        let (count, _) = walk(&indexer, &CancelSignal::new(), &roots);

        assert_eq!(count, 2);
        let batches = indexer.batches.lock();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, canonical(&dir.path().join("x")));
        assert_eq!(batches[0].1, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn test_hidden_root_is_still_walked() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let indexer = RecordingIndexer::default();

        let hidden_root = canonical(&dir.path().join(".thumbs"));

        let (count, _) = walk(&indexer, &CancelSignal::new(), &[hidden_root]);

        // the hidden rule applies to recursion, not to what the caller asked for
        assert_eq!(count, 2);
    }

    #[test]
    fn test_missing_and_empty_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = RecordingIndexer::default();
        let roots = vec![
            String::new(),
            dir.path().join("missing").to_string_lossy().to_string(),
        ];

        let (count, stats) = walk(&indexer, &CancelSignal::new(), &roots);

        assert_eq!(count, 0);
        assert_eq!(stats.dirs_visited(), 0);
        assert!(indexer.batches.lock().is_empty());
    }

    #[test]
    fn test_duplicate_roots_walked_once() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let indexer = RecordingIndexer::default();
        let root = canonical(dir.path());
        let dotted = dir.path().join("x/..").to_string_lossy().to_string();

        let (count, _) = walk(&indexer, &CancelSignal::new(), &[root, dotted]);

        assert_eq!(count, 7);
    }

    #[test]
    fn test_indexing_failure_does_not_abort_walk() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let indexer = |parent: &str, names: &[String]| -> Result<u64, ScanError> {
            if Path::new(parent).ends_with("x") {
                Err(ScanError::indexing_failure(PathBuf::from(parent), "disk full"))
            } else {
                Ok(names.len() as u64)
            }
        };

        let (count, stats) = walk(&indexer, &CancelSignal::new(), &[canonical(dir.path())]);

        assert_eq!(count, 5);
        assert_eq!(stats.dirs_visited(), 4);
    }

    #[test]
    fn test_cancel_with_collector_records_unvisited_subtrees() {
        // a/x holds 2 images, a/y holds 3; pause right after x's batch
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        fs::create_dir_all(a.join("x")).unwrap();
        fs::create_dir_all(a.join("y")).unwrap();
        for file in ["x/1.jpg", "x/2.jpg", "y/3.jpg", "y/4.jpg", "y/5.jpg"] {
            touch(&a.join(file));
        }

        let signal = CancelSignal::new();
        let indexer = |parent: &str, names: &[String]| -> Result<u64, ScanError> {
            if Path::new(parent).ends_with("x") {
                signal.cancel(Some(Vec::new()));
            }
            Ok(names.len() as u64)
        };

        let (count, _) = walk(&indexer, &signal, &[canonical(&a)]);
        assert_eq!(count, 2);

        let pending = signal.take_pending().unwrap();
        assert_eq!(pending, vec![canonical(&a.join("y"))]);

        let resumed = RecordingIndexer::default();
        let (count, _) = walk(&resumed, &CancelSignal::new(), &pending);
        assert_eq!(count, 3);
        assert_eq!(resumed.batches.lock()[0].1.len(), 3);
    }

    #[test]
    fn test_cancel_records_outer_siblings_and_roots() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let other = tempfile::tempdir().unwrap();
        touch(&other.path().join("z.jpg"));

        let signal = CancelSignal::new();
        let indexer = |parent: &str, names: &[String]| -> Result<u64, ScanError> {
            if Path::new(parent).ends_with("x") {
                signal.cancel(Some(Vec::new()));
            }
            Ok(names.len() as u64)
        };

        let roots = vec![canonical(dir.path()), canonical(other.path())];
        let (count, _) = walk(&indexer, &signal, &roots);

        // top.jpg + x
        assert_eq!(count, 3);
        assert_eq!(
            signal.take_pending().unwrap(),
            vec![canonical(&dir.path().join("y")), canonical(other.path())]
        );
    }

    #[test]
    fn test_cancel_without_collector_discards() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let signal = CancelSignal::new();
        assert!(signal.cancel(None));
        assert!(!signal.cancel(Some(Vec::new())));

        let indexer = RecordingIndexer::default();
        let (count, _) = walk(&indexer, &signal, &[canonical(dir.path())]);

        assert_eq!(count, 0);
        assert!(signal.take_pending().is_none());
        assert!(indexer.batches.lock().is_empty());
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        build_tree(dir.path());
        let config = ScanConfig::builder()
            .add_root(dir.path().to_path_buf())
            .compute_hash(false)
            .build();
        let indexer = DatabaseIndexer::new(ScanDatabase::open_memory().unwrap(), &config);

        assert_eq!(scan_full(&config, &indexer), 7);
        assert_eq!(scan_full(&config, &indexer), 0);
        assert_eq!(indexer.with_db(|db| db.image_count().unwrap()), 7);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_visits_every_non_hidden_directory(
            dirs in prop::collection::vec((any::<prop::sample::Index>(), any::<bool>()), 0..12)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let visible = generated_tree(dir.path(), &dirs);
            let indexer = RecordingIndexer::default();

            let (count, stats) = walk(&indexer, &CancelSignal::new(), &[canonical(dir.path())]);

            prop_assert_eq!(stats.dirs_visited(), visible);
            // every directory but the root holds one image
            prop_assert_eq!(count, visible - 1);
            prop_assert_eq!(indexer.batches.lock().len() as u64, visible - 1);
        }
    }
}
