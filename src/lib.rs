//! Recursive image rescanner with pausable background scans
//!
//! This library walks directory trees depth-first, hands each directory's
//! image files to a folder indexer in one batch, and runs that walk as a
//! background scan that can be cancelled outright or paused and resumed.

pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod indexer;
pub mod lifecycle;
pub mod models;
pub mod path;
pub mod progress;
pub mod registry;
pub mod scanner;

pub use config::ScanConfig;
pub use db::{ImageRecord, ScanDatabase};
pub use error::{ScanError, ScanErrorKind};
pub use filter::{is_hidden_name, ImageFilter, HIDDEN_PREFIX};
pub use indexer::{DatabaseIndexer, FolderIndexer};
pub use lifecycle::ScanLifecycle;
pub use models::{ScanOutcome, ScanProgress, ScanState};
pub use path::try_canonical_path;
pub use progress::{poll_until_settled, JsonProgressReporter, ProgressObserver, ScanStatistics};
pub use registry::ScanRegistry;
pub use scanner::{scan_full, CancelSignal, RecursiveWalker};
