//! Error types for the rescanner

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Another scan already holds the active slot in running state
    AlreadyRunning,
    /// Path could not be canonicalized or listed
    PathUnreadable,
    /// The folder indexer failed for one directory
    IndexingFailure,
    /// Completion handling found the active slot claimed by someone else
    PauseRaceLost,
    /// The registry this scan belongs to no longer exists
    RegistryDropped,
    /// I/O error outside of traversal (e.g. spawning the worker)
    IoError,
    /// Database operation failed
    DatabaseError,
    /// Configuration could not be loaded
    InvalidConfig,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create an already-running error for the scan with the given label
    pub fn already_running(label: &str) -> Self {
        Self::new(
            ScanErrorKind::AlreadyRunning,
            None,
            format!("Scan already running: {}", label),
        )
    }

    /// Create a path unreadable error
    pub fn path_unreadable(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::PathUnreadable, Some(path), message)
    }

    /// Create an indexing failure for one directory
    pub fn indexing_failure(parent: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IndexingFailure, Some(parent), message)
    }

    /// Create a lost pause race error
    pub fn pause_race_lost(label: &str) -> Self {
        Self::new(
            ScanErrorKind::PauseRaceLost,
            None,
            format!("Active slot was reassigned before '{}' could hand over", label),
        )
    }

    /// Create an error for a scan whose registry was dropped
    pub fn registry_dropped(label: &str) -> Self {
        Self::new(
            ScanErrorKind::RegistryDropped,
            None,
            format!("Registry of scan '{}' no longer exists", label),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::DatabaseError, None, message)
    }

    /// Create a configuration error
    pub fn invalid_config(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidConfig, Some(path), message)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::NotFound => {
                ScanErrorKind::PathUnreadable
            }
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        Self::database_error(err.to_string())
    }
}
