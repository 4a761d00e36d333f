//! Canonical path helpers

use log::debug;
use std::path::Path;

use crate::error::ScanError;

/// Resolve a path to its canonical absolute form.
///
/// Returns `None` when the path does not exist, cannot be resolved, or is
/// not valid UTF-8. Callers treat that as an unreadable path and skip it.
pub fn try_canonical_path(path: &Path) -> Option<String> {
    let canonical = match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(e) => {
            let err = ScanError::path_unreadable(path.to_path_buf(), e.to_string());
            debug!("Skipping path: {}", err);
            return None;
        }
    };

    match canonical.into_os_string().into_string() {
        Ok(s) => Some(s),
        Err(raw) => {
            debug!("Skipping non UTF-8 path: {:?}", raw);
            None
        }
    }
}

/// Join a file name onto a canonical parent path
pub fn join_name(parent: &str, name: &str) -> String {
    Path::new(parent).join(name).to_string_lossy().to_string()
}
