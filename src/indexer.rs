//! Single-folder indexing
//!
//! The walker hands each directory's image files to a [`FolderIndexer`] as
//! one batch. [`DatabaseIndexer`] is the stock implementation backed by
//! [`ScanDatabase`].

use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::db::{ImageRecord, ScanDatabase};
use crate::error::ScanError;
use crate::path::join_name;

/// Indexes the image files of one directory.
///
/// Implementations must tolerate being called again with overlapping names;
/// a repeated batch over unchanged files should report zero changes.
pub trait FolderIndexer: Send + Sync {
    /// Index `names` below the canonical `parent` directory and return how
    /// many index entries were actually changed.
    fn index_batch(&self, parent: &str, names: &[String]) -> Result<u64, ScanError>;
}

impl<F> FolderIndexer for F
where
    F: Fn(&str, &[String]) -> Result<u64, ScanError> + Send + Sync,
{
    fn index_batch(&self, parent: &str, names: &[String]) -> Result<u64, ScanError> {
        self(parent, names)
    }
}

/// SQLite backed indexer recording size, mtime and optional MD5 per image
pub struct DatabaseIndexer {
    db: Mutex<ScanDatabase>,
    compute_hash: bool,
    large_file_threshold: u64,
}

impl DatabaseIndexer {
    /// Wrap an open database using the hash settings from `config`
    pub fn new(db: ScanDatabase, config: &ScanConfig) -> Self {
        Self {
            db: Mutex::new(db),
            compute_hash: config.compute_hash,
            large_file_threshold: config.large_file_threshold,
        }
    }

    /// Open the database named by `config.db_path`, or an in-memory one
    pub fn open(config: &ScanConfig) -> Result<Self, ScanError> {
        let db = match &config.db_path {
            Some(path) => ScanDatabase::open(path)?,
            None => ScanDatabase::open_memory()?,
        };
        Ok(Self::new(db, config))
    }

    /// Run a closure against the underlying database
    pub fn with_db<T>(&self, f: impl FnOnce(&ScanDatabase) -> T) -> T {
        f(&self.db.lock())
    }

    /// Stat (and optionally hash) one file; files that vanished are skipped
    fn read_record(&self, parent: &str, name: &str) -> Option<ImageRecord> {
        let path = join_name(parent, name);
        let metadata = std::fs::metadata(&path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let hash = if self.compute_hash {
            compute_file_hash(Path::new(&path), self.large_file_threshold).map(|(h, _)| h)
        } else {
            None
        };

        Some(ImageRecord {
            path,
            parent: parent.to_string(),
            name: name.to_string(),
            size: metadata.len(),
            mtime,
            hash,
        })
    }
}

impl FolderIndexer for DatabaseIndexer {
    fn index_batch(&self, parent: &str, names: &[String]) -> Result<u64, ScanError> {
        let records: Vec<ImageRecord> = names
            .par_iter()
            .filter_map(|name| self.read_record(parent, name))
            .collect();

        if records.len() < names.len() {
            log::debug!(
                "{} of {} files in {} could not be read",
                names.len() - records.len(),
                names.len(),
                parent
            );
        }

        self.db
            .lock()
            .upsert_if_changed(&records)
            .map_err(|e| ScanError::indexing_failure(PathBuf::from(parent), e.to_string()))
    }
}

/// Compute file hash (MD5)
/// For large files, compute partial hash (first 1MB + last 1MB)
fn compute_file_hash(path: &Path, large_file_threshold: u64) -> Option<(String, bool)> {
    use md5::{Digest, Md5};
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    let mut file = File::open(path).ok()?;
    let file_size = file.metadata().ok()?.len();

    let mut hasher = Md5::new();

    if file_size <= large_file_threshold {
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).ok()?;
        hasher.update(&buffer);
        Some((format!("{:x}", hasher.finalize()), false))
    } else {
        let chunk_size = 1024 * 1024; // 1MB
        let mut buffer = vec![0u8; chunk_size];

        let bytes_read = file.read(&mut buffer).ok()?;
        hasher.update(&buffer[..bytes_read]);

        if file_size > chunk_size as u64 {
            file.seek(SeekFrom::End(-(chunk_size as i64))).ok()?;
            let bytes_read = file.read(&mut buffer).ok()?;
            hasher.update(&buffer[..bytes_read]);
        }

        Some((format!("{:x}", hasher.finalize()), true))
    }
}
