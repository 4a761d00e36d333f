//! Configuration for the rescanner

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::filter::ImageFilter;

/// Default large file threshold (100 MB)
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Default interval between progress polls
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Configuration for the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root paths to scan (directories or image files)
    pub roots: Vec<PathBuf>,

    /// Image extensions to index, compared case-insensitively
    pub extensions: HashSet<String>,

    /// Whether to compute file hashes
    pub compute_hash: bool,

    /// Threshold for using partial hash (bytes)
    /// Files larger than this use partial hash (first 1MB + last 1MB)
    pub large_file_threshold: u64,

    /// Database path for the image index
    pub db_path: Option<PathBuf>,

    /// How often the stock reporter polls scan statistics
    pub progress_interval_ms: u64,

    /// Whether progress is written to stderr
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: Self::default_extensions(),
            compute_hash: true,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            db_path: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            show_progress: true,
        }
    }
}

impl ScanConfig {
    /// Create a new config with the given roots
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::invalid_config(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ScanError::invalid_config(path.to_path_buf(), e.to_string()))
    }

    /// Get the default image extensions
    pub fn default_extensions() -> HashSet<String> {
        ["jpg", "jpeg"].iter().map(|s| s.to_string()).collect()
    }

    /// Build the image filter for the configured extensions
    pub fn image_filter(&self) -> ImageFilter {
        ImageFilter::new(self.extensions.iter().map(String::as_str))
    }

    /// Roots as strings, the form a scan request takes
    pub fn root_strings(&self) -> Vec<String> {
        self.roots
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root paths
    pub fn roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.roots = roots;
        self
    }

    /// Add a root path
    pub fn add_root(mut self, root: PathBuf) -> Self {
        self.config.roots.push(root);
        self
    }

    /// Set the extensions whitelist
    pub fn extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.extensions = extensions;
        self
    }

    /// Add an extension to the whitelist
    pub fn add_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extensions.insert(ext.into().to_lowercase());
        self
    }

    /// Enable or disable hash computation
    pub fn compute_hash(mut self, enabled: bool) -> Self {
        self.config.compute_hash = enabled;
        self
    }

    /// Set the large file threshold
    pub fn large_file_threshold(mut self, threshold: u64) -> Self {
        self.config.large_file_threshold = threshold;
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = Some(path);
        self
    }

    /// Set the progress polling interval
    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
