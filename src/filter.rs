//! Image file and hidden directory predicates

use std::collections::HashSet;

/// Names starting with this marker are hidden and never recursed into
pub const HIDDEN_PREFIX: char = '.';

/// Check whether a directory entry name is hidden
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// Selects scannable image files by extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFilter {
    extensions: HashSet<String>,
}

impl ImageFilter {
    /// Create a filter for the given extensions (with or without leading dot)
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Check if a file name carries one of the image extensions
    pub fn is_image(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.contains(&ext.to_lowercase())
            }
            _ => false,
        }
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new(["jpg", "jpeg"])
    }
}
