//! Source file discovery

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{FlattenError, FlattenResult};

/// A discovered source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl DiscoveredFile {
    /// Create a new discovered file
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }

    /// File name as recorded in the `source_file` column
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Discover files matching a pattern in a local directory
///
/// Results are sorted by path so that surrogate keys, which follow first-seen order,
/// are stable across runs and platforms.
pub fn discover_files(base_path: &Path, pattern: &str) -> FlattenResult<Vec<DiscoveredFile>> {
    let mut files = Vec::new();

    let full_pattern = if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        let escaped = glob::Pattern::escape(&base_path.display().to_string());
        format!("{}/{}", escaped, pattern)
    };

    let entries = glob::glob(&full_pattern)
        .map_err(|e| FlattenError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    let metadata = fs::metadata(&path)?;
                    files.push(DiscoveredFile::new(path, metadata.len()));
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing path: {}", e);
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}
