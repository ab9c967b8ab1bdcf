//! Flattening statistics

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Statistics from a flattening run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenStats {
    /// Number of files matching the pattern
    pub files_discovered: usize,
    /// Number of files parsed into rows
    pub files_parsed: usize,
    /// Number of files skipped because they failed to parse
    pub files_skipped: usize,
    /// Rows in the wide table
    pub rows: usize,
    /// Columns in the wide table
    pub columns: usize,
    /// Total bytes read
    pub bytes_processed: u64,
    /// Number of errors encountered
    pub errors_count: usize,
    /// List of errors (limited to first 100)
    pub errors: Vec<String>,
    /// Duration of the run
    #[serde(skip)]
    pub duration: Duration,
}

impl FlattenStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error (limited to 100)
    pub fn add_error(&mut self, error: String) {
        self.errors_count += 1;
        if self.errors.len() < 100 {
            self.errors.push(error);
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_cap() {
        let mut stats = FlattenStats::new();
        for i in 0..150 {
            stats.add_error(format!("error {i}"));
        }
        assert_eq!(stats.errors_count, 150);
        assert_eq!(stats.errors.len(), 100);
    }

    #[test]
    fn test_duration_formatting() {
        let mut stats = FlattenStats::new();

        stats.duration = Duration::from_secs(9);
        assert_eq!(stats.duration_string(), "9s");

        stats.duration = Duration::from_secs(90);
        assert_eq!(stats.duration_string(), "1m 30s");

        stats.duration = Duration::from_secs(3661);
        assert_eq!(stats.duration_string(), "1h 1m 1s");
    }
}
