//! Progress reporting for flattening
//!
//! Bars are drawn with `indicatif` and hidden entirely when progress is disabled,
//! so callers never need to branch on the setting.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporter for XML flattening
pub struct FlattenProgress {
    files_bar: ProgressBar,
}

impl FlattenProgress {
    /// Create a progress reporter over `total_files` files
    pub fn new(total_files: u64, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let files_bar = ProgressBar::new(total_files);
        files_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} files ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  "),
        );
        files_bar.enable_steady_tick(Duration::from_millis(100));

        Self { files_bar }
    }

    /// A reporter that draws nothing
    pub fn hidden() -> Self {
        Self {
            files_bar: ProgressBar::hidden(),
        }
    }

    /// Increment file progress by one
    pub fn inc_files(&self) {
        self.files_bar.inc(1);
    }

    /// Set a status message
    pub fn set_message(&self, msg: &str) {
        self.files_bar.set_message(msg.to_string());
    }

    /// Mark a file as skipped
    pub fn skip_file(&self, reason: &str) {
        self.files_bar.println(format!("  ⊘ Skipped: {}", reason));
        self.files_bar.inc(1);
    }

    /// Finish with success message
    pub fn finish_success(&self, msg: &str) {
        self.files_bar.finish_with_message(format!("✓ {}", msg));
    }

    /// Finish with error message
    pub fn finish_error(&self, msg: &str) {
        self.files_bar.abandon_with_message(format!("✗ {}", msg));
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.50 MB");
    }

    #[test]
    fn test_hidden_progress_is_inert() {
        let progress = FlattenProgress::new(10, false);
        progress.inc_files();
        progress.skip_file("bad.xml");
        progress.finish_success("done");
    }
}
