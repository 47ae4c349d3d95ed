//! CLI presenter for output formatting

use colored::*;

use crate::application::jobs::RecoveryReport;
use crate::domain::units::ByteSize;

/// Presenter for CLI output formatting
pub struct Presenter;

impl Presenter {
    pub fn new() -> Self {
        Self
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Startup banner
    pub fn serving(&self, addr: &str, backend: &str, max_upload: ByteSize) {
        eprintln!(
            "{} Listening on {} ({} backend, uploads up to {})",
            "●".cyan(),
            format!("http://{}", addr).bold(),
            backend,
            max_upload.human_readable()
        );
    }

    /// Report what the startup sweep cleaned up, if anything
    pub fn recovery(&self, report: &RecoveryReport) {
        if let Some(summary) = Self::format_recovery(report) {
            if report.deletion_failures > 0 {
                self.warn(&summary);
            } else {
                self.info(&summary);
            }
        }
    }

    pub fn format_recovery(report: &RecoveryReport) -> Option<String> {
        if *report == RecoveryReport::default() {
            return None;
        }
        let mut summary = format!(
            "Recovered from previous run: {} media deleted, {} orphans deleted, {} jobs interrupted",
            report.blobs_deleted, report.orphans_deleted, report.jobs_interrupted
        );
        if report.deletion_failures > 0 {
            summary.push_str(&format!(", {} deletions failed", report.deletion_failures));
        }
        Some(summary)
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
