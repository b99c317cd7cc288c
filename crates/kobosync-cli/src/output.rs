//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use kobosync_core::readwise::PushReport;
use kobosync_core::SyncReport;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the summary of a sync run
    pub fn print_sync_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                for line in sync_report_lines(report) {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => {
                for failure in &report.failures {
                    println!("{}", failure.title);
                }
            }
        }
    }

    /// Print the outcome of a Readwise push
    pub fn print_push_report(&self, report: &PushReport) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Sent {} highlight(s) to Readwise", report.sent);
                if report.skipped > 0 {
                    println!("  Skipped {} without text", report.skipped);
                }
            }
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a fatal error
    pub fn error(&self, error: &anyhow::Error) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": format!("{:#}", error)})
                );
            }
            OutputFormat::Human | OutputFormat::Quiet => eprintln!("Error: {:#}", error),
        }
    }

    fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: unable to encode output: {}", e),
        }
    }
}

/// Human-readable summary of a sync run
fn sync_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();

    if report.dry_run {
        lines.push("Dry run - nothing was written".to_string());
    }
    lines.push(format!(
        "Found {} highlight(s){}",
        report.highlights_found,
        if report.full_sync { " (full sync)" } else { "" }
    ));
    if report.highlights_without_book > 0 {
        lines.push(format!(
            "  Skipped {} without a book",
            report.highlights_without_book
        ));
    }

    let verb = if report.dry_run { "To write" } else { "Written" };
    lines.push(format!(
        "{}: {} highlight(s) in {} book(s)",
        verb, report.highlights_written, report.books_written
    ));
    lines.push(format!("Up to date: {} book(s)", report.books_unchanged));

    if !report.failures.is_empty() {
        lines.push(format!("Failed: {} book(s)", report.failures.len()));
        for failure in &report.failures {
            lines.push(format!("  ✗ {}: {}", failure.title, failure.error));
        }
    }

    if let Some(ref error) = report.cursor_error {
        lines.push(format!("⚠ Sync time not saved: {}", error));
    }

    if report.is_clean() && !report.dry_run {
        lines.push("✓ Sync complete".to_string());
    }
    lines
}
