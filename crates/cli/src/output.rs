//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Color a test status for terminal display
pub fn color_status(status: &str) -> String {
    match status {
        "pending" => status.yellow().to_string(),
        "running" => status.blue().to_string(),
        "cooling-down" => status.cyan().to_string(),
        "completed" => status.green().to_string(),
        "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Render an epoch-milliseconds timestamp for display
pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Render the wall-clock duration of a run
pub fn format_duration(started_at: i64, completed_at: Option<i64>) -> String {
    match completed_at {
        Some(end) => format!("{:.1}s", (end - started_at) as f64 / 1000.0),
        None => "-".to_string(),
    }
}

/// Render an optional numeric cell
pub fn format_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Render an optional float with one decimal
pub fn format_opt_f64(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}
