//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use colored::Colorize;
use ironclad_lib::SeverityTier;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a pressure value in PSI
pub fn format_value(value: f64) -> String {
    format!("{:.2} PSI", value)
}

/// Format a stored timestamp in local time
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Color a tier name by severity
pub fn color_tier(tier: SeverityTier) -> String {
    match tier {
        SeverityTier::Normal => tier.as_str().green().to_string(),
        SeverityTier::Warning => tier.as_str().yellow().to_string(),
        SeverityTier::Critical => tier.as_str().red().bold().to_string(),
    }
}

/// Color a trigger state
pub fn color_trigger(raised: bool) -> String {
    if raised {
        "RAISED".red().bold().to_string()
    } else {
        "clear".green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(120.0), "120.00 PSI");
        assert_eq!(format_value(99.999), "100.00 PSI");
    }

    #[test]
    fn test_color_tier_keeps_name() {
        colored::control::set_override(false);
        assert_eq!(color_tier(SeverityTier::Critical), "critical");
        assert_eq!(color_trigger(true), "RAISED");
        assert_eq!(color_trigger(false), "clear");
    }
}
