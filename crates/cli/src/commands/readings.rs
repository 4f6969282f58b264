//! Reading inspection commands

use anyhow::Result;
use colored::Colorize;
use ironclad_lib::{Reading, ReadingStats, SeverityTier, TierCounts};
use serde::Serialize;
use tabled::Tabled;

use crate::config::Paths;
use crate::output::{
    color_tier, format_timestamp, format_value, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for readings table
#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Tier")]
    tier: String,
}

#[derive(Serialize)]
struct ReadingJson<'a> {
    #[serde(flatten)]
    reading: &'a Reading,
    tier: SeverityTier,
}

#[derive(Serialize)]
struct StatsJson {
    #[serde(flatten)]
    stats: ReadingStats,
    tiers: TierCounts,
}

/// Show the newest readings
pub fn show_readings(paths: &Paths, limit: usize, format: OutputFormat) -> Result<()> {
    let Some(store) = paths.open_store()? else {
        return report_missing(paths, format);
    };
    let readings = store.recent(limit)?;

    match format {
        OutputFormat::Json => {
            let items: Vec<ReadingJson<'_>> = readings
                .iter()
                .map(|reading| ReadingJson {
                    reading,
                    tier: paths.thresholds.classify(reading.value),
                })
                .collect();
            print_json(&items)?;
        }
        OutputFormat::Table => {
            let rows: Vec<ReadingRow> = readings
                .iter()
                .map(|r| ReadingRow {
                    id: r.id,
                    timestamp: format_timestamp(&r.timestamp),
                    value: format_value(r.value),
                    tier: color_tier(paths.thresholds.classify(r.value)),
                })
                .collect();
            print_table(&rows);
            println!("\nShowing {} of {} readings", rows.len(), store.count()?);
        }
    }

    Ok(())
}

/// Show aggregate statistics
pub fn show_stats(paths: &Paths, format: OutputFormat) -> Result<()> {
    let Some(store) = paths.open_store()? else {
        return report_missing(paths, format);
    };
    let stats = store.stats()?;
    let tiers = store.tier_counts(&paths.thresholds)?;

    match format {
        OutputFormat::Json => print_json(&StatsJson { stats, tiers })?,
        OutputFormat::Table => {
            println!("{}", "Reading Statistics".bold());
            println!("{}", "=".repeat(40));
            println!("Readings:  {}", stats.count.to_string().cyan());
            if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
                println!("Min:       {}", format_value(min));
                println!("Max:       {}", format_value(max));
                println!("Mean:      {}", format_value(mean));
            }
            if let Some(first) = stats.first_at.as_ref() {
                println!("First:     {}", format_timestamp(first));
            }
            if let Some(last) = stats.last_at.as_ref() {
                println!("Last:      {}", format_timestamp(last));
            }
            println!();
            println!("{}", "Tiers".bold());
            println!("  {:<10} {}", color_tier(SeverityTier::Normal), tiers.normal);
            println!("  {:<10} {}", color_tier(SeverityTier::Warning), tiers.warning);
            println!("  {:<10} {}", color_tier(SeverityTier::Critical), tiers.critical);
        }
    }

    Ok(())
}

fn report_missing(paths: &Paths, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&Vec::<Reading>::new()),
        OutputFormat::Table => {
            print_warning(&format!("No readings database at {}", paths.db.display()));
            Ok(())
        }
    }
}
