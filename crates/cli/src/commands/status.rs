//! Agent status overview

use anyhow::Result;
use colored::Colorize;
use ironclad_lib::Reading;
use serde::Serialize;

use crate::config::Paths;
use crate::output::{
    color_tier, color_trigger, format_timestamp, format_value, print_json, OutputFormat,
};

#[derive(Debug, Serialize)]
struct StatusReport {
    db_path: String,
    db_present: bool,
    schema_version: Option<i32>,
    readings: u64,
    last_reading: Option<Reading>,
    crash_trigger: bool,
    freeze_trigger: bool,
}

/// Show trigger state and a summary of the store
pub fn show_status(paths: &Paths, format: OutputFormat) -> Result<()> {
    let store = paths.open_store()?;
    let (schema_version, readings, last_reading) = match store.as_ref() {
        Some(store) => (
            Some(store.schema_version()?),
            store.count()?,
            store.latest()?,
        ),
        None => (None, 0, None),
    };

    let report = StatusReport {
        db_path: paths.db.display().to_string(),
        db_present: store.is_some(),
        schema_version,
        readings,
        last_reading,
        crash_trigger: paths.crash_trigger.exists(),
        freeze_trigger: paths.freeze_trigger.exists(),
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "IronClad Agent Status".bold());
            println!("{}", "=".repeat(40));
            println!("Database:       {}", report.db_path.cyan());
            println!("Readings:       {}", report.readings);
            if let Some(last) = report.last_reading.as_ref() {
                println!(
                    "Last reading:   #{} {} ({}) at {}",
                    last.id,
                    format_value(last.value),
                    color_tier(paths.thresholds.classify(last.value)),
                    format_timestamp(&last.timestamp)
                );
            }
            println!("Crash trigger:  {}", color_trigger(report.crash_trigger));
            println!("Freeze trigger: {}", color_trigger(report.freeze_trigger));
        }
    }

    Ok(())
}
