//! Resolved locations and classification settings for the CLI

use anyhow::{Context, Result};
use ironclad_lib::{SqliteStore, Thresholds};
use std::path::PathBuf;

use crate::{Cli, Fault};

/// Everything a command needs to find the agent's state
#[derive(Debug, Clone)]
pub struct Paths {
    pub db: PathBuf,
    pub crash_trigger: PathBuf,
    pub freeze_trigger: PathBuf,
    pub thresholds: Thresholds,
}

impl Paths {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            db: cli.db.clone(),
            crash_trigger: cli.crash_trigger.clone(),
            freeze_trigger: cli.freeze_trigger.clone(),
            thresholds: Thresholds::new(cli.warning_threshold, cli.critical_threshold)?,
        })
    }

    pub fn trigger(&self, fault: Fault) -> &PathBuf {
        match fault {
            Fault::Crash => &self.crash_trigger,
            Fault::Freeze => &self.freeze_trigger,
        }
    }

    /// Open the agent's store read-only, `None` if it holds no readings table yet
    pub fn open_store(&self) -> Result<Option<SqliteStore>> {
        if !self.db.exists() {
            return Ok(None);
        }

        let store = SqliteStore::open_read_only(&self.db)
            .with_context(|| format!("Failed to open {}", self.db.display()))?;
        if !store
            .has_readings()
            .with_context(|| format!("Failed to read schema of {}", self.db.display()))?
        {
            return Ok(None);
        }
        Ok(Some(store))
    }
}
