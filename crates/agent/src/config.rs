//! Agent configuration

use anyhow::{Context, Result};
use ironclad_lib::{LoopConfig, NormalReadingLevel, Thresholds};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the optional configuration file
const DEFAULT_CONFIG_FILE: &str = "/etc/ironclad/agent.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to every event
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// SQLite file holding the readings table
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Sentinel whose presence requests a crash
    #[serde(default = "default_crash_trigger")]
    pub crash_trigger_path: PathBuf,

    /// Sentinel whose presence requests a freeze
    #[serde(default = "default_freeze_trigger")]
    pub freeze_trigger_path: PathBuf,

    /// Pause between sampling cycles in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Values above this are WARNING
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Values above this are CRITICAL
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Event level for NORMAL readings (off, trace, debug, info)
    #[serde(default)]
    pub normal_reading_level: NormalReadingLevel,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub sample_seed: Option<u64>,

    /// Supervisor notification socket
    #[serde(default = "default_notify_socket")]
    pub notify_socket: Option<String>,

    /// Supervisor watchdog timeout in microseconds
    #[serde(default = "default_watchdog_usec")]
    pub watchdog_usec: Option<u64>,

    /// Prometheus textfile refreshed after each cycle
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

fn default_agent_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "ironclad".to_string())
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/opt/iiot_edge/data.db")
}

fn default_crash_trigger() -> PathBuf {
    PathBuf::from("/opt/iiot_edge/trigger_crash")
}

fn default_freeze_trigger() -> PathBuf {
    PathBuf::from("/opt/iiot_edge/trigger_freeze")
}

fn default_sample_interval() -> u64 {
    5
}

fn default_warning_threshold() -> f64 {
    100.0
}

fn default_critical_threshold() -> f64 {
    120.0
}

fn default_notify_socket() -> Option<String> {
    std::env::var("NOTIFY_SOCKET").ok()
}

fn default_watchdog_usec() -> Option<u64> {
    std::env::var("WATCHDOG_USEC").ok().and_then(|v| v.parse().ok())
}

impl AgentConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let file = std::env::var("IRONCLAD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(&file)
    }

    /// Load with `file` as the (optional) base layer under `IRONCLAD_*` variables
    pub fn load_from(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("IRONCLAD").try_parsing(true))
            .build()
            .context("failed to read agent configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("invalid agent configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0 {
            anyhow::bail!("sample_interval_secs must be greater than zero");
        }
        self.thresholds()?;
        Ok(())
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::new(self.warning_threshold, self.critical_threshold)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Supervisor watchdog timeout, if one is configured
    pub fn watchdog_timeout(&self) -> Option<Duration> {
        self.watchdog_usec
            .filter(|usec| *usec > 0)
            .map(Duration::from_micros)
    }

    /// True when the heartbeat cadence leaves less than 2x headroom
    pub fn watchdog_too_tight(&self) -> bool {
        self.watchdog_timeout()
            .is_some_and(|timeout| timeout < self.interval() * 2)
    }

    pub fn loop_config(&self) -> Result<LoopConfig> {
        Ok(LoopConfig {
            agent_name: self.agent_name.clone(),
            interval: self.interval(),
            thresholds: self.thresholds()?,
            normal_level: self.normal_reading_level,
            metrics_textfile: self.metrics_textfile.clone(),
        })
    }
}
