//! Observability infrastructure for the edge agent
//!
//! Provides:
//! - Prometheus metrics, optionally exported to a textfile collector
//! - The event sink: one structured tracing event per classification and
//!   lifecycle transition

use crate::error::AgentError;
use crate::models::SeverityTier;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, info, trace, warn};

/// Default histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    readings_total: IntCounterVec,
    last_reading_value: Gauge,
    cycle_latency_seconds: Histogram,
    heartbeats_sent: IntCounter,
    liveness_failures: IntCounter,
    readings_persisted: IntCounter,
    last_reading_id: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            readings_total: register_int_counter_vec!(
                "ironclad_readings_total",
                "Readings sampled, by severity tier",
                &["tier"]
            )
            .expect("Failed to register readings_total"),

            last_reading_value: register_gauge!(
                "ironclad_last_reading_value",
                "Most recently sampled pressure value"
            )
            .expect("Failed to register last_reading_value"),

            cycle_latency_seconds: register_histogram!(
                "ironclad_cycle_latency_seconds",
                "Time spent in one sample/classify/persist cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            heartbeats_sent: register_int_counter!(
                "ironclad_heartbeats_sent_total",
                "Watchdog notifications delivered to the supervisor"
            )
            .expect("Failed to register heartbeats_sent"),

            liveness_failures: register_int_counter!(
                "ironclad_liveness_failures_total",
                "Liveness notifications that could not be delivered"
            )
            .expect("Failed to register liveness_failures"),

            readings_persisted: register_int_counter!(
                "ironclad_readings_persisted_total",
                "Readings durably committed to the store"
            )
            .expect("Failed to register readings_persisted"),

            last_reading_id: register_int_gauge!(
                "ironclad_last_reading_id",
                "Id of the most recently persisted reading"
            )
            .expect("Failed to register last_reading_id"),
        }
    }
}

/// Agent metrics handle
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn record_reading(&self, tier: SeverityTier, value: f64) {
        self.inner()
            .readings_total
            .with_label_values(&[tier.as_str()])
            .inc();
        self.inner().last_reading_value.set(value);
    }

    pub fn record_persisted(&self, id: i64) {
        self.inner().readings_persisted.inc();
        self.inner().last_reading_id.set(id);
    }

    pub fn readings_persisted(&self) -> u64 {
        self.inner().readings_persisted.get()
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn record_liveness(&self, delivered: bool) {
        if delivered {
            self.inner().heartbeats_sent.inc();
        } else {
            self.inner().liveness_failures.inc();
        }
    }

    pub fn readings_for(&self, tier: SeverityTier) -> u64 {
        self.inner()
            .readings_total
            .with_label_values(&[tier.as_str()])
            .get()
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Atomically replace `path` with the current exposition
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let body = self.render()?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Severity attached to an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Trace,
    Debug,
    Info,
    Warning,
    Critical,
    Error,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Trace => "trace",
            EventSeverity::Debug => "debug",
            EventSeverity::Info => "info",
            EventSeverity::Warning => "warning",
            EventSeverity::Critical => "critical",
            EventSeverity::Error => "error",
        }
    }

    /// The tracing level this severity is emitted at
    pub fn level(&self) -> tracing::Level {
        match self {
            EventSeverity::Trace => tracing::Level::TRACE,
            EventSeverity::Debug => tracing::Level::DEBUG,
            EventSeverity::Info => tracing::Level::INFO,
            EventSeverity::Warning => tracing::Level::WARN,
            EventSeverity::Critical | EventSeverity::Error => tracing::Level::ERROR,
        }
    }
}

/// Severity used for readings in the normal tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalReadingLevel {
    Off,
    Trace,
    #[default]
    Debug,
    Info,
}

impl NormalReadingLevel {
    fn severity(&self) -> Option<EventSeverity> {
        match self {
            NormalReadingLevel::Off => None,
            NormalReadingLevel::Trace => Some(EventSeverity::Trace),
            NormalReadingLevel::Debug => Some(EventSeverity::Debug),
            NormalReadingLevel::Info => Some(EventSeverity::Info),
        }
    }
}

impl std::str::FromStr for NormalReadingLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" | "silent" => Ok(Self::Off),
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => anyhow::bail!("unknown normal reading level '{other}'"),
        }
    }
}

/// Structured event sink for the agent
#[derive(Clone)]
pub struct EventLog {
    agent: String,
    normal_level: NormalReadingLevel,
}

impl EventLog {
    pub fn new(agent: impl Into<String>, normal_level: NormalReadingLevel) -> Self {
        Self {
            agent: agent.into(),
            normal_level,
        }
    }

    /// Severity a reading of `tier` is emitted at, `None` when suppressed
    pub fn severity_for(&self, tier: SeverityTier) -> Option<EventSeverity> {
        match tier {
            SeverityTier::Critical => Some(EventSeverity::Critical),
            SeverityTier::Warning => Some(EventSeverity::Warning),
            SeverityTier::Normal => self.normal_level.severity(),
        }
    }

    /// Emit the event for one classified reading
    pub fn log_reading(&self, value: f64, tier: SeverityTier) -> Option<EventSeverity> {
        let severity = self.severity_for(tier)?;
        let value = (value * 100.0).round() / 100.0;

        match severity {
            EventSeverity::Critical | EventSeverity::Error => error!(
                event = "reading",
                agent = %self.agent,
                severity = severity.as_str(),
                tier = tier.as_str(),
                value,
                "Pressure surge {value:.2} PSI"
            ),
            EventSeverity::Warning => warn!(
                event = "reading",
                agent = %self.agent,
                severity = severity.as_str(),
                tier = tier.as_str(),
                value,
                "Pressure high {value:.2} PSI"
            ),
            EventSeverity::Info => info!(
                event = "reading",
                agent = %self.agent,
                severity = severity.as_str(),
                tier = tier.as_str(),
                value,
                "Pressure normal {value:.2} PSI"
            ),
            EventSeverity::Debug => debug!(
                event = "reading",
                agent = %self.agent,
                severity = severity.as_str(),
                tier = tier.as_str(),
                value,
                "Pressure normal {value:.2} PSI"
            ),
            EventSeverity::Trace => trace!(
                event = "reading",
                agent = %self.agent,
                severity = severity.as_str(),
                tier = tier.as_str(),
                value,
                "Pressure normal {value:.2} PSI"
            ),
        }

        Some(severity)
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            agent = %self.agent,
            severity = EventSeverity::Info.as_str(),
            agent_version = %version,
            "IronClad agent started"
        );
    }

    /// Log that startup finished and the supervisor was told
    pub fn log_ready(&self, delivered: bool) {
        info!(
            event = "agent_ready",
            agent = %self.agent,
            severity = EventSeverity::Info.as_str(),
            notified = delivered,
            "Agent ready, entering sampling loop"
        );
    }

    /// Log a crash request from the fault injector
    pub fn log_crash_requested(&self) {
        error!(
            event = "fault_requested",
            agent = %self.agent,
            severity = EventSeverity::Critical.as_str(),
            fault = "crash",
            "Chaos: crash trigger activated"
        );
    }

    /// Log a freeze request from the fault injector
    pub fn log_freeze_requested(&self) {
        warn!(
            event = "freeze_requested",
            agent = %self.agent,
            severity = EventSeverity::Warning.as_str(),
            fault = "freeze",
            "Chaos: freeze trigger activated"
        );
    }

    /// Log release of a frozen agent by a test harness
    pub fn log_thawed(&self) {
        info!(
            event = "agent_thawed",
            agent = %self.agent,
            severity = EventSeverity::Info.as_str(),
            "Frozen agent released"
        );
    }

    /// Log a fatal failure at the loop boundary
    pub fn log_fatal(&self, err: &AgentError) {
        error!(
            event = "agent_fatal",
            agent = %self.agent,
            severity = EventSeverity::Error.as_str(),
            error = %err,
            error_chain = %error_chain(err),
            "Agent crashed"
        );
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
