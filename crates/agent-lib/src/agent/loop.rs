//! Agent loop
//!
//! State machine: `Starting -> Ready -> Running`, then one of the terminal
//! states. Each running cycle checks the crash signal, then the freeze
//! signal, then samples, classifies, emits, persists and heartbeats.

use crate::error::AgentError;
use crate::fault::FaultSignalSource;
use crate::liveness::{LivenessReporter, Notifier};
use crate::models::{AgentState, ReadingId, SeverityTier};
use crate::observability::{AgentMetrics, EventLog, EventSeverity, NormalReadingLevel};
use crate::sampler::{Sampler, Thresholds};
use crate::store::ReadingStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Name attached to every emitted event
    pub agent_name: String,
    /// Pause after each completed cycle (default: 5 seconds)
    pub interval: Duration,
    /// Severity cut points
    pub thresholds: Thresholds,
    /// Level for readings in the normal tier
    pub normal_level: NormalReadingLevel,
    /// Prometheus textfile to refresh after each cycle
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            agent_name: "ironclad".to_string(),
            interval: Duration::from_secs(5),
            thresholds: Thresholds::default(),
            normal_level: NormalReadingLevel::default(),
            metrics_textfile: None,
        }
    }
}

/// What one completed cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub id: ReadingId,
    pub value: f64,
    pub tier: SeverityTier,
    /// Severity of the emitted event, `None` when suppressed
    pub severity: Option<EventSeverity>,
    /// Whether the watchdog notification reached the supervisor
    pub heartbeat_delivered: bool,
}

/// Result of a single cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    CrashRequested,
    FreezeRequested,
}

/// Why the loop stopped
#[derive(Debug)]
pub enum Termination {
    /// Crash signal observed
    Fault,
    /// Unhandled failure reached the loop boundary
    Fatal(AgentError),
    /// A frozen agent was released by its fault signal source
    Thawed,
}

impl Termination {
    /// Process exit status for this termination
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn state(&self) -> AgentState {
        match self {
            Termination::Fault => AgentState::TerminatedFault,
            Termination::Fatal(_) => AgentState::TerminatedFatal,
            Termination::Thawed => AgentState::Frozen,
        }
    }
}

/// The agent loop; owns the store connection for its lifetime
pub struct AgentLoop {
    store: Box<dyn ReadingStore>,
    signals: Arc<dyn FaultSignalSource>,
    reporter: LivenessReporter,
    sampler: Sampler,
    events: EventLog,
    metrics: AgentMetrics,
    config: LoopConfig,
    state: AgentState,
    last_observed: Option<DateTime<Utc>>,
}

impl AgentLoop {
    /// Create a new agent loop in the `Starting` state
    pub fn new(
        store: Box<dyn ReadingStore>,
        signals: Arc<dyn FaultSignalSource>,
        notifier: Arc<dyn Notifier>,
        sampler: Sampler,
        config: LoopConfig,
    ) -> Self {
        let events = EventLog::new(config.agent_name.clone(), config.normal_level);

        Self {
            store,
            signals,
            reporter: LivenessReporter::new(notifier),
            sampler,
            events,
            metrics: AgentMetrics::new(),
            config,
            state: AgentState::Starting,
            last_observed: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Initialize the store and announce readiness
    ///
    /// Leaves the loop in `Running`. A store failure is returned unchanged;
    /// no readiness is announced in that case.
    pub fn start(&mut self) -> Result<(), AgentError> {
        self.store.initialize()?;
        self.state = AgentState::Ready;

        let delivered = self.reporter.announce_ready();
        self.events.log_ready(delivered);
        self.state = AgentState::Running;
        Ok(())
    }

    /// Run one cycle without the trailing sleep
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, AgentError> {
        if self.signals.crash_requested().await {
            self.events.log_crash_requested();
            self.state = AgentState::TerminatedFault;
            return Ok(CycleOutcome::CrashRequested);
        }

        if self.signals.freeze_requested().await {
            self.events.log_freeze_requested();
            self.state = AgentState::Frozen;
            return Ok(CycleOutcome::FreezeRequested);
        }

        let started = Instant::now();

        let value = self.sampler.sample();
        let tier = self.config.thresholds.classify(value);
        let severity = self.events.log_reading(value, tier);
        self.metrics.record_reading(tier, value);

        let observed_at = self.observation_time();
        let id = self.store.append(value, observed_at)?;
        self.last_observed = Some(observed_at);
        self.metrics.record_persisted(id);

        let heartbeat_delivered = self.reporter.heartbeat();
        self.metrics.record_liveness(heartbeat_delivered);
        self.metrics
            .observe_cycle_latency(started.elapsed().as_secs_f64());
        self.export_metrics();

        debug!(id, value, tier = tier.as_str(), "Cycle complete");

        Ok(CycleOutcome::Completed(CycleReport {
            id,
            value,
            tier,
            severity,
            heartbeat_delivered,
        }))
    }

    /// Run until a terminal state is reached
    ///
    /// Only returns on a crash request, a fatal failure, or when a frozen
    /// agent is thawed by its signal source. Never returns during normal
    /// operation.
    pub async fn run(mut self) -> Termination {
        self.events.log_startup(env!("CARGO_PKG_VERSION"));

        match self.run_until_terminal().await {
            Ok(termination) => termination,
            Err(err) => {
                self.events.log_fatal(&err);
                self.state = AgentState::TerminatedFatal;
                Termination::Fatal(err)
            }
        }
    }

    async fn run_until_terminal(&mut self) -> Result<Termination, AgentError> {
        self.start()?;

        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            warning_above = self.config.thresholds.warning_above,
            critical_above = self.config.thresholds.critical_above,
            "Starting sampling loop"
        );

        loop {
            match self.run_cycle().await? {
                CycleOutcome::Completed(_) => tokio::time::sleep(self.config.interval).await,
                CycleOutcome::CrashRequested => return Ok(Termination::Fault),
                CycleOutcome::FreezeRequested => return Ok(self.park().await),
            }
        }
    }

    /// Frozen: no further cycles or heartbeats until the source thaws us
    async fn park(&mut self) -> Termination {
        // Status is informational and does not feed the watchdog.
        self.reporter.status("frozen (fault injection)");
        self.signals.thawed().await;
        self.events.log_thawed();
        Termination::Thawed
    }

    /// Wall-clock time, clamped so stored timestamps never go backwards
    fn observation_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_observed {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn export_metrics(&self) {
        let Some(path) = self.config.metrics_textfile.as_deref() else {
            return;
        };
        if let Err(e) = self.metrics.write_textfile(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }
}

/// Builder for creating the agent loop
pub struct AgentLoopBuilder {
    store: Option<Box<dyn ReadingStore>>,
    signals: Option<Arc<dyn FaultSignalSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    sampler: Option<Sampler>,
    config: LoopConfig,
}

impl AgentLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            store: None,
            signals: None,
            notifier: None,
            sampler: None,
            config: LoopConfig::default(),
        }
    }

    /// Set the reading store
    pub fn store(mut self, store: Box<dyn ReadingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the fault signal source
    pub fn signals(mut self, signals: Arc<dyn FaultSignalSource>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Set the liveness notifier
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the sampler (defaults to an entropy-seeded one)
    pub fn sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Replace the whole loop configuration
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pause between cycles
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the severity thresholds
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Build the agent loop
    pub fn build(self) -> Result<AgentLoop> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Reading store is required"))?;
        let signals = self
            .signals
            .ok_or_else(|| anyhow::anyhow!("Fault signal source is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("Liveness notifier is required"))?;

        Ok(AgentLoop::new(
            store,
            signals,
            notifier,
            self.sampler.unwrap_or_default(),
            self.config,
        ))
    }
}

impl Default for AgentLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
