//! Core data models for the edge agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned reading identifier
pub type ReadingId = i64;

/// A persisted sample as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Severity tier derived from a sampled value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Normal,
    Warning,
    Critical,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::Normal => "normal",
            SeverityTier::Warning => "warning",
            SeverityTier::Critical => "critical",
        }
    }

    /// Returns true for tiers that warrant operator attention
    pub fn is_alert_worthy(&self) -> bool {
        !matches!(self, SeverityTier::Normal)
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of the agent process
///
/// `Frozen` and both terminated states are terminal; leaving them takes a
/// process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Starting,
    Ready,
    Running,
    Frozen,
    TerminatedFault,
    TerminatedFatal,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Frozen | AgentState::TerminatedFault | AgentState::TerminatedFatal
        )
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Starting => "starting",
            AgentState::Ready => "ready",
            AgentState::Running => "running",
            AgentState::Frozen => "frozen",
            AgentState::TerminatedFault => "terminated_fault",
            AgentState::TerminatedFatal => "terminated_fatal",
        };
        f.write_str(s)
    }
}

/// Aggregate view over the readings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingStats {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

/// Reading counts per severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub normal: u64,
    pub warning: u64,
    pub critical: u64,
}
