//! Core library for the IronClad edge monitoring agent
//!
//! This crate provides:
//! - Durable, append-only storage of sampled readings
//! - Fault injection signal sources (crash / freeze)
//! - Synthetic sampling and severity classification
//! - Liveness reporting to the supervising process
//! - The agent loop that ties them together

pub mod agent;
pub mod error;
pub mod fault;
pub mod liveness;
pub mod models;
pub mod observability;
pub mod sampler;
pub mod store;

pub use agent::{AgentLoop, AgentLoopBuilder, CycleOutcome, CycleReport, LoopConfig, Termination};
pub use error::{AgentError, StoreError};
pub use fault::{FaultSignalSource, FileFaultSignals, ManualFaultSignals};
pub use liveness::{LivenessReporter, Notification, Notifier, RecordingNotifier, SdNotifier};
pub use models::*;
pub use observability::{AgentMetrics, EventLog, EventSeverity, NormalReadingLevel};
pub use sampler::{classify, Sampler, Thresholds};
pub use store::{ReadingStore, SqliteStore};
