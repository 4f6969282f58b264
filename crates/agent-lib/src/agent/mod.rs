//! The agent run loop
//!
//! Ties the fault detector, sampler, store and liveness reporter into one
//! deterministic cycle and owns every terminal path of the process.

mod r#loop;

pub use r#loop::{
    AgentLoop, AgentLoopBuilder, CycleOutcome, CycleReport, LoopConfig, Termination,
};
