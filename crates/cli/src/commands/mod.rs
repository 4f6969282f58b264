//! CLI command implementations

pub mod readings;
pub mod status;
pub mod triggers;
