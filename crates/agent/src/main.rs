//! IronClad Agent - edge pressure monitoring daemon
//!
//! Samples a pressure value every cycle, persists it, reports liveness to
//! the service manager and honours crash/freeze fault injection triggers.
//! Recovery from any failure is a restart by the supervisor.

use anyhow::Result;
use ironclad_lib::{
    AgentLoopBuilder, FileFaultSignals, Sampler, SdNotifier, SqliteStore, Termination,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let termination = match run().await {
        Ok(termination) => termination,
        Err(e) => {
            let message = format!("{e:#}");
            error!(event = "agent_fatal", error = %message, "Agent failed to start");
            std::process::exit(1);
        }
    };

    std::process::exit(termination.exit_code());
}

async fn run() -> Result<Termination> {
    let config = config::AgentConfig::load()?;
    info!(
        agent = %config.agent_name,
        db_path = %config.db_path.display(),
        crash_trigger = %config.crash_trigger_path.display(),
        freeze_trigger = %config.freeze_trigger_path.display(),
        "Agent configured"
    );

    if config.watchdog_too_tight() {
        warn!(
            interval_secs = config.sample_interval_secs,
            watchdog_usec = ?config.watchdog_usec,
            "Supervisor watchdog timeout is less than twice the sampling interval"
        );
    }

    let notifier = SdNotifier::new(config.notify_socket.clone());
    if !notifier.is_enabled() {
        info!("No supervisor notification socket configured, liveness reporting disabled");
    }

    let sampler = match config.sample_seed {
        Some(seed) => Sampler::seeded(seed),
        None => Sampler::new(),
    };

    // Opening the file is part of store initialization; a failure here is
    // fatal the same way a schema failure is.
    let store = SqliteStore::open(&config.db_path)?;

    let agent = AgentLoopBuilder::new()
        .store(Box::new(store))
        .signals(Arc::new(FileFaultSignals::new(
            &config.crash_trigger_path,
            &config.freeze_trigger_path,
        )))
        .notifier(Arc::new(notifier))
        .sampler(sampler)
        .config(config.loop_config()?)
        .build()?;

    Ok(agent.run().await)
}
