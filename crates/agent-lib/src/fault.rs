//! Fault injection signal sources
//!
//! An external harness forces the agent into its terminal paths by raising
//! one of two signals. Signals are level-triggered: they are re-read every
//! cycle and only the harness clears them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Source of the crash and freeze signals
#[async_trait]
pub trait FaultSignalSource: Send + Sync {
    /// Whether a crash is currently requested
    async fn crash_requested(&self) -> bool;

    /// Whether a freeze is currently requested
    async fn freeze_requested(&self) -> bool;

    /// Resolves when a frozen agent may be torn down.
    ///
    /// Production sources never resolve, so a frozen agent stays parked
    /// until the supervisor kills it.
    async fn thawed(&self) {
        std::future::pending::<()>().await
    }
}

/// Signals backed by sentinel files; presence alone is the signal
#[derive(Debug, Clone)]
pub struct FileFaultSignals {
    crash_path: PathBuf,
    freeze_path: PathBuf,
}

impl FileFaultSignals {
    pub fn new(crash_path: impl Into<PathBuf>, freeze_path: impl Into<PathBuf>) -> Self {
        Self {
            crash_path: crash_path.into(),
            freeze_path: freeze_path.into(),
        }
    }

    pub fn crash_path(&self) -> &Path {
        &self.crash_path
    }

    pub fn freeze_path(&self) -> &Path {
        &self.freeze_path
    }
}

async fn sentinel_present(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(present) => present,
        Err(e) => {
            // An unreadable sentinel location counts as "not raised".
            debug!(path = %path.display(), error = %e, "Could not check sentinel");
            false
        }
    }
}

#[async_trait]
impl FaultSignalSource for FileFaultSignals {
    async fn crash_requested(&self) -> bool {
        sentinel_present(&self.crash_path).await
    }

    async fn freeze_requested(&self) -> bool {
        sentinel_present(&self.freeze_path).await
    }
}

/// In-memory signals toggled directly by a harness
///
/// Clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct ManualFaultSignals {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    crash: AtomicBool,
    freeze: AtomicBool,
    thawed: AtomicBool,
    thaw: Notify,
}

impl ManualFaultSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_crash(&self, raised: bool) {
        self.inner.crash.store(raised, Ordering::SeqCst);
    }

    pub fn set_freeze(&self, raised: bool) {
        self.inner.freeze.store(raised, Ordering::SeqCst);
    }

    /// Release an agent parked in the frozen state
    pub fn thaw(&self) {
        self.inner.thawed.store(true, Ordering::SeqCst);
        self.inner.thaw.notify_waiters();
    }
}

#[async_trait]
impl FaultSignalSource for ManualFaultSignals {
    async fn crash_requested(&self) -> bool {
        self.inner.crash.load(Ordering::SeqCst)
    }

    async fn freeze_requested(&self) -> bool {
        self.inner.freeze.load(Ordering::SeqCst)
    }

    async fn thawed(&self) {
        loop {
            let notified = self.inner.thaw.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.thawed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}
