//! Liveness reporting to the supervising process
//!
//! The agent announces readiness once and sends one watchdog notification
//! per completed cycle. Delivery is best-effort: a missing or broken
//! notification channel never stops the agent.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// A single message of the service-manager notification protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Ready,
    Watchdog,
    Status(String),
}

impl Notification {
    /// Wire form, one `KEY=VALUE` assignment
    pub fn to_assignment(&self) -> String {
        match self {
            Notification::Ready => "READY=1".to_string(),
            Notification::Watchdog => "WATCHDOG=1".to_string(),
            Notification::Status(text) => format!("STATUS={}", text.replace('\n', " ")),
        }
    }
}

/// Encode a batch of notifications as one datagram payload
pub fn encode(notifications: &[Notification]) -> String {
    notifications
        .iter()
        .map(Notification::to_assignment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Channel to the supervising process
pub trait Notifier: Send + Sync {
    fn notify(&self, notifications: &[Notification]) -> io::Result<()>;
}

/// Notifier speaking the service-manager datagram protocol
///
/// The address is a filesystem socket path or, on Linux, an abstract
/// socket name prefixed with `@`. Without an address every call is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SdNotifier {
    address: Option<String>,
}

impl SdNotifier {
    pub fn new(address: Option<String>) -> Self {
        let address = address.filter(|a| !a.is_empty());
        Self { address }
    }

    pub fn is_enabled(&self) -> bool {
        self.address.is_some()
    }
}

impl Notifier for SdNotifier {
    fn notify(&self, notifications: &[Notification]) -> io::Result<()> {
        let Some(address) = self.address.as_deref() else {
            return Ok(());
        };
        send_datagram(address, encode(notifications).as_bytes())
    }
}

#[cfg(unix)]
fn send_datagram(address: &str, payload: &[u8]) -> io::Result<()> {
    use std::os::unix::net::UnixDatagram;

    let socket = UnixDatagram::unbound()?;
    // A supervisor that stops draining its queue must not stall the agent.
    socket.set_nonblocking(true)?;
    let written = match address.strip_prefix('@') {
        Some(name) => send_abstract(&socket, name, payload)?,
        None => socket.send_to(payload, address)?,
    };

    if written != payload.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "short write on notification socket",
        ));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn send_abstract(
    socket: &std::os::unix::net::UnixDatagram,
    name: &str,
    payload: &[u8],
) -> io::Result<usize> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    socket.send_to_addr(payload, &addr)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn send_abstract(
    _socket: &std::os::unix::net::UnixDatagram,
    _name: &str,
    _payload: &[u8],
) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract notification sockets are Linux-only",
    ))
}

#[cfg(not(unix))]
fn send_datagram(_address: &str, _payload: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "notification sockets require a Unix platform",
    ))
}

/// In-memory notifier that records everything it is asked to send
///
/// Clones share the same record. `set_failing(true)` makes every
/// subsequent call fail without recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn heartbeats(&self) -> usize {
        self.count(&Notification::Watchdog)
    }

    pub fn ready_count(&self) -> usize {
        self.count(&Notification::Ready)
    }

    fn count(&self, wanted: &Notification) -> usize {
        self.sent().iter().filter(|n| *n == wanted).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notifications: &[Notification]) -> io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "notification channel unavailable",
            ));
        }
        let mut guard = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.extend_from_slice(notifications);
        Ok(())
    }
}

/// Best-effort liveness reporting on top of a [`Notifier`]
pub struct LivenessReporter {
    notifier: Arc<dyn Notifier>,
    consecutive_failures: u64,
}

impl LivenessReporter {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            consecutive_failures: 0,
        }
    }

    /// Tell the supervisor that startup succeeded
    pub fn announce_ready(&mut self) -> bool {
        self.send(
            &[
                Notification::Ready,
                Notification::Status("sampling".to_string()),
            ],
            "ready",
        )
    }

    /// Signal continued liveness after a completed cycle
    pub fn heartbeat(&mut self) -> bool {
        self.send(&[Notification::Watchdog], "watchdog")
    }

    /// Update the free-form status line; never counts as a heartbeat
    pub fn status(&mut self, text: impl Into<String>) -> bool {
        self.send(&[Notification::Status(text.into())], "status")
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    fn send(&mut self, notifications: &[Notification], kind: &'static str) -> bool {
        match self.notifier.notify(notifications) {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    info!(
                        event = "liveness_restored",
                        failures = self.consecutive_failures,
                        "Liveness channel recovered"
                    );
                }
                self.consecutive_failures = 0;
                true
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures == 1 {
                    warn!(
                        event = "liveness_failed",
                        kind,
                        error = %e,
                        "Failed to notify supervisor, continuing"
                    );
                } else {
                    debug!(
                        event = "liveness_failed",
                        kind,
                        error = %e,
                        failures = self.consecutive_failures,
                        "Failed to notify supervisor"
                    );
                }
                false
            }
        }
    }
}
