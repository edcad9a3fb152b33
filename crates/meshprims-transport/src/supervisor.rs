use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Connection lifecycle of a supervised interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Why a background reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The stream ended cleanly.
    EndOfStream,
    /// The stream failed with an error.
    Failed(String),
}

impl ReaderExit {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What to do when an interface fails abnormally at runtime.
#[derive(Clone, Default)]
pub enum FailurePolicy {
    /// Recover in the background.
    #[default]
    Reconnect,
    /// Hand the failure to a handler instead of recovering.
    Abort(Arc<dyn Fn(&str) + Send + Sync>),
}

impl FailurePolicy {
    /// Policy that terminates the whole process on the first interface failure.
    pub fn abort_process() -> Self {
        Self::Abort(Arc::new(|reason: &str| {
            tracing::error!(reason, "interface failure with abort policy, terminating");
            std::process::abort();
        }))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort(_))
    }

    /// Invoke the abort handler, if any. Returns true when escalated.
    pub fn escalate(&self, reason: &str) -> bool {
        match self {
            Self::Reconnect => false,
            Self::Abort(handler) => {
                handler(reason);
                true
            }
        }
    }
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnect => f.write_str("Reconnect"),
            Self::Abort(_) => f.write_str("Abort(..)"),
        }
    }
}

/// Shared stop flag with interruptible waits.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every waiter.
    pub fn stop(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` or until stopped. Returns true if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut stopped = flag.lock();
        while !*stopped {
            if cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Decision taken after a reader exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Run the reconnect loop.
    Reconnect,
    /// The failure was handed to the abort handler; do not recover.
    Escalated,
}

/// Drives an interface back to connected after its reader exits.
///
/// Retries at a fixed `respawn_delay` with no attempt limit. One supervisor
/// belongs to one interface and is driven from that interface's worker
/// thread, so at most one reconnect sequence runs at a time.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    respawn_delay: Duration,
    policy: FailurePolicy,
    stop: StopSignal,
    state: Mutex<LinkState>,
    reconnects: AtomicU64,
}

impl ReconnectSupervisor {
    pub fn new(respawn_delay: Duration, policy: FailurePolicy, stop: StopSignal) -> Self {
        Self {
            respawn_delay,
            policy,
            stop,
            state: Mutex::new(LinkState::Disconnected),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn respawn_delay(&self) -> Duration {
        self.respawn_delay
    }

    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Number of successful reconnects so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn mark_connected(&self) {
        *self.state.lock() = LinkState::Connected;
    }

    /// Record a reader exit and decide how to proceed.
    pub fn on_reader_exit(&self, interface: &str, exit: &ReaderExit) -> Recovery {
        *self.state.lock() = LinkState::Disconnected;

        match exit {
            ReaderExit::EndOfStream => {
                tracing::warn!(interface, "stream ended");
            }
            ReaderExit::Failed(reason) => {
                tracing::error!(interface, error = %reason, "reader failed");
                if self.policy.escalate(&format!("{interface}: {reason}")) {
                    return Recovery::Escalated;
                }
            }
        }
        Recovery::Reconnect
    }

    /// Retry `attempt` every `respawn_delay` until it succeeds or a stop is
    /// requested. Returns true once reconnected.
    pub fn reconnect<F, E>(&self, interface: &str, mut attempt: F) -> bool
    where
        F: FnMut() -> Result<(), E>,
        E: fmt::Display,
    {
        *self.state.lock() = LinkState::Reconnecting;

        loop {
            if self.stop.wait_timeout(self.respawn_delay) {
                tracing::debug!(interface, "reconnect cancelled");
                return false;
            }

            tracing::debug!(interface, "attempting reconnect");
            match attempt() {
                Ok(()) => {
                    self.mark_connected();
                    self.reconnects.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(interface, "reconnected");
                    return true;
                }
                Err(err) => {
                    tracing::error!(interface, error = %err, "reconnect attempt failed");
                }
            }
        }
    }
}
