//! UDP datagram transport.
//!
//! One payload per datagram, no framing. The listening and forwarding
//! directions are configured independently.
//!
//! Outgoing payloads are bounded by the interface MTU like the pipe
//! transport's; incoming datagrams are accepted up to [`RECV_BUFFER_SIZE`]
//! so larger peers are still heard.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use meshprims_frame::FrameError;
use parking_lot::Mutex;

use crate::config::DatagramSettings;
use crate::error::{InterfaceError, Result};
use crate::state::{InterfaceKind, InterfaceState};
use crate::supervisor::{FailurePolicy, StopSignal};
use crate::traits::{Inbound, Transport};

/// Largest datagram the listener will read in one piece.
pub const RECV_BUFFER_SIZE: usize = 8192;

/// How often the listener checks for shutdown while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Transport backed by a UDP endpoint.
pub struct DatagramTransport {
    shared: Arc<DatagramShared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct DatagramShared {
    state: InterfaceState,
    settings: DatagramSettings,
    policy: FailurePolicy,
    stop: StopSignal,
    inbound: Arc<dyn Inbound>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl DatagramTransport {
    /// Bind the listener (if configured) and start receiving.
    ///
    /// Fails if the listening address cannot be bound.
    pub fn new(
        settings: DatagramSettings,
        inbound: Arc<dyn Inbound>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let shared = Arc::new(DatagramShared {
            state: InterfaceState::new(settings.name.clone(), InterfaceKind::Udp),
            settings,
            policy,
            stop: StopSignal::new(),
            inbound,
            local_addr: Mutex::new(None),
        });

        let transport = Self {
            shared,
            listener: Mutex::new(None),
        };
        transport.open()?;
        Ok(transport)
    }

    /// Address the listener is actually bound to.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }

    pub fn forward_addr(&self) -> Option<SocketAddr> {
        self.shared.settings.forward
    }

    pub fn settings(&self) -> &DatagramSettings {
        &self.shared.settings
    }
}

impl Transport for DatagramTransport {
    fn open(&self) -> Result<()> {
        let mut listener = self.listener.lock();
        if self.shared.stop.is_stopped() {
            return Err(InterfaceError::Shutdown);
        }

        let settings = &self.shared.settings;
        let Some(addr) = settings.listen else {
            if settings.forward.is_some() {
                self.shared.state.set_online(true);
            } else {
                tracing::warn!(
                    interface = %self.shared.state,
                    "no listen or forward address configured, interface stays offline"
                );
            }
            return Ok(());
        };

        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        if let Some(handle) = listener.take() {
            let _ = handle.join();
        }

        let socket = UdpSocket::bind(addr).map_err(|source| InterfaceError::Bind { addr, source })?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local = socket.local_addr()?;
        *self.shared.local_addr.lock() = Some(local);
        self.shared.state.set_online(true);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(format!("meshprims-udp-{}", self.shared.state.name()))
            .spawn(move || shared.listen(socket));
        match handle {
            Ok(handle) => {
                *listener = Some(handle);
                tracing::info!(interface = %self.shared.state, addr = %local, "udp listener started");
                Ok(())
            }
            Err(err) => {
                self.shared.state.set_online(false);
                Err(InterfaceError::Io(err))
            }
        }
    }

    fn send(&self, payload: &[u8]) -> Result<()> {
        let state = &self.shared.state;
        if self.shared.stop.is_stopped() {
            return Err(InterfaceError::Shutdown);
        }
        let target = self
            .shared
            .settings
            .forward
            .ok_or_else(|| InterfaceError::NoForwardTarget(state.name().to_string()))?;
        if payload.len() > state.mtu() {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                mtu: state.mtu(),
            }
            .into());
        }

        let result = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .and_then(|socket| {
                if self.shared.settings.broadcast {
                    socket.set_broadcast(true)?;
                }
                socket.send_to(payload, target)
            });

        match result {
            Ok(sent) => {
                state.stats().record_tx(sent);
                tracing::trace!(interface = %state, %target, len = sent, "datagram sent");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(interface = %state, %target, error = %source, "datagram send failed");
                Err(InterfaceError::Send { target, source })
            }
        }
    }

    fn state(&self) -> &InterfaceState {
        &self.shared.state
    }

    fn shutdown(&self) {
        self.shared.stop.stop();
        if let Some(handle) = self.listener.lock().take() {
            if handle.join().is_err() {
                tracing::error!(interface = %self.shared.state, "udp listener panicked");
            }
        }
        self.shared.state.set_online(false);
    }
}

impl Drop for DatagramTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DatagramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramTransport")
            .field("state", &self.shared.state)
            .field("listen", &self.listen_addr())
            .field("forward", &self.shared.settings.forward)
            .finish()
    }
}

impl DatagramShared {
    fn listen(&self, socket: UdpSocket) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while !self.stop.is_stopped() {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    self.state.stats().record_rx(len);
                    tracing::trace!(interface = %self.state, %from, len, "datagram received");
                    self.inbound
                        .inbound(Bytes::copy_from_slice(&buf[..len]), &self.state);
                }
                Err(err) if is_transient(&err) => continue,
                Err(err) => {
                    self.state.set_online(false);
                    tracing::error!(interface = %self.state, error = %err, "udp listener failed");
                    self.policy
                        .escalate(&format!("{}: {err}", self.state.name()));
                    break;
                }
            }
        }
        tracing::debug!(interface = %self.state, "udp listener exiting");
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}
