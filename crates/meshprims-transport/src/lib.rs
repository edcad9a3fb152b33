//! Transport interfaces for a mesh-networking stack.
//!
//! Every interface implements the [`Transport`] contract over some
//! byte-oriented OS resource:
//! - [`PipeTransport`] — a spawned subprocess, HDLC-framed over stdin/stdout,
//!   respawned by a [`ReconnectSupervisor`] when it dies
//! - [`DatagramTransport`] — a UDP listener and/or forward target, one
//!   payload per datagram
//!
//! Received payloads are handed to the owner through an [`Inbound`] handler.

pub mod config;
pub mod datagram;
pub mod error;
pub mod netinfo;
pub mod pipe;
pub mod state;
pub mod stats;
pub mod supervisor;
pub mod traits;

pub use config::{
    build_interface, DatagramConfig, DatagramSettings, InterfaceConfig, NetworkConfig, PipeConfig,
    PipeSettings, DEFAULT_RESPAWN_DELAY,
};
pub use datagram::DatagramTransport;
pub use error::{ErrorClass, InterfaceError, Result};
pub use netinfo::{device_addresses, DeviceAddresses};
pub use pipe::PipeTransport;
pub use state::{InterfaceKind, InterfaceState};
pub use stats::{Stats, StatsCounters};
pub use supervisor::{
    FailurePolicy, LinkState, ReaderExit, ReconnectSupervisor, Recovery, StopSignal,
};
pub use traits::{inbound_channel, Inbound, InboundFrame, Transport};
