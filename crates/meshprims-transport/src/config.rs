//! Interface configuration model.
//!
//! Raw serde structs mirror what an operator writes; `resolve()` validates
//! them into settings the transports consume.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::datagram::DatagramTransport;
use crate::error::{InterfaceError, Result};
use crate::netinfo;
use crate::pipe::PipeTransport;
use crate::supervisor::FailurePolicy;
use crate::traits::{Inbound, Transport};

/// Respawn delay used when a pipe interface does not configure one.
pub const DEFAULT_RESPAWN_DELAY: Duration = Duration::from_secs(5);

/// Configuration of one interface, tagged by transport type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterfaceConfig {
    Pipe(PipeConfig),
    Udp(DatagramConfig),
}

impl InterfaceConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Pipe(cfg) => &cfg.name,
            Self::Udp(cfg) => &cfg.name,
        }
    }
}

/// Top-level configuration: a set of interfaces plus the failure policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Terminate the process on any abnormal interface failure instead of
    /// recovering in the background.
    #[serde(default)]
    pub panic_on_interface_error: bool,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

impl NetworkConfig {
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.panic_on_interface_error {
            FailurePolicy::abort_process()
        } else {
            FailurePolicy::Reconnect
        }
    }

    /// Construct every configured interface, sharing one inbound handler.
    ///
    /// Stops at the first interface that fails to come up; interfaces built
    /// before it are shut down when dropped.
    pub fn build_all(&self, inbound: Arc<dyn Inbound>) -> Result<Vec<Box<dyn Transport>>> {
        let policy = self.failure_policy();
        self.interfaces
            .iter()
            .map(|cfg| build_interface(cfg, Arc::clone(&inbound), policy.clone()))
            .collect()
    }
}

/// Construct and open the transport variant described by `config`.
pub fn build_interface(
    config: &InterfaceConfig,
    inbound: Arc<dyn Inbound>,
    policy: FailurePolicy,
) -> Result<Box<dyn Transport>> {
    match config {
        InterfaceConfig::Pipe(cfg) => {
            let transport = PipeTransport::new(cfg.resolve()?, inbound, policy)?;
            Ok(Box::new(transport))
        }
        InterfaceConfig::Udp(cfg) => {
            let transport = DatagramTransport::new(cfg.resolve()?, inbound, policy)?;
            Ok(Box::new(transport))
        }
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(InterfaceError::MissingOption {
            interface: "<unnamed>".to_string(),
            option: "name",
        });
    }
    Ok(())
}

/// Raw pipe interface options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipeConfig {
    pub name: String,
    /// Command line, split with shell quoting rules.
    #[serde(default)]
    pub command: Option<String>,
    /// Seconds to wait before each respawn attempt.
    #[serde(default)]
    pub respawn_delay: Option<f64>,
}

impl PipeConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: Some(command.into()),
            respawn_delay: None,
        }
    }

    pub fn with_respawn_delay(mut self, seconds: f64) -> Self {
        self.respawn_delay = Some(seconds);
        self
    }

    pub fn resolve(&self) -> Result<PipeSettings> {
        require_name(&self.name)?;

        let command_line = self
            .command
            .as_deref()
            .ok_or_else(|| InterfaceError::MissingOption {
                interface: self.name.clone(),
                option: "command",
            })?;

        let argv = shlex::split(command_line)
            .ok_or_else(|| InterfaceError::invalid(&self.name, "command", "unbalanced quoting"))?;
        if argv.is_empty() {
            return Err(InterfaceError::invalid(&self.name, "command", "empty command"));
        }

        let respawn_delay = match self.respawn_delay {
            None => DEFAULT_RESPAWN_DELAY,
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                InterfaceError::invalid(
                    &self.name,
                    "respawn_delay",
                    format!("{secs} is not a representable non-negative number of seconds"),
                )
            })?,
        };

        Ok(PipeSettings {
            name: self.name.clone(),
            command_line: command_line.to_string(),
            argv,
            respawn_delay,
        })
    }
}

/// Validated pipe interface settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSettings {
    pub name: String,
    pub command_line: String,
    pub argv: Vec<String>,
    pub respawn_delay: Duration,
}

/// Raw UDP interface options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatagramConfig {
    pub name: String,
    /// Network device whose IPv4 broadcast address is used for both
    /// directions when no explicit ip is given.
    #[serde(default)]
    pub device: Option<String>,
    /// Shorthand for `listen_port` and `forward_port`.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub listen_ip: Option<String>,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub forward_ip: Option<String>,
    #[serde(default)]
    pub forward_port: Option<u16>,
    /// Enable SO_BROADCAST on the sending socket.
    #[serde(default = "default_broadcast")]
    pub broadcast: bool,
}

fn default_broadcast() -> bool {
    true
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            device: None,
            port: None,
            listen_ip: None,
            listen_port: None,
            forward_ip: None,
            forward_port: None,
            broadcast: default_broadcast(),
        }
    }
}

impl DatagramConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn listen(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.listen_ip = Some(ip.into());
        self.listen_port = Some(port);
        self
    }

    pub fn forward(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.forward_ip = Some(ip.into());
        self.forward_port = Some(port);
        self
    }

    pub fn resolve(&self) -> Result<DatagramSettings> {
        require_name(&self.name)?;

        let device_ip = match self.device.as_deref() {
            Some(device) => Some(netinfo::device_addresses(device)?.broadcast),
            None => None,
        };

        let listen_ip = match self.listen_ip.as_deref() {
            Some(raw) => Some(self.parse_ip("listen_ip", raw)?),
            None => device_ip,
        };
        let forward_ip = match self.forward_ip.as_deref() {
            Some(raw) => Some(self.parse_ip("forward_ip", raw)?),
            None => device_ip,
        };
        let listen_port = self.listen_port.or(self.port);
        let forward_port = self.forward_port.or(self.port);

        let listen = pair(listen_ip, listen_port);
        let forward = pair(forward_ip, forward_port);

        if let Some(addr) = forward {
            if addr.port() == 0 {
                return Err(InterfaceError::invalid(
                    &self.name,
                    "forward_port",
                    "port 0 is not a valid destination",
                ));
            }
        }

        Ok(DatagramSettings {
            name: self.name.clone(),
            listen,
            forward,
            broadcast: self.broadcast,
        })
    }

    fn parse_ip(&self, option: &'static str, raw: &str) -> Result<Ipv4Addr> {
        raw.parse::<Ipv4Addr>()
            .map_err(|err| InterfaceError::invalid(&self.name, option, format!("{raw:?}: {err}")))
    }
}

fn pair(ip: Option<Ipv4Addr>, port: Option<u16>) -> Option<SocketAddr> {
    match (ip, port) {
        (Some(ip), Some(port)) => Some(SocketAddr::new(IpAddr::V4(ip), port)),
        _ => None,
    }
}

/// Validated UDP interface settings. Each direction is active only when both
/// its address and port are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramSettings {
    pub name: String,
    pub listen: Option<SocketAddr>,
    pub forward: Option<SocketAddr>,
    pub broadcast: bool,
}
