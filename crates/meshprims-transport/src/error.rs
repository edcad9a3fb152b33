use std::net::SocketAddr;

use meshprims_frame::FrameError;

/// Errors that can occur in interface construction and operation.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    /// A required configuration option is absent.
    #[error("{interface}: missing required option '{option}'")]
    MissingOption {
        interface: String,
        option: &'static str,
    },

    /// A configuration option is present but unusable.
    #[error("{interface}: invalid option '{option}': {reason}")]
    InvalidOption {
        interface: String,
        option: &'static str,
        reason: String,
    },

    /// A named network device could not be resolved to an address.
    #[error("network device '{device}': {reason}")]
    Device { device: String, reason: String },

    /// The subprocess behind a pipe interface could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A datagram could not be transmitted.
    #[error("failed to send to {target}: {source}")]
    Send {
        target: SocketAddr,
        source: std::io::Error,
    },

    /// Frame-level error on a stream transport.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The interface is not online.
    #[error("interface {0} is offline")]
    Offline(String),

    /// The interface has no forward target configured.
    #[error("interface {0} has no forward target")]
    NoForwardTarget(String),

    /// An I/O error occurred on the interface.
    #[error("interface I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The interface has been shut down.
    #[error("interface shut down")]
    Shutdown,
}

/// Broad category of an [`InterfaceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad or missing configuration. Fatal at construction.
    Configuration,
    /// The OS resource could not be acquired.
    Resource,
    /// Failure on an established connection.
    Transport,
}

impl InterfaceError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingOption { .. } | Self::InvalidOption { .. } | Self::Device { .. } => {
                ErrorClass::Configuration
            }
            Self::Spawn { .. } | Self::Bind { .. } | Self::Shutdown => ErrorClass::Resource,
            Self::Send { .. }
            | Self::Frame(_)
            | Self::Offline(_)
            | Self::NoForwardTarget(_)
            | Self::Io(_) => ErrorClass::Transport,
        }
    }

    pub(crate) fn invalid(
        interface: &str,
        option: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            interface: interface.to_string(),
            option,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InterfaceError>;
