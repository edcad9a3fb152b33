use std::fmt;
use std::io;

use meshprims_frame::FrameError;
use meshprims_transport::{ErrorClass, InterfaceError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Map an OS error. A peer that went away mid-write (the subprocess on a
/// pipe, or stdout's reader) is a transport failure, not an internal one.
pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        io::ErrorKind::PermissionDenied | io::ErrorKind::AddrInUse => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::ShortWrite { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn interface_error(context: &str, err: InterfaceError) -> CliError {
    match err {
        InterfaceError::Frame(err) => frame_error(context, err),
        InterfaceError::Bind { source, .. } | InterfaceError::Io(source) => {
            io_error(context, source)
        }
        other => {
            let code = match other.class() {
                ErrorClass::Configuration => CONFIG_INVALID,
                ErrorClass::Resource => FAILURE,
                ErrorClass::Transport => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_map_to_config_invalid() {
        let err = interface_error(
            "setup",
            InterfaceError::MissingOption {
                interface: "modem".to_string(),
                option: "command",
            },
        );
        assert_eq!(err.code, CONFIG_INVALID);
        assert_eq!(err.message, "setup: modem: missing required option 'command'");
    }

    #[test]
    fn oversized_payload_is_data_invalid() {
        let err = interface_error(
            "send",
            InterfaceError::Frame(FrameError::PayloadTooLarge {
                size: 2000,
                mtu: 1064,
            }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn offline_is_transport_error() {
        let err = interface_error("send", InterfaceError::Offline("modem".to_string()));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn lost_peer_is_transport_error() {
        let broken = interface_error(
            "send",
            InterfaceError::Frame(FrameError::Io(io::Error::from(io::ErrorKind::BrokenPipe))),
        );
        assert_eq!(broken.code, TRANSPORT_ERROR);

        let short = frame_error(
            "send",
            FrameError::ShortWrite {
                written: 3,
                expected: 9,
            },
        );
        assert_eq!(short.code, TRANSPORT_ERROR);
        assert_eq!(
            frame_error("receive", FrameError::ConnectionClosed).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn bind_permission_denied() {
        let err = interface_error(
            "setup",
            InterfaceError::Bind {
                addr: "0.0.0.0:1".parse().unwrap(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
