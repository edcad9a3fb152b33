use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use meshprims_frame::HW_MTU;
use serde::Serialize;

use crate::stats::StatsCounters;

/// Which transport variant backs an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Pipe,
    Udp,
}

impl InterfaceKind {
    /// Static link-speed estimate in bits per second.
    pub fn bitrate_guess(self) -> u64 {
        match self {
            Self::Pipe => 1_000_000,
            Self::Udp => 10_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Udp => "udp",
        }
    }
}

/// Identity, link parameters, liveness and counters of one interface.
///
/// This is what inbound handlers see as the source of a payload.
#[derive(Debug)]
pub struct InterfaceState {
    name: String,
    kind: InterfaceKind,
    mtu: usize,
    bitrate: u64,
    online: AtomicBool,
    stats: StatsCounters,
}

impl InterfaceState {
    pub fn new(name: impl Into<String>, kind: InterfaceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mtu: HW_MTU,
            bitrate: kind.bitrate_guess(),
            online: AtomicBool::new(false),
            stats: StatsCounters::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn stats(&self) -> &StatsCounters {
        &self.stats
    }
}

impl fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind.as_str(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_offline_with_fixed_mtu() {
        let state = InterfaceState::new("loop", InterfaceKind::Pipe);
        assert!(!state.is_online());
        assert_eq!(state.mtu(), 1064);
        assert_eq!(state.bitrate(), 1_000_000);
        assert_eq!(state.to_string(), "pipe[loop]");
    }

    #[test]
    fn udp_bitrate_guess() {
        let state = InterfaceState::new("lan", InterfaceKind::Udp);
        assert_eq!(state.bitrate(), 10_000_000);
        assert_eq!(state.to_string(), "udp[lan]");
    }
}
