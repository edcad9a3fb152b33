use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic receive/transmit byte counters for one interface.
///
/// Only the transport that owns the interface's OS resource records into
/// these; everyone else reads snapshots.
#[derive(Debug, Default)]
pub struct StatsCounters {
    rxb: AtomicU64,
    txb: AtomicU64,
}

/// Point-in-time copy of [`StatsCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_rx(&self, bytes: usize) {
        self.rxb.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_tx(&self, bytes: usize) {
        self.txb.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn rx_bytes(&self) -> u64 {
        self.rxb.load(Ordering::Relaxed)
    }

    pub fn tx_bytes(&self) -> u64 {
        self.txb.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            rx_bytes: self.rx_bytes(),
            tx_bytes: self.tx_bytes(),
        }
    }
}
