use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::state::InterfaceState;
use crate::stats::Stats;

/// Receives payloads from interfaces, in the order they were read.
///
/// Called on the interface's background reader thread; implementations
/// should hand work off rather than block.
pub trait Inbound: Send + Sync {
    fn inbound(&self, payload: Bytes, source: &InterfaceState);
}

impl<F> Inbound for F
where
    F: Fn(Bytes, &InterfaceState) + Send + Sync,
{
    fn inbound(&self, payload: Bytes, source: &InterfaceState) {
        self(payload, source)
    }
}

/// A payload tagged with the interface it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub interface: String,
    pub payload: Bytes,
}

/// Build an [`Inbound`] that forwards every payload over a channel.
///
/// Frames sent after the receiver is dropped are discarded.
pub fn inbound_channel() -> (Arc<dyn Inbound>, Receiver<InboundFrame>) {
    let (tx, rx) = mpsc::channel();
    let inbound = move |payload: Bytes, source: &InterfaceState| {
        let _ = tx.send(InboundFrame {
            interface: source.name().to_string(),
            payload,
        });
    };
    (Arc::new(inbound), rx)
}

/// Capability set shared by every transport variant.
pub trait Transport: Send + Sync {
    /// Acquire the underlying OS resource. May be called again after failure.
    fn open(&self) -> Result<()>;

    /// Transmit one payload.
    fn send(&self, payload: &[u8]) -> Result<()>;

    /// Identity, link parameters and counters.
    fn state(&self) -> &InterfaceState;

    /// Stop background work and release the OS resource.
    fn shutdown(&self);

    fn is_online(&self) -> bool {
        self.state().is_online()
    }

    fn name(&self) -> &str {
        self.state().name()
    }

    fn stats(&self) -> Stats {
        self.state().stats().snapshot()
    }
}
