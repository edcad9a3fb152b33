//! Resilient transport interfaces for mesh networking.
//!
//! meshprims turns heterogeneous byte-oriented links (a spawned subprocess,
//! a UDP socket) into interfaces with a uniform send/receive contract and
//! automatic recovery from link failure.
//!
//! # Crate Structure
//!
//! - [`frame`] — HDLC-style byte-stuffed framing for stream transports
//! - [`transport`] — Transport contract, pipe and UDP interfaces, reconnect supervision
//! - [`crypto`] — AES-128-CBC block cipher (behind `crypto` feature)

/// Re-export frame types.
pub mod frame {
    pub use meshprims_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use meshprims_transport::*;
}

/// Re-export crypto types (requires `crypto` feature).
#[cfg(feature = "crypto")]
pub mod crypto {
    pub use meshprims_crypto::*;
}
