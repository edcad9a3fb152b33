//! HDLC-style framing for byte-stream transports.
//!
//! Stream transports (subprocess pipes, serial lines) have no message
//! boundaries of their own. Every payload is wrapped as:
//! - A `0x7E` delimiter
//! - The payload, with `0x7E` and `0x7D` escaped as `0x7D, byte ^ 0x20`
//! - A closing `0x7E` delimiter
//!
//! The decoder is a byte-at-a-time state machine that resynchronizes on the
//! next delimiter after any corruption.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    encode, encode_frame, escape, DecoderState, FrameConfig, HdlcDecoder, ESC, ESC_MASK, FLAG,
    HW_MTU,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::HdlcCodec;
