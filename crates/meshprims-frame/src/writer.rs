use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Each frame is handed to the stream in a single `write` call. A stream that
/// accepts only part of the frame fails the send with
/// [`FrameError::ShortWrite`] and the remainder is not retried.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(2 * config.mtu + 2),
            config,
        }
    }

    /// Encode and send a payload, then flush.
    ///
    /// Returns the number of bytes put on the wire (delimiters and escapes
    /// included).
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.config.mtu {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                mtu: self.config.mtu,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf);

        let expected = self.buf.len();
        let written = loop {
            match self.inner.write(&self.buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if written < expected {
            return Err(FrameError::ShortWrite { written, expected });
        }

        self.flush()?;
        Ok(written)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
