//! `tokio_util::codec` adapter for HDLC framing.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, FrameConfig, HdlcDecoder};
use crate::error::FrameError;

/// Frames an async byte stream with the same rules as [`crate::FrameReader`]
/// and [`crate::FrameWriter`].
#[derive(Debug, Clone, Default)]
pub struct HdlcCodec {
    decoder: HdlcDecoder,
    config: FrameConfig,
}

impl HdlcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: HdlcDecoder::with_mtu(config.mtu),
            config,
        }
    }
}

impl Decoder for HdlcCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(frame) = self.decoder.decode_step(byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for HdlcCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.config.mtu {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                mtu: self.config.mtu,
            });
        }
        encode_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::{encode, FLAG};

    #[test]
    fn decode_across_partial_buffers() {
        let wire = encode(&[b'a', FLAG, b'b']);
        let mut codec = HdlcCodec::new();

        let mut buf = BytesMut::from(&wire[..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        buf.extend_from_slice(&wire[3..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.as_ref(), &[b'a', FLAG, b'b']);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut codec = HdlcCodec::with_config(FrameConfig { mtu: 2 });
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Bytes::from_static(b"abc"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, HdlcCodec::new());
        let mut stream = FramedRead::new(server, HdlcCodec::new());

        sink.send(Bytes::from_static(b"first")).await.unwrap();
        sink.send(Bytes::from_static(&[0x7D, 0x7E])).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"first");
        assert_eq!(second.as_ref(), &[0x7D, 0x7E]);
    }
}
