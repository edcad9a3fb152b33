use bytes::{BufMut, Bytes, BytesMut};

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape lead byte.
pub const ESC: u8 = 0x7D;

/// XOR mask applied to an escaped byte.
pub const ESC_MASK: u8 = 0x20;

/// Hardware MTU: maximum payload bytes accepted per frame.
pub const HW_MTU: usize = 1064;

/// Append `payload` to `dst` with `FLAG` and `ESC` bytes escaped.
pub fn escape(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len());
    for &byte in payload {
        match byte {
            FLAG | ESC => {
                dst.put_u8(ESC);
                dst.put_u8(byte ^ ESC_MASK);
            }
            _ => dst.put_u8(byte),
        }
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────────────────┬──────────┐
/// │ FLAG     │ Escaped payload              │ FLAG     │
/// │ 0x7E     │ 0x7E -> 0x7D 0x5E            │ 0x7E     │
/// │          │ 0x7D -> 0x7D 0x5D            │          │
/// └──────────┴──────────────────────────────┴──────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 2);
    dst.put_u8(FLAG);
    escape(payload, dst);
    dst.put_u8(FLAG);
}

/// Encode a payload into a freshly allocated frame.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(payload.len() + 2);
    encode_frame(payload, &mut dst);
    dst.freeze()
}

/// Position of the decoder within the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for an opening `FLAG`; other bytes are noise.
    Idle,
    /// Accumulating payload bytes.
    InFrame,
    /// Inside a frame, the previous byte was `ESC`.
    Escape,
}

/// Streaming decoder for HDLC-framed byte streams.
///
/// Feed it one byte at a time with [`HdlcDecoder::decode_step`]. The payload
/// buffer never grows past the MTU: bytes arriving once it is full are
/// dropped and the frame is delivered truncated. Two consecutive `FLAG`
/// bytes inside a frame deliver a zero-length frame.
#[derive(Debug, Clone)]
pub struct HdlcDecoder {
    state: DecoderState,
    buf: BytesMut,
    mtu: usize,
}

impl HdlcDecoder {
    /// Create a decoder with the default hardware MTU.
    pub fn new() -> Self {
        Self::with_mtu(HW_MTU)
    }

    /// Create a decoder with an explicit MTU.
    pub fn with_mtu(mtu: usize) -> Self {
        Self {
            state: DecoderState::Idle,
            buf: BytesMut::with_capacity(mtu),
            mtu,
        }
    }

    /// Process one byte. Returns a frame when a `FLAG` closes an open frame.
    pub fn decode_step(&mut self, byte: u8) -> Option<Bytes> {
        match (self.state, byte) {
            (DecoderState::Idle, FLAG) => {
                self.buf.clear();
                self.state = DecoderState::InFrame;
                None
            }
            (DecoderState::Idle, _) => None,
            // A FLAG closes the frame even right after ESC, so the stream
            // always resynchronizes on the next delimiter.
            (DecoderState::InFrame | DecoderState::Escape, FLAG) => {
                self.state = DecoderState::Idle;
                Some(self.buf.split().freeze())
            }
            (DecoderState::InFrame, ESC) => {
                self.state = DecoderState::Escape;
                None
            }
            (DecoderState::InFrame, _) => {
                self.push(byte);
                None
            }
            (DecoderState::Escape, _) => {
                self.push(unescape(byte));
                self.state = DecoderState::InFrame;
                None
            }
        }
    }

    /// Return to `Idle` and discard any partial frame.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.buf.clear();
    }

    /// Current decoder state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Number of payload bytes buffered for the open frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Maximum payload size this decoder accumulates.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    fn push(&mut self, byte: u8) {
        if self.buf.len() < self.mtu {
            self.buf.put_u8(byte);
        }
    }
}

impl Default for HdlcDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn unescape(byte: u8) -> u8 {
    match byte {
        b if b == FLAG ^ ESC_MASK => FLAG,
        b if b == ESC ^ ESC_MASK => ESC,
        other => other,
    }
}

/// Configuration shared by frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: [`HW_MTU`].
    pub mtu: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { mtu: HW_MTU }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn decode_all(decoder: &mut HdlcDecoder, wire: &[u8]) -> Vec<Bytes> {
        wire.iter()
            .filter_map(|&byte| decoder.decode_step(byte))
            .collect()
    }

    #[test]
    fn encode_escapes_reserved_bytes() {
        let wire = encode(&[0x01, FLAG, 0x02, ESC, 0x03]);
        assert_eq!(
            wire.as_ref(),
            &[FLAG, 0x01, ESC, 0x5E, 0x02, ESC, 0x5D, 0x03, FLAG]
        );
    }

    #[test]
    fn encode_empty_payload() {
        assert_eq!(encode(b"").as_ref(), &[FLAG, FLAG]);
    }

    #[test]
    fn decode_single_frame() {
        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &encode(b"hello, mesh"));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"hello, mesh");
        assert_eq!(decoder.state(), DecoderState::Idle);
    }

    #[test]
    fn back_to_back_frames_in_order() {
        let mut wire = BytesMut::new();
        encode_frame(b"first", &mut wire);
        encode_frame(&[FLAG, ESC, FLAG], &mut wire);

        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &wire);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), b"first");
        assert_eq!(frames[1].as_ref(), &[FLAG, ESC, FLAG]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn noise_before_first_flag_is_ignored() {
        let mut wire = vec![0x00, 0x41, ESC, 0x5E];
        wire.extend_from_slice(&encode(b"payload"));

        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"payload");
    }

    #[test]
    fn double_flag_yields_empty_frame() {
        let mut decoder = HdlcDecoder::new();
        assert!(decoder.decode_step(FLAG).is_none());
        let frame = decoder.decode_step(FLAG).expect("second flag closes frame");
        assert!(frame.is_empty());
    }

    #[test]
    fn stray_escape_then_stream_end_emits_nothing() {
        let mut decoder = HdlcDecoder::new();
        assert!(decoder.decode_step(ESC).is_none());
        assert_eq!(decoder.state(), DecoderState::Idle);

        let frames = decode_all(&mut decoder, &[FLAG, b'a', b'b', ESC]);
        assert!(frames.is_empty());
        assert_eq!(decoder.state(), DecoderState::Escape);

        decoder.reset();
        let frames = decode_all(&mut decoder, &encode(b"fresh"));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"fresh");
    }

    #[test]
    fn flag_after_escape_resynchronizes() {
        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &[FLAG, b'x', ESC, FLAG]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), b"x");
        assert_eq!(decoder.state(), DecoderState::Idle);
    }

    #[test]
    fn out_of_spec_escape_passes_through() {
        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &[FLAG, ESC, 0x41, FLAG]);
        assert_eq!(frames[0].as_ref(), &[0x41]);
    }

    #[test]
    fn oversized_frame_truncates_at_mtu() {
        let payload = vec![0xAB; HW_MTU + 100];
        let mut decoder = HdlcDecoder::new();
        let frames = decode_all(&mut decoder, &encode(&payload));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), HW_MTU);
        assert!(frames[0].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn escaped_bytes_past_mtu_are_dropped() {
        let mut decoder = HdlcDecoder::with_mtu(2);
        let frames = decode_all(&mut decoder, &encode(&[1, 2, FLAG, ESC]));
        assert_eq!(frames[0].as_ref(), &[1, 2]);
    }

    proptest! {
        #[test]
        fn encode_then_decode_is_identity(payload in prop::collection::vec(any::<u8>(), 0..HW_MTU)) {
            let mut decoder = HdlcDecoder::new();
            let frames = decode_all(&mut decoder, &encode(&payload));
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].as_ref(), payload.as_slice());
        }

        #[test]
        fn reserved_bytes_never_appear_inside_frame(payload in prop::collection::vec(any::<u8>(), 0..256)) {
            let wire = encode(&payload);
            let inner = &wire[1..wire.len() - 1];
            prop_assert!(!inner.contains(&FLAG));
        }
    }
}
