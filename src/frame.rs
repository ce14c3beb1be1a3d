//! The on-wire frame format: `u32_be(length) || u8(next) || body`.
//!
//! This module is a pure codec — it owns no I/O state and performs no
//! reads or writes. [`crate::link`] drives it over an actual port.

use bytes::{Buf, Bytes};

/// Number of header bytes preceding `body` (4-byte length + 1-byte `next` flag).
pub const HEADER_LEN: usize = 5;

/// Default maximum body size of a single chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// The one-byte ACK body this crate always sends. The byte is reserved
/// for future use; a received ACK frame is accepted regardless of its
/// actual value (see [`crate::link`]'s `wait_ack`).
pub const ACK_STATUS_OK: u8 = 0x00;

/// A single on-wire frame: a chunk of a payload, or an ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// `true` if more chunks follow for the current logical payload.
    pub next: bool,
    /// Exactly `length` bytes, per the wire header.
    pub body: Bytes,
}

impl Frame {
    /// An ACK frame: `length = 1, next = false, body = [0x00]`.
    pub fn ack() -> Self {
        Frame {
            next: false,
            body: Bytes::from_static(&[ACK_STATUS_OK]),
        }
    }

    /// Whether this frame is shaped like an ACK (`length == 1, next == false`).
    /// This is the only check `wait_ack` applies — the body byte itself is
    /// never inspected.
    pub fn is_ack_shaped(&self) -> bool {
        !self.next && self.body.len() == 1
    }
}

/// Outcome of attempting to parse one frame out of an accumulation buffer.
pub enum ParseOutcome {
    /// A complete frame was found; `consumed` bytes should be advanced out
    /// of the accumulator.
    Ready { frame: Frame, consumed: usize },
    /// Not enough bytes yet; the accumulator is untouched.
    NeedMore,
}

/// Encodes a single frame: `u32_be(len(body)) || u8(next) || body`.
pub fn encode_frame(next: bool, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.push(next as u8);
    out.extend_from_slice(body);
    out
}

/// Splits `payload` into `(next, chunk)` pairs of at most `chunk_size` bytes
/// each. All but the last chunk carry `next = true`; the last carries
/// `next = false` and may be shorter than `chunk_size`.
///
/// `chunk_size` of `0` is treated as [`DEFAULT_CHUNK_SIZE`] — callers should
/// normally resolve that default earlier (see [`crate::config::LinkConfig`]),
/// but `split` itself never panics on it.
pub fn split(payload: &[u8], chunk_size: usize) -> impl Iterator<Item = (bool, &[u8])> {
    let chunk_size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };
    let total = payload.len();
    payload.chunks(chunk_size).enumerate().map(move |(i, c)| {
        let consumed_so_far = i * chunk_size + c.len();
        (consumed_so_far < total, c)
    })
}

/// Attempts to parse the first complete frame out of `buf`.
///
/// Deterministic and never mutates `buf`; on [`ParseOutcome::Ready`] the
/// caller is responsible for advancing the accumulator by `consumed`
/// bytes. A `length` of `0` is rejected immediately — it can never arise
/// from a conforming sender (data frames require `length >= 1`, ACKs fix
/// `length = 1`).
pub fn try_parse_frame(buf: &[u8]) -> crate::Result<ParseOutcome> {
    if buf.len() < HEADER_LEN {
        return Ok(ParseOutcome::NeedMore);
    }

    let length = (&buf[0..4]).get_u32() as usize;
    if length == 0 {
        return Err(crate::Error::ParseError(
            "frame length field was zero".to_string(),
        ));
    }

    let total = HEADER_LEN + length;
    if buf.len() < total {
        return Ok(ParseOutcome::NeedMore);
    }

    let next = match buf[4] {
        0 => false,
        1 => true,
        other => {
            return Err(crate::Error::ParseError(format!(
                "invalid `next` flag byte: {other}"
            )));
        }
    };
    let body = Bytes::copy_from_slice(&buf[HEADER_LEN..total]);

    Ok(ParseOutcome::Ready {
        frame: Frame { next, body },
        consumed: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frame_matches_s1() {
        assert_eq!(
            encode_frame(false, b"test"),
            vec![0x00, 0x00, 0x00, 0x04, 0x00, b't', b'e', b's', b't']
        );
    }

    #[test]
    fn encode_ack_frame() {
        assert_eq!(
            encode_frame(false, &[0x00]),
            vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn split_chunk_boundary_correctness() {
        for (len, chunk_size) in [(4, 1024), (1024, 1024), (1025, 1024), (1, 1), (7, 3)] {
            let payload = vec![0xAB; len];
            let chunks: Vec<_> = split(&payload, chunk_size).collect();
            let expected_count = len.div_ceil(chunk_size);
            assert_eq!(chunks.len(), expected_count, "len={len} chunk_size={chunk_size}");
            for (i, (next, body)) in chunks.iter().enumerate() {
                if i + 1 == chunks.len() {
                    assert!(!next);
                    assert!(body.len() >= 1 && body.len() <= chunk_size);
                } else {
                    assert!(*next);
                    assert_eq!(body.len(), chunk_size);
                }
            }
        }
    }

    #[test]
    fn split_one_byte_overflow_s3() {
        let payload = vec![0x41; 1025];
        let chunks: Vec<_> = split(&payload, 1024).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, true);
        assert_eq!(chunks[0].1.len(), 1024);
        assert_eq!(chunks[1].0, false);
        assert_eq!(chunks[1].1.len(), 1);
    }

    #[test]
    fn try_parse_frame_need_more_never_mutates() {
        let partial = vec![0x00, 0x00, 0x00, 0x04, 0x00, b't', b'e'];
        match try_parse_frame(&partial).unwrap() {
            ParseOutcome::NeedMore => {}
            ParseOutcome::Ready { .. } => panic!("expected NeedMore"),
        }
        // buf untouched by construction — we only ever read a `&[u8]`.
        assert_eq!(partial.len(), 7);
    }

    #[test]
    fn try_parse_frame_round_trip() {
        let wire = encode_frame(false, b"test");
        match try_parse_frame(&wire).unwrap() {
            ParseOutcome::Ready { frame, consumed } => {
                assert_eq!(consumed, wire.len());
                assert!(!frame.next);
                assert_eq!(&frame.body[..], b"test");
            }
            ParseOutcome::NeedMore => panic!("expected Ready"),
        }
    }

    #[test]
    fn try_parse_frame_rejects_zero_length() {
        let wire = [0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(try_parse_frame(&wire).is_err());
    }

    #[test]
    fn try_parse_frame_rejects_bad_next_byte() {
        let wire = [0x00, 0x00, 0x00, 0x01, 0x02, 0xAB];
        assert!(try_parse_frame(&wire).is_err());
    }

    #[test]
    fn round_trip_framing_across_sizes() {
        for len in [1usize, 2, 1023, 1024, 1025, 4096] {
            for chunk_size in [1usize, 7, 1024] {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let mut wire = Vec::new();
                for (next, body) in split(&payload, chunk_size) {
                    wire.extend(encode_frame(next, body));
                }

                let mut reassembled = Vec::new();
                let mut rest = &wire[..];
                loop {
                    match try_parse_frame(rest).unwrap() {
                        ParseOutcome::Ready { frame, consumed } => {
                            reassembled.extend_from_slice(&frame.body);
                            rest = &rest[consumed..];
                            if !frame.next {
                                break;
                            }
                        }
                        ParseOutcome::NeedMore => panic!("unexpected NeedMore"),
                    }
                }
                assert_eq!(reassembled, payload, "len={len} chunk_size={chunk_size}");
            }
        }
    }
}
