//! Frame struct and the fixed-layout codec.
//!
//! A [`Frame`] is only ever produced by a successful [`Frame::decode`];
//! outbound frames are encoded straight to bytes with [`build_frame`].
//!
//! # Example
//!
//! ```
//! use kocom_wallpad::protocol::{build_frame, Address, Cmd, Frame, FrameKind, Sequence};
//!
//! let bytes = build_frame(
//!     FrameKind::Send,
//!     Sequence::C,
//!     Address::from_bytes([0x36, 0x00]),
//!     Address::WALLPAD,
//!     Cmd::Query,
//!     [0; 8],
//! );
//! let frame = Frame::decode(&bytes).unwrap();
//! assert!(frame.is_send());
//! assert_eq!(frame.dest.to_string(), "3600");
//! ```

use std::time::{Duration, Instant};

use bytes::Bytes;

use super::wire_format::{
    checksum, pack_type, Address, Cmd, FrameKind, Sequence, Value, CHECKSUM_OFFSET, CMD_OFFSET,
    DEST_OFFSET, FRAME_SIZE, HEADER, RESERVED_OFFSET, SRC_OFFSET, TRAILER, TRAILER_OFFSET,
    TYPE_OFFSET, TYPE_PREFIX, VALUE_OFFSET,
};
use crate::error::FrameError;

/// A decoded bus frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Send or acknowledgment.
    pub kind: FrameKind,
    /// Sequence code the sender used.
    pub sequence: Sequence,
    /// Destination address.
    pub dest: Address,
    /// Source address.
    pub src: Address,
    /// Command byte.
    pub cmd: Cmd,
    /// Device-class-specific value word.
    pub value: Value,
    /// When the frame was decoded.
    pub received_at: Instant,
    /// The 21 bytes as received.
    pub raw: Bytes,
}

impl Frame {
    /// Decode and validate exactly one frame.
    ///
    /// The checksum is verified before the trailer, so a frame with both
    /// corrupted reports `ChecksumMismatch`.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() != FRAME_SIZE {
            return Err(FrameError::InvalidLength(buf.len()));
        }
        if buf[..2] != HEADER {
            return Err(FrameError::HeaderMismatch);
        }

        let expected = checksum(&buf[HEADER.len()..CHECKSUM_OFFSET]);
        let actual = buf[CHECKSUM_OFFSET];
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }
        if buf[TRAILER_OFFSET..] != TRAILER {
            return Err(FrameError::TrailerMismatch);
        }

        let type_byte = buf[TYPE_OFFSET];
        let mut value = [0u8; 8];
        value.copy_from_slice(&buf[VALUE_OFFSET..CHECKSUM_OFFSET]);

        Ok(Self {
            kind: FrameKind::from_nibble(type_byte >> 4),
            sequence: Sequence::from_nibble(type_byte & 0x0F)?,
            dest: Address::from_bytes([buf[DEST_OFFSET], buf[DEST_OFFSET + 1]]),
            src: Address::from_bytes([buf[SRC_OFFSET], buf[SRC_OFFSET + 1]]),
            cmd: Cmd::from_code(buf[CMD_OFFSET]),
            value,
            received_at: Instant::now(),
            raw: Bytes::copy_from_slice(buf),
        })
    }

    /// Re-encode the wire fields.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        build_frame(
            self.kind, self.sequence, self.dest, self.src, self.cmd, self.value,
        )
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.kind == FrameKind::Ack
    }

    #[inline]
    pub fn is_send(&self) -> bool {
        self.kind == FrameKind::Send
    }

    /// Time since the frame was decoded.
    #[inline]
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// Lowercase hex of the raw bytes, as used in logs.
    pub fn raw_hex(&self) -> String {
        hex_string(&self.raw)
    }
}

/// Wire fields only; reception metadata is ignored.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.sequence == other.sequence
            && self.dest == other.dest
            && self.src == other.src
            && self.cmd == other.cmd
            && self.value == other.value
    }
}

impl Eq for Frame {}

/// Encode a complete 21-byte frame with checksum and trailer.
pub fn build_frame(
    kind: FrameKind,
    sequence: Sequence,
    dest: Address,
    src: Address,
    cmd: Cmd,
    value: Value,
) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    buf[..2].copy_from_slice(&HEADER);
    buf[2] = TYPE_PREFIX;
    buf[TYPE_OFFSET] = pack_type(kind, sequence);
    buf[RESERVED_OFFSET] = 0x00;
    buf[DEST_OFFSET..DEST_OFFSET + 2].copy_from_slice(&dest.to_bytes());
    buf[SRC_OFFSET..SRC_OFFSET + 2].copy_from_slice(&src.to_bytes());
    buf[CMD_OFFSET] = cmd.code();
    buf[VALUE_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&value);
    buf[CHECKSUM_OFFSET] = checksum(&buf[HEADER.len()..CHECKSUM_OFFSET]);
    buf[TRAILER_OFFSET..].copy_from_slice(&TRAILER);
    buf
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
