//! Frame buffer for accumulating partial reads.
//!
//! The gateway forwards raw bus bytes with no packet boundaries, so the
//! buffer resynchronizes on the `aa 55` header:
//! - No header in the buffer: keep only the last byte (a possible half
//!   header) and wait.
//! - Header after garbage: drop the garbage.
//! - Header with a full frame behind it: slice 21 bytes and decode them.
//!   A slice that fails validation is dropped, and the buffer still moves
//!   past it.
//!
//! # Example
//!
//! ```
//! use kocom_wallpad::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//! let capture = [
//!     0xaa, 0x55, 0x30, 0xdc, 0x00, 0x01, 0x00, 0x36, 0x00, 0x3a, 0x00,
//!     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7d, 0x0d, 0x0d,
//! ];
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&capture[..7]).is_empty());
//! let frames = buffer.push(&capture[7..]);
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::BytesMut;

use super::wire_format::{FRAME_SIZE, HEADER};
use super::Frame;

/// Default buffer capacity; a few frames' worth.
const DEFAULT_CAPACITY: usize = 1024;

/// Buffer for accumulating incoming bytes and extracting valid frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Candidate frames rejected by the codec.
    dropped: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            dropped: 0,
        }
    }

    /// Push data into the buffer and extract all complete, valid frames.
    ///
    /// Partial data is kept for the next push. Invalid candidates are
    /// counted in [`dropped`](Self::dropped) and never returned.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(candidate) = self.next_candidate() {
            match Frame::decode(&candidate) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    self.dropped += 1;
                    tracing::debug!("Dropped invalid frame: {} ({:02x?})", e, &candidate[..]);
                }
            }
        }
        frames
    }

    /// Align the buffer on a header and split off one frame's worth of
    /// bytes, or return `None` if more data is needed.
    fn next_candidate(&mut self) -> Option<BytesMut> {
        match find_header(&self.buffer) {
            Some(0) => {}
            Some(idx) => {
                let _ = self.buffer.split_to(idx);
            }
            None => {
                let keep_from = self.buffer.len().saturating_sub(1);
                let _ = self.buffer.split_to(keep_from);
                return None;
            }
        }

        if self.buffer.len() < FRAME_SIZE {
            return None;
        }
        Some(self.buffer.split_to(FRAME_SIZE))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of candidate frames dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Clear buffered bytes, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_header(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER.len()).position(|w| w == HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, Address, Cmd, DeviceClass, FrameKind, Room, Sequence};

    /// Helper to create a valid ack frame as bytes.
    fn make_frame_bytes(src: Address, value: [u8; 8]) -> Vec<u8> {
        build_frame(
            FrameKind::Ack,
            Sequence::C,
            Address::WALLPAD,
            src,
            Cmd::State,
            value,
        )
        .to_vec()
    }

    fn fan() -> Address {
        Address::new(DeviceClass::Fan, Room::Livingroom)
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(fan(), [0x11, 0, 0x80, 0, 0, 0, 0, 0]);

        let frames = buffer.push(&frame_bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].src, fan());
        assert_eq!(frames[0].value[2], 0x80);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        for room in [Room::Livingroom, Room::Bedroom, Room::Room1] {
            combined.extend(make_frame_bytes(
                Address::new(DeviceClass::Thermostat, room),
                [0; 8],
            ));
        }

        let frames = buffer.push(&combined);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].src.room(), Some(Room::Livingroom));
        assert_eq!(frames[1].src.room(), Some(Room::Bedroom));
        assert_eq!(frames[2].src.room(), Some(Room::Room1));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_leading_garbage_is_discarded() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0x00, 0x13, 0x37, 0xAA, 0x0D, 0x55];
        data.extend(make_frame_bytes(fan(), [0; 8]));

        let frames = buffer.push(&data);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].src, fan());
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_garbage_then_fragmented_frame() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(fan(), [0; 8]);

        assert!(buffer.push(&[0xDE, 0xAD, 0xBE, 0xEF]).is_empty());
        assert!(buffer.push(&frame_bytes[..10]).is_empty());
        let frames = buffer.push(&frame_bytes[10..]);

        assert_eq!(frames.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_no_header_keeps_last_byte() {
        let mut buffer = FrameBuffer::new();

        assert!(buffer.push(&[0x01, 0x02, 0x03, 0xAA]).is_empty());
        assert_eq!(buffer.len(), 1);

        // The kept byte completes a header split across reads
        let frame_bytes = make_frame_bytes(fan(), [0; 8]);
        let frames = buffer.push(&frame_bytes[1..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_false_header_in_garbage_is_dropped_and_scanning_continues() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0xAA, 0x55];
        data.extend(std::iter::repeat(0x42).take(FRAME_SIZE - 2));
        data.extend(make_frame_bytes(fan(), [0x11, 0, 0xC0, 0, 0, 0, 0, 0]));

        let frames = buffer.push(&data);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].value[2], 0xC0);
        assert_eq!(buffer.dropped(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_corrupted_frame_is_skipped() {
        let mut buffer = FrameBuffer::new();
        let mut bad = make_frame_bytes(fan(), [0; 8]);
        bad[12] ^= 0xFF;
        let good = make_frame_bytes(fan(), [0x11, 0, 0x40, 0, 0, 0, 0, 0]);

        let mut data = bad;
        data.extend(&good);
        let frames = buffer.push(&data);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].value[2], 0x40);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(fan(), [0x11, 0, 0x80, 0, 0, 0, 0, 0]);

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            all_frames.extend(buffer.push(&[*byte]));
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].value[0], 0x11);
    }

    #[test]
    fn test_arbitrary_noise_never_panics() {
        let mut buffer = FrameBuffer::new();
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..64 {
            let chunk: Vec<u8> = (0..37)
                .map(|_| {
                    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    // bias towards header bytes to provoke false matches
                    match seed >> 29 {
                        0 => 0xAA,
                        1 => 0x55,
                        _ => (seed >> 16) as u8,
                    }
                })
                .collect();
            let _ = buffer.push(&chunk);
            assert!(buffer.len() < FRAME_SIZE + chunk.len());
        }
    }

    #[test]
    fn test_clear() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(fan(), [0; 8]);
        buffer.push(&frame_bytes[..5]);
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
