//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the Kocom RS-485 bus protocol:
//! - 21-byte frame encoding/decoding with checksum
//! - Frame buffer that resynchronizes on the header marker
//! - Typed addresses, device classes and rooms

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub(crate) use frame::hex_string;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    checksum, pack_type, Address, Cmd, DeviceClass, FrameKind, Room, Sequence, Value,
    CHECKSUM_OFFSET, FRAME_SIZE, HEADER, TRAILER, VALUE_SIZE,
};
