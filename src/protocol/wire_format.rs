//! Wire format constants and typed fields.
//!
//! Every bus frame is exactly 21 bytes:
//! ```text
//! ┌───────┬──────┬──────────┬──────┬──────┬──────┬─────┬─────────┬─────┬─────────┐
//! │ aa 55 │ 30   │ type|seq │ 00   │ dest │ src  │ cmd │ value   │ sum │ 0d 0d   │
//! │ 2     │ 1    │ 1        │ 1    │ 2    │ 2    │ 1   │ 8       │ 1   │ 2       │
//! └───────┴──────┴──────────┴──────┴──────┴──────┴─────┴─────────┴─────┴─────────┘
//! ```
//!
//! The checksum is the sum of bytes 2..18 truncated to one byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, WallpadError};

/// Frame size in bytes (fixed, exactly 21).
pub const FRAME_SIZE: usize = 21;

/// Start-of-frame marker.
pub const HEADER: [u8; 2] = [0xAA, 0x55];

/// End-of-frame marker.
pub const TRAILER: [u8; 2] = [0x0D, 0x0D];

/// Constant byte following the header.
pub const TYPE_PREFIX: u8 = 0x30;

/// Offset of the packed type/sequence byte.
pub const TYPE_OFFSET: usize = 3;

/// Offset of the reserved byte.
pub const RESERVED_OFFSET: usize = 4;

/// Offset of the destination address.
pub const DEST_OFFSET: usize = 5;

/// Offset of the source address.
pub const SRC_OFFSET: usize = 7;

/// Offset of the command byte.
pub const CMD_OFFSET: usize = 9;

/// Offset of the 8-byte value field.
pub const VALUE_OFFSET: usize = 10;

/// Length of the value field.
pub const VALUE_SIZE: usize = 8;

/// Offset of the checksum byte.
pub const CHECKSUM_OFFSET: usize = 18;

/// Offset of the trailer.
pub const TRAILER_OFFSET: usize = 19;

/// An 8-byte device value word.
pub type Value = [u8; VALUE_SIZE];

/// Checksum over the bytes between the header and the checksum position.
///
/// # Example
///
/// ```
/// use kocom_wallpad::protocol::checksum;
///
/// let region = [0x30, 0xdc, 0x00, 0x01, 0x00, 0x36, 0x00, 0x3a];
/// assert_eq!(checksum(&region), 0x7d);
/// ```
#[inline]
pub fn checksum(region: &[u8]) -> u8 {
    region.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Direction marker: high nibble of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Command issued onto the bus.
    Send,
    /// Acknowledgment of a command.
    Ack,
}

impl FrameKind {
    /// High nibble for a send frame.
    pub const SEND_NIBBLE: u8 = 0xB;
    /// High nibble for an ack frame.
    pub const ACK_NIBBLE: u8 = 0xD;

    #[inline]
    pub fn nibble(self) -> u8 {
        match self {
            FrameKind::Send => Self::SEND_NIBBLE,
            FrameKind::Ack => Self::ACK_NIBBLE,
        }
    }

    /// Anything that is not a send nibble is treated as an acknowledgment.
    #[inline]
    pub fn from_nibble(nibble: u8) -> Self {
        if nibble == Self::SEND_NIBBLE {
            FrameKind::Send
        } else {
            FrameKind::Ack
        }
    }
}

/// Retry-identifying sequence code: low nibble of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sequence {
    C,
    D,
    E,
    F,
}

impl Sequence {
    /// Retry order used by the bus writer.
    pub const ALL: [Sequence; 4] = [Sequence::C, Sequence::D, Sequence::E, Sequence::F];

    #[inline]
    pub fn nibble(self) -> u8 {
        match self {
            Sequence::C => 0xC,
            Sequence::D => 0xD,
            Sequence::E => 0xE,
            Sequence::F => 0xF,
        }
    }

    pub fn from_nibble(nibble: u8) -> Result<Self, FrameError> {
        match nibble {
            0xC => Ok(Sequence::C),
            0xD => Ok(Sequence::D),
            0xE => Ok(Sequence::E),
            0xF => Ok(Sequence::F),
            other => Err(FrameError::UnknownSequence(other)),
        }
    }
}

/// Pack kind and sequence into the type byte.
#[inline]
pub fn pack_type(kind: FrameKind, sequence: Sequence) -> u8 {
    (kind.nibble() << 4) | sequence.nibble()
}

/// Command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmd {
    /// `00`: state report / state write.
    State,
    /// `01`
    On,
    /// `02`
    Off,
    /// `3a`: state query.
    Query,
    /// Any other code seen on the bus.
    Other(u8),
}

impl Cmd {
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Cmd::State => 0x00,
            Cmd::On => 0x01,
            Cmd::Off => 0x02,
            Cmd::Query => 0x3A,
            Cmd::Other(code) => code,
        }
    }

    #[inline]
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Cmd::State,
            0x01 => Cmd::On,
            0x02 => Cmd::Off,
            0x3A => Cmd::Query,
            other => Cmd::Other(other),
        }
    }
}

/// Bus device class (high byte of an address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Wallpad,
    Light,
    Gas,
    #[serde(alias = "thermo")]
    Thermostat,
    Elevator,
    Fan,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 6] = [
        DeviceClass::Wallpad,
        DeviceClass::Light,
        DeviceClass::Gas,
        DeviceClass::Thermostat,
        DeviceClass::Elevator,
        DeviceClass::Fan,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        match self {
            DeviceClass::Wallpad => 0x01,
            DeviceClass::Light => 0x0E,
            DeviceClass::Gas => 0x2C,
            DeviceClass::Thermostat => 0x36,
            DeviceClass::Elevator => 0x44,
            DeviceClass::Fan => 0x48,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    /// Name used in device keys and command requests.
    pub fn name(self) -> &'static str {
        match self {
            DeviceClass::Wallpad => "wallpad",
            DeviceClass::Light => "light",
            DeviceClass::Gas => "gas",
            DeviceClass::Thermostat => "thermo",
            DeviceClass::Elevator => "elevator",
            DeviceClass::Fan => "fan",
        }
    }
}

impl FromStr for DeviceClass {
    type Err = WallpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thermostat" => Ok(DeviceClass::Thermostat),
            other => Self::ALL
                .into_iter()
                .find(|class| class.name() == other)
                .ok_or_else(|| WallpadError::UnknownDevice(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Room (low byte of an address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    #[serde(alias = "myhome")]
    Livingroom,
    Bedroom,
    Room1,
    Room2,
    Room3,
    Room4,
    Room5,
    Room6,
    Room7,
    Room8,
}

impl Room {
    pub const ALL: [Room; 10] = [
        Room::Livingroom,
        Room::Bedroom,
        Room::Room1,
        Room::Room2,
        Room::Room3,
        Room::Room4,
        Room::Room5,
        Room::Room6,
        Room::Room7,
        Room::Room8,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Room::Livingroom => 0x00,
            Room::Bedroom => 0x01,
            Room::Room1 => 0x02,
            Room::Room2 => 0x03,
            Room::Room3 => 0x04,
            Room::Room4 => 0x05,
            Room::Room5 => 0x06,
            Room::Room6 => 0x07,
            Room::Room7 => 0x08,
            Room::Room8 => 0x09,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|room| room.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Room::Livingroom => "livingroom",
            Room::Bedroom => "bedroom",
            Room::Room1 => "room1",
            Room::Room2 => "room2",
            Room::Room3 => "room3",
            Room::Room4 => "room4",
            Room::Room5 => "room5",
            Room::Room6 => "room6",
            Room::Room7 => "room7",
            Room::Room8 => "room8",
        }
    }
}

impl FromStr for Room {
    type Err = WallpadError;

    /// `myhome` is accepted as an alias of the living room.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "myhome" => Ok(Room::Livingroom),
            other => Self::ALL
                .into_iter()
                .find(|room| room.name() == other)
                .ok_or_else(|| WallpadError::UnknownDevice(format!("room {other}"))),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device address: class byte followed by room byte.
///
/// Addresses decoded from the bus may carry codes outside the known
/// enumerations, so the raw bytes are kept and typed views are optional.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    class: u8,
    room: u8,
}

impl Address {
    /// The wallpad itself (`0100`), default source of every command.
    pub const WALLPAD: Address = Address {
        class: 0x01,
        room: 0x00,
    };

    #[inline]
    pub fn new(class: DeviceClass, room: Room) -> Self {
        Self {
            class: class.code(),
            room: room.code(),
        }
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            class: bytes[0],
            room: bytes[1],
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 2] {
        [self.class, self.room]
    }

    #[inline]
    pub fn class_code(self) -> u8 {
        self.class
    }

    #[inline]
    pub fn room_code(self) -> u8 {
        self.room
    }

    #[inline]
    pub fn device_class(self) -> Option<DeviceClass> {
        DeviceClass::from_code(self.class)
    }

    #[inline]
    pub fn room(self) -> Option<Room> {
        Room::from_code(self.room)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.class, self.room)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
