//! Device module - keys, state interpretation and command building.
//!
//! Provides:
//! - [`DeviceKey`] - stable roster key (`light`, `fan`, `thermo_bedroom`, ...)
//! - [`interpret`] - 8-byte value word → typed attributes
//! - [`build_value`] - semantic command → patched value word

mod command;
mod state;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WallpadError;
use crate::protocol::{Address, Cmd, DeviceClass, Frame, Room};

pub use command::{
    apply_confirmed, build_value, default_base, CommandName, CommandRequest, CommandValue,
    THERMOSTAT_DEFAULT_VALUE,
};
pub use state::{
    interpret, DeviceAttributes, DeviceOptions, DeviceState, FanPreset, FanState, GasState,
    HeatMode, LightState, ThermostatState, MAX_LIGHT_CHANNELS,
};

/// Stable key identifying a tracked device.
///
/// Lights, gas, fan and elevator are single per household and live at the
/// living-room address; thermostats exist per room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceKey {
    Light,
    Gas,
    Fan,
    Elevator,
    Thermostat(Room),
}

impl DeviceKey {
    pub fn class(self) -> DeviceClass {
        match self {
            DeviceKey::Light => DeviceClass::Light,
            DeviceKey::Gas => DeviceClass::Gas,
            DeviceKey::Fan => DeviceClass::Fan,
            DeviceKey::Elevator => DeviceClass::Elevator,
            DeviceKey::Thermostat(_) => DeviceClass::Thermostat,
        }
    }

    pub fn room(self) -> Room {
        match self {
            DeviceKey::Thermostat(room) => room,
            _ => Room::Livingroom,
        }
    }

    /// Bus address of the device.
    pub fn address(self) -> Address {
        Address::new(self.class(), self.room())
    }

    /// Key for a bus address, or `None` for the wallpad and unknown codes.
    pub fn from_address(address: Address) -> Option<Self> {
        match address.device_class()? {
            DeviceClass::Light => Some(DeviceKey::Light),
            DeviceClass::Gas => Some(DeviceKey::Gas),
            DeviceClass::Fan => Some(DeviceKey::Fan),
            DeviceClass::Elevator => Some(DeviceKey::Elevator),
            DeviceClass::Thermostat => address.room().map(DeviceKey::Thermostat),
            DeviceClass::Wallpad => None,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKey::Thermostat(room) => write!(f, "thermo_{room}"),
            other => f.write_str(other.class().name()),
        }
    }
}

impl FromStr for DeviceKey {
    type Err = WallpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(DeviceKey::Light),
            "gas" => Ok(DeviceKey::Gas),
            "fan" => Ok(DeviceKey::Fan),
            "elevator" => Ok(DeviceKey::Elevator),
            other => match other.strip_prefix("thermo_") {
                Some(room) => Ok(DeviceKey::Thermostat(room.parse()?)),
                None => Err(WallpadError::UnknownDevice(other.to_string())),
            },
        }
    }
}

impl TryFrom<String> for DeviceKey {
    type Error = WallpadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceKey> for String {
    fn from(key: DeviceKey) -> Self {
        key.to_string()
    }
}

/// Which acknowledgments update the state map.
///
/// Both policies only accept `ack` frames carrying `cmd == state`; they
/// differ in which side of the exchange is the wallpad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Wallpad echoes a device's state: `src == 0100`, device is `dest`.
    #[default]
    EchoFromWallpad,
    /// Device answers the wallpad: `dest == 0100`, device is `src`.
    ReplyToWallpad,
}

impl UpdatePolicy {
    /// Device whose state `frame` describes, if it should be applied.
    pub fn target(self, frame: &Frame) -> Option<Address> {
        if !frame.is_ack() || frame.cmd != Cmd::State {
            return None;
        }
        match self {
            UpdatePolicy::EchoFromWallpad => (frame.src == Address::WALLPAD).then_some(frame.dest),
            UpdatePolicy::ReplyToWallpad => (frame.dest == Address::WALLPAD).then_some(frame.src),
        }
    }
}
