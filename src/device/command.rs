//! Semantic command → value word.
//!
//! Commands are built by patching the device's last known value word so
//! that bytes the command does not own are preserved. Before the first
//! reading a class-specific fallback base is used instead.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::state::{DeviceAttributes, DeviceOptions, FanPreset, GasState, HeatMode};
use super::{interpret, DeviceKey};
use crate::error::{Result, WallpadError};
use crate::protocol::{Address, DeviceClass, Room, Value};

/// Cold-start base for thermostat commands: heating off, 20 °C current.
pub const THERMOSTAT_DEFAULT_VALUE: Value = [0x01, 0x00, 0x05, 0x00, 0x14, 0x00, 0x00, 0x00];

const LIGHT_ON: u8 = 0xFF;
const FAN_ON: u8 = 0x11;
const FAN_OFF: u8 = 0x10;
const THERMO_HEAT: u8 = 0x11;
const THERMO_OFF: u8 = 0x01;

/// Semantic command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    On,
    Off,
    SetTemp,
    HeatMode,
    Preset,
}

impl CommandName {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::On => "on",
            CommandName::Off => "off",
            CommandName::SetTemp => "set_temp",
            CommandName::HeatMode => "heat_mode",
            CommandName::Preset => "preset",
        }
    }
}

impl FromStr for CommandName {
    type Err = WallpadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "on" => Ok(CommandName::On),
            "off" => Ok(CommandName::Off),
            "set_temp" => Ok(CommandName::SetTemp),
            "heat_mode" => Ok(CommandName::HeatMode),
            "preset" => Ok(CommandName::Preset),
            other => Err(WallpadError::InvalidCommand(format!("unknown command {other}"))),
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument carried by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    /// Temperature for `set_temp`, or a light channel.
    Integer(i64),
    HeatMode(HeatMode),
    Preset(FanPreset),
}

/// A semantic command addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub class: DeviceClass,
    pub room: Room,
    pub command: CommandName,
    #[serde(default)]
    pub value: Option<CommandValue>,
}

impl CommandRequest {
    pub fn new(
        class: DeviceClass,
        room: Room,
        command: CommandName,
        value: Option<CommandValue>,
    ) -> Self {
        Self {
            class,
            room,
            command,
            value,
        }
    }

    /// Switch one light channel (1-based).
    pub fn light(channel: u8, on: bool) -> Self {
        let command = if on { CommandName::On } else { CommandName::Off };
        Self::new(
            DeviceClass::Light,
            Room::Livingroom,
            command,
            Some(CommandValue::Integer(i64::from(channel))),
        )
    }

    pub fn set_temperature(room: Room, temp: u8) -> Self {
        Self::new(
            DeviceClass::Thermostat,
            room,
            CommandName::SetTemp,
            Some(CommandValue::Integer(i64::from(temp))),
        )
    }

    pub fn heat_mode(room: Room, mode: HeatMode) -> Self {
        Self::new(
            DeviceClass::Thermostat,
            room,
            CommandName::HeatMode,
            Some(CommandValue::HeatMode(mode)),
        )
    }

    pub fn fan_preset(preset: FanPreset) -> Self {
        Self::new(
            DeviceClass::Fan,
            Room::Livingroom,
            CommandName::Preset,
            Some(CommandValue::Preset(preset)),
        )
    }

    pub fn fan_off() -> Self {
        Self::new(DeviceClass::Fan, Room::Livingroom, CommandName::Off, None)
    }

    pub fn gas_close() -> Self {
        Self::new(DeviceClass::Gas, Room::Livingroom, CommandName::Off, None)
    }

    pub fn call_elevator() -> Self {
        Self::new(DeviceClass::Elevator, Room::Livingroom, CommandName::On, None)
    }

    /// Bus address the command is sent to.
    pub fn address(&self) -> Address {
        Address::new(self.class, self.room)
    }

    /// Tracked device the command affects, if any.
    pub fn key(&self) -> Option<DeviceKey> {
        DeviceKey::from_address(self.address())
    }

    fn invalid(&self) -> WallpadError {
        WallpadError::InvalidCommand(format!(
            "{} {} with {:?} for {}",
            self.class, self.command, self.value, self.room
        ))
    }
}

/// Base value used when no reading has been seen for the class yet.
pub fn default_base(class: DeviceClass) -> Value {
    match class {
        DeviceClass::Thermostat => THERMOSTAT_DEFAULT_VALUE,
        _ => [0; 8],
    }
}

/// Build the value word for `request`, patching `base` (or the class's
/// fallback base when `None`).
pub fn build_value(request: &CommandRequest, base: Option<Value>, opts: &DeviceOptions) -> Result<Value> {
    let mut value = base.unwrap_or_else(|| default_base(request.class));

    match (request.class, request.command) {
        (DeviceClass::Light, CommandName::On | CommandName::Off) => {
            let channel = match request.value {
                Some(CommandValue::Integer(n)) => n,
                _ => return Err(request.invalid()),
            };
            let count = opts.light_count.min(super::MAX_LIGHT_CHANNELS);
            if channel < 1 || channel > i64::from(count) {
                return Err(WallpadError::InvalidCommand(format!(
                    "light channel {channel} outside 1..={count}"
                )));
            }
            let idx = (channel - 1) as usize;
            value[idx] = if request.command == CommandName::On {
                LIGHT_ON
            } else {
                0x00
            };
        }
        (DeviceClass::Thermostat, CommandName::SetTemp) => {
            let temp = match request.value {
                Some(CommandValue::Integer(t)) => u8::try_from(t).map_err(|_| {
                    WallpadError::InvalidCommand(format!("temperature {t} out of range"))
                })?,
                _ => return Err(request.invalid()),
            };
            value[2] = temp;
        }
        (DeviceClass::Thermostat, CommandName::HeatMode) => {
            let mode = match request.value {
                Some(CommandValue::HeatMode(mode)) => mode,
                _ => return Err(request.invalid()),
            };
            value[0] = match mode {
                HeatMode::Heat => THERMO_HEAT,
                HeatMode::Off => THERMO_OFF,
            };
            value[1] = 0x00;
            value[2] = opts.init_temp;
        }
        (DeviceClass::Fan, CommandName::On | CommandName::Preset) => {
            let preset = match request.value {
                None => opts.init_fan_mode,
                Some(CommandValue::Preset(preset)) => preset,
                // untagged JSON "off" lands on the heat mode variant
                Some(CommandValue::HeatMode(HeatMode::Off)) => FanPreset::Off,
                Some(_) => return Err(request.invalid()),
            };
            patch_fan(&mut value, preset);
        }
        (DeviceClass::Fan, CommandName::Off) => patch_fan(&mut value, FanPreset::Off),
        (DeviceClass::Gas, CommandName::Off) | (DeviceClass::Elevator, CommandName::On) => {
            value = [0; 8];
        }
        (DeviceClass::Gas, CommandName::On) => {
            return Err(WallpadError::InvalidCommand(
                "gas valve can only be closed".to_string(),
            ));
        }
        _ => return Err(request.invalid()),
    }

    Ok(value)
}

fn patch_fan(value: &mut Value, preset: FanPreset) {
    value[0] = if preset == FanPreset::Off { FAN_OFF } else { FAN_ON };
    value[1] = 0x00;
    value[2] = preset.code();
}

/// Attributes to record once a command has been confirmed.
///
/// The sent value is interpreted as if the device had reported it; a gas
/// close is recorded as a closed valve. A `set_temp` records the requested
/// target even while heating is off. Elevator calls carry no state.
pub fn apply_confirmed(
    request: &CommandRequest,
    sent: &Value,
    opts: &DeviceOptions,
) -> Option<DeviceAttributes> {
    match (request.class, request.command) {
        (DeviceClass::Gas, _) => Some(DeviceAttributes::Gas(GasState { open: false })),
        (DeviceClass::Thermostat, CommandName::SetTemp) => {
            match interpret(request.address(), sent, opts)? {
                DeviceAttributes::Thermostat(mut thermo) => {
                    thermo.target_temp = sent[2];
                    Some(DeviceAttributes::Thermostat(thermo))
                }
                other => Some(other),
            }
        }
        _ => interpret(request.address(), sent, opts),
    }
}
