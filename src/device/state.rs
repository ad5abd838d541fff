//! Device state interpretation.
//!
//! Each device packs its attributes into the 8-byte value word of its
//! frames. [`interpret`] is a pure mapping from a device address and value
//! to [`DeviceAttributes`]; classes without a known layout yield `None`.
//!
//! | class      | byte 0        | byte 1     | byte 2         | byte 4      |
//! |------------|---------------|------------|----------------|-------------|
//! | thermostat | `11` heat     | `01` away  | target temp    | current temp|
//! | fan        | `11` on       |            | `40`/`80`/`c0` |             |
//! | light      | one byte per channel, non-zero = on                       |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WallpadError;
use crate::protocol::{Address, DeviceClass, Value};

/// Highest light channel count the value word can carry.
pub const MAX_LIGHT_CHANNELS: u8 = 8;

const ON_MARKER: u8 = 0x11;
const AWAY_MARKER: u8 = 0x01;

/// Static per-installation options needed to interpret or build values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Number of light channels on the light controller.
    pub light_count: u8,
    /// Target temperature reported while a thermostat is off, and written
    /// when heating is switched on.
    pub init_temp: u8,
    /// Preset used when the fan is switched on without one.
    pub init_fan_mode: FanPreset,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            light_count: 2,
            init_temp: 20,
            init_fan_mode: FanPreset::Medium,
        }
    }
}

/// Thermostat heating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatMode {
    Heat,
    Off,
}

impl FromStr for HeatMode {
    type Err = WallpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heat" => Ok(HeatMode::Heat),
            "off" => Ok(HeatMode::Off),
            other => Err(WallpadError::InvalidCommand(format!("heat mode {other}"))),
        }
    }
}

/// Ventilation fan preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanPreset {
    #[serde(alias = "off")]
    Off,
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl FanPreset {
    /// Speed byte written to byte 2 of the fan value word.
    pub fn code(self) -> u8 {
        match self {
            FanPreset::Off => 0x00,
            FanPreset::Low => 0x40,
            FanPreset::Medium => 0x80,
            FanPreset::High => 0xC0,
        }
    }

    /// Preset for a running fan's speed byte; unknown codes read as Medium.
    pub fn from_running_code(code: u8) -> Self {
        match code {
            0x40 => FanPreset::Low,
            0xC0 => FanPreset::High,
            _ => FanPreset::Medium,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FanPreset::Off => "Off",
            FanPreset::Low => "Low",
            FanPreset::Medium => "Medium",
            FanPreset::High => "High",
        }
    }
}

impl FromStr for FanPreset {
    type Err = WallpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(FanPreset::Off),
            "low" => Ok(FanPreset::Low),
            "medium" => Ok(FanPreset::Medium),
            "high" => Ok(FanPreset::High),
            _ => Err(WallpadError::InvalidCommand(format!("fan preset {s}"))),
        }
    }
}

impl fmt::Display for FanPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermostatState {
    pub mode: HeatMode,
    pub away: bool,
    pub target_temp: u8,
    /// `None` when the thermostat reports `00` (no reading).
    pub current_temp: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    /// Channel 1 is index 0.
    pub channels: Vec<bool>,
}

impl LightState {
    /// On/off state of a 1-based channel.
    pub fn is_on(&self, channel: u8) -> Option<bool> {
        let idx = usize::from(channel).checked_sub(1)?;
        self.channels.get(idx).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanState {
    pub on: bool,
    pub preset: FanPreset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasState {
    /// The bus never reports a closed valve; `false` only follows a
    /// confirmed close command.
    pub open: bool,
}

/// Interpreted attributes of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceAttributes {
    Thermostat(ThermostatState),
    Light(LightState),
    Fan(FanState),
    Gas(GasState),
}

/// Tracked state of a device: attributes plus the raw value they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(flatten)]
    pub attributes: DeviceAttributes,
    /// Last raw value word; base for patch-built commands.
    pub raw: Value,
}

impl DeviceState {
    pub fn new(attributes: DeviceAttributes, raw: Value) -> Self {
        Self { attributes, raw }
    }
}

/// Map a device's value word to typed attributes.
pub fn interpret(address: Address, value: &Value, opts: &DeviceOptions) -> Option<DeviceAttributes> {
    let attributes = match address.device_class()? {
        DeviceClass::Thermostat => {
            let mode = if value[0] == ON_MARKER {
                HeatMode::Heat
            } else {
                HeatMode::Off
            };
            DeviceAttributes::Thermostat(ThermostatState {
                mode,
                away: value[1] == AWAY_MARKER,
                target_temp: match mode {
                    HeatMode::Heat => value[2],
                    HeatMode::Off => opts.init_temp,
                },
                current_temp: (value[4] != 0).then_some(value[4]),
            })
        }
        DeviceClass::Light => {
            let count = usize::from(opts.light_count.min(MAX_LIGHT_CHANNELS));
            DeviceAttributes::Light(LightState {
                channels: value[..count].iter().map(|b| *b != 0).collect(),
            })
        }
        DeviceClass::Fan => {
            let on = value[0] == ON_MARKER;
            DeviceAttributes::Fan(FanState {
                on,
                preset: if on {
                    FanPreset::from_running_code(value[2])
                } else {
                    FanPreset::Off
                },
            })
        }
        DeviceClass::Gas => DeviceAttributes::Gas(GasState { open: true }),
        DeviceClass::Wallpad | DeviceClass::Elevator => return None,
    };
    Some(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Room;

    fn addr(class: DeviceClass) -> Address {
        Address::new(class, Room::Livingroom)
    }

    fn opts() -> DeviceOptions {
        DeviceOptions {
            light_count: 3,
            init_temp: 22,
            init_fan_mode: FanPreset::Low,
        }
    }

    #[test]
    fn test_thermostat_heating() {
        let value = [0x11, 0x00, 0x17, 0x00, 0x15, 0x00, 0x00, 0x00];
        let attrs = interpret(addr(DeviceClass::Thermostat), &value, &opts()).unwrap();
        assert_eq!(
            attrs,
            DeviceAttributes::Thermostat(ThermostatState {
                mode: HeatMode::Heat,
                away: false,
                target_temp: 23,
                current_temp: Some(21),
            })
        );
    }

    #[test]
    fn test_thermostat_off_uses_initial_temperature() {
        let value = [0x01, 0x01, 0x18, 0x00, 0x14, 0x00, 0x00, 0x00];
        let Some(DeviceAttributes::Thermostat(state)) =
            interpret(addr(DeviceClass::Thermostat), &value, &opts())
        else {
            panic!("expected thermostat attributes");
        };
        assert_eq!(state.mode, HeatMode::Off);
        assert!(state.away);
        assert_eq!(state.target_temp, 22);
        assert_eq!(state.current_temp, Some(20));
    }

    #[test]
    fn test_thermostat_zero_current_temperature_is_unknown() {
        let value = [0x11, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00];
        let Some(DeviceAttributes::Thermostat(state)) =
            interpret(addr(DeviceClass::Thermostat), &value, &opts())
        else {
            panic!("expected thermostat attributes");
        };
        assert_eq!(state.current_temp, None);
    }

    #[test]
    fn test_light_channels() {
        let value = [0xFF, 0x00, 0x01, 0xFF, 0, 0, 0, 0];
        let Some(DeviceAttributes::Light(state)) =
            interpret(addr(DeviceClass::Light), &value, &opts())
        else {
            panic!("expected light attributes");
        };
        assert_eq!(state.channels, vec![true, false, true]);
        assert_eq!(state.is_on(1), Some(true));
        assert_eq!(state.is_on(2), Some(false));
        assert_eq!(state.is_on(0), None);
        assert_eq!(state.is_on(4), None);
    }

    #[test]
    fn test_light_count_is_capped() {
        let mut o = opts();
        o.light_count = 12;
        let Some(DeviceAttributes::Light(state)) =
            interpret(addr(DeviceClass::Light), &[0xFF; 8], &o)
        else {
            panic!("expected light attributes");
        };
        assert_eq!(state.channels.len(), 8);
    }

    #[test]
    fn test_fan_on_medium() {
        let value = [0x11, 0x00, 0x80, 0, 0, 0, 0, 0];
        assert_eq!(
            interpret(addr(DeviceClass::Fan), &value, &opts()),
            Some(DeviceAttributes::Fan(FanState {
                on: true,
                preset: FanPreset::Medium
            }))
        );
    }

    #[test]
    fn test_fan_off_ignores_speed_byte() {
        for speed in [0x00, 0x40, 0x80, 0xC0] {
            let value = [0x02, 0x00, speed, 0, 0, 0, 0, 0];
            assert_eq!(
                interpret(addr(DeviceClass::Fan), &value, &opts()),
                Some(DeviceAttributes::Fan(FanState {
                    on: false,
                    preset: FanPreset::Off
                }))
            );
        }
    }

    #[test]
    fn test_fan_presets() {
        let preset = |speed| match interpret(
            addr(DeviceClass::Fan),
            &[0x11, 0, speed, 0, 0, 0, 0, 0],
            &opts(),
        ) {
            Some(DeviceAttributes::Fan(state)) => state.preset,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(preset(0x40), FanPreset::Low);
        assert_eq!(preset(0xC0), FanPreset::High);
        assert_eq!(preset(0x33), FanPreset::Medium);
    }

    #[test]
    fn test_gas_is_always_open() {
        assert_eq!(
            interpret(addr(DeviceClass::Gas), &[0; 8], &opts()),
            Some(DeviceAttributes::Gas(GasState { open: true }))
        );
    }

    #[test]
    fn test_unrecognized_classes_yield_nothing() {
        assert_eq!(interpret(Address::WALLPAD, &[0x11; 8], &opts()), None);
        assert_eq!(interpret(addr(DeviceClass::Elevator), &[0; 8], &opts()), None);
        assert_eq!(
            interpret(Address::from_bytes([0x99, 0x00]), &[0; 8], &opts()),
            None
        );
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("Medium".parse::<FanPreset>().unwrap(), FanPreset::Medium);
        assert_eq!("high".parse::<FanPreset>().unwrap(), FanPreset::High);
        assert!("turbo".parse::<FanPreset>().is_err());
    }

    #[test]
    fn test_state_serializes_with_type_tag() {
        let state = DeviceState::new(
            DeviceAttributes::Fan(FanState {
                on: true,
                preset: FanPreset::High,
            }),
            [0x11, 0, 0xC0, 0, 0, 0, 0, 0],
        );
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "fan");
        assert_eq!(json["preset"], "High");
        assert_eq!(json["raw"][2], 0xC0);
    }
}
