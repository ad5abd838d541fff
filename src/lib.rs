//! # kocom-wallpad
//!
//! Protocol engine for the Kocom wallpad RS-485 home bus, reached through
//! a transparent serial-to-TCP gateway.
//!
//! This crate lets a home-automation host observe and control the devices
//! on the bus (lights, thermostats, ventilation fan, gas valve, elevator
//! call) without knowing the wire format.
//!
//! ## Architecture
//!
//! - **Protocol**: 21-byte checksummed frames, resynchronizing reader
//! - **Cache**: newest-first ring of recent frames for reply correlation
//! - **Device**: value word ⇄ typed state, semantic command builder
//! - **Writer**: exclusive send/ack exchange with sequence-code retries
//! - **Client**: [`Wallpad`] session with reconnecting supervisor and
//!   state-change notifications
//!
//! ## Example
//!
//! ```ignore
//! use kocom_wallpad::{CommandRequest, DeviceKey, GatewayConfig, Room, Wallpad};
//!
//! #[tokio::main]
//! async fn main() -> kocom_wallpad::Result<()> {
//!     let config = GatewayConfig::from_path("wallpad.json")?;
//!     let mut wallpad = Wallpad::open(config).await?;
//!
//!     wallpad.poll_enabled().await;
//!     wallpad
//!         .execute(CommandRequest::set_temperature(Room::Bedroom, 23))
//!         .await?;
//!     println!("{:?}", wallpad.get_cached_state(DeviceKey::Thermostat(Room::Bedroom)));
//!
//!     wallpad.close().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;

pub use client::{StateChange, Wallpad, WallpadBuilder, DEFAULT_EVENT_CAPACITY};
pub use config::{GatewayConfig, Timing};
pub use device::{
    CommandName, CommandRequest, CommandValue, DeviceAttributes, DeviceKey, DeviceState,
    FanPreset, HeatMode, UpdatePolicy,
};
pub use error::{FrameError, Result, WallpadError};
pub use protocol::{Address, DeviceClass, Room};
