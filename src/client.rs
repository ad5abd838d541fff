//! Wallpad builder and runtime loop.
//!
//! The [`WallpadBuilder`] provides a fluent API for configuring the
//! session. The [`Wallpad`] manages the lifecycle:
//! 1. Connect to the gateway
//! 2. Spawn the supervisor, which reads frames, updates device state and
//!    reconnects when the link drops
//! 3. Send commands and queries through the shared bus writer
//! 4. [`close`](Wallpad::close) cancels and joins the supervisor
//!
//! # Example
//!
//! ```ignore
//! use kocom_wallpad::{CommandRequest, FanPreset, GatewayConfig, Wallpad};
//!
//! #[tokio::main]
//! async fn main() -> kocom_wallpad::Result<()> {
//!     let mut wallpad = Wallpad::builder(GatewayConfig::new("192.168.0.40"))
//!         .open()
//!         .await?;
//!
//!     let mut changes = wallpad.subscribe();
//!     wallpad.execute(CommandRequest::fan_preset(FanPreset::High)).await?;
//!     while let Ok(change) = changes.recv().await {
//!         println!("{} → {:?}", change.key, change.state);
//!     }
//!
//!     wallpad.close().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{FrameCache, DEFAULT_CACHE_CAPACITY};
use crate::config::{GatewayConfig, Timing};
use crate::device::{
    apply_confirmed, build_value, interpret, CommandName, CommandRequest, CommandValue,
    DeviceKey, DeviceOptions, DeviceState,
};
use crate::error::{Result, WallpadError};
use crate::protocol::{hex_string, Cmd, DeviceClass, Frame, FrameBuffer, Room};
use crate::transport::GatewayStream;
use crate::writer::{lock, BusWriter};

/// Default capacity of the state-change broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Read buffer size; the bus runs at 9600 baud.
const READ_CHUNK: usize = 1024;

/// Notification emitted whenever a tracked device's state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub key: DeviceKey,
    pub state: DeviceState,
}

/// Builder for configuring and opening a [`Wallpad`] session.
pub struct WallpadBuilder {
    config: GatewayConfig,
    timing: Timing,
    cache_capacity: usize,
    event_capacity: usize,
}

impl WallpadBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            timing: Timing::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Override the gateway host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Override the gateway port.
    ///
    /// Default: 8899
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Replace all bus timing at once.
    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Wait after each transmit before looking for a reply.
    ///
    /// Default: 1.5 seconds
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.timing.settle_delay = delay;
        self
    }

    /// Minimum quiet time after an inbound read before writing.
    ///
    /// Default: 30 milliseconds
    pub fn read_write_gap(mut self, gap: Duration) -> Self {
        self.timing.read_write_gap = gap;
        self
    }

    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timing.connect_timeout = timeout;
        self
    }

    /// Delay between reconnect attempts.
    ///
    /// Default: 10 seconds
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.timing.reconnect_delay = delay;
        self
    }

    /// Pause after a read failure before the first reconnect attempt.
    ///
    /// Default: 5 seconds
    pub fn error_pause(mut self, pause: Duration) -> Self {
        self.timing.error_pause = pause;
        self
    }

    /// Number of recent frames retained for reply correlation.
    ///
    /// Default: 100
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Capacity of the state-change channel; slow subscribers lag.
    ///
    /// Default: 64
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the configuration, connect and start the supervisor.
    pub async fn open(self) -> Result<Wallpad> {
        self.config.validate()?;
        Wallpad::start(
            self.config,
            self.timing,
            self.cache_capacity,
            self.event_capacity,
        )
        .await
    }
}

/// State shared between the facade and the supervisor task.
struct Shared {
    config: GatewayConfig,
    options: DeviceOptions,
    timing: Timing,
    bus: BusWriter,
    states: Mutex<HashMap<DeviceKey, DeviceState>>,
    events: broadcast::Sender<StateChange>,
}

impl Shared {
    fn tracks(&self, key: DeviceKey) -> bool {
        self.config.enabled_devices.contains(&key)
    }

    fn state(&self, key: DeviceKey) -> Option<DeviceState> {
        lock(&self.states).get(&key).cloned()
    }

    /// Store a device state; emits a [`StateChange`] when it differs from
    /// the previous one.
    fn store(&self, key: DeviceKey, state: DeviceState) {
        if !self.tracks(key) {
            return;
        }
        let changed = {
            let mut states = lock(&self.states);
            match states.insert(key, state.clone()) {
                Some(previous) => previous != state,
                None => true,
            }
        };
        if changed {
            tracing::info!("{} updated: {}", key, hex_string(&state.raw));
            // no subscribers is fine
            let _ = self.events.send(StateChange { key, state });
        }
    }

    /// Handle one decoded inbound frame.
    fn ingest(&self, frame: Frame) {
        tracing::debug!("Received {}", frame.raw_hex());

        let update = self.config.update_policy.target(&frame).and_then(|address| {
            let key = DeviceKey::from_address(address)?;
            let attributes = interpret(address, &frame.value, &self.options)?;
            Some((key, DeviceState::new(attributes, frame.value)))
        });
        self.bus.record(frame);

        if let Some((key, state)) = update {
            self.store(key, state);
        }
    }

    async fn query_device(&self, key: DeviceKey) -> Option<DeviceState> {
        let address = key.address();
        let value = match self.bus.find_fresh(address).into_option() {
            Some(frame) => frame.value,
            None => {
                let reply = self
                    .bus
                    .send_semantic(address, Cmd::Query, [0; 8])
                    .await?;
                reply.value
            }
        };
        let attributes = interpret(address, &value, &self.options)?;
        Some(DeviceState::new(attributes, value))
    }
}

/// A running wallpad session.
///
/// Owns the connection supervisor; call [`close`](Self::close) to stop it.
pub struct Wallpad {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl Wallpad {
    /// Create a new builder.
    pub fn builder(config: GatewayConfig) -> WallpadBuilder {
        WallpadBuilder::new(config)
    }

    /// Open a session with default timing.
    pub async fn open(config: GatewayConfig) -> Result<Self> {
        WallpadBuilder::new(config).open().await
    }

    /// Open a session to `host:port` with every other setting at default.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        WallpadBuilder::new(GatewayConfig::new(host))
            .port(port)
            .open()
            .await
    }

    async fn start(
        config: GatewayConfig,
        timing: Timing,
        cache_capacity: usize,
        event_capacity: usize,
    ) -> Result<Self> {
        // 1. Connect
        let addr = config.addr();
        let stream = GatewayStream::connect(&addr, timing.connect_timeout).await?;
        tracing::info!("Connected to gateway {}", addr);

        // 2. Shared state
        let cache = FrameCache::with_capacity(cache_capacity, config.polling_interval());
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let shared = Arc::new(Shared {
            options: config.device_options(),
            bus: BusWriter::new(cache, &timing),
            states: Mutex::new(HashMap::new()),
            events,
            config,
            timing,
        });

        // 3. Install the write half, spawn the supervisor on the read half
        let (reader, writer) = stream.into_split();
        shared.bus.install(writer).await;

        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(Self::supervise(shared.clone(), reader, cancel.clone()));

        Ok(Self {
            shared,
            cancel,
            supervisor: Some(supervisor),
        })
    }

    /// Read until the link fails, then reconnect, until cancelled.
    async fn supervise(shared: Arc<Shared>, mut reader: OwnedReadHalf, cancel: CancellationToken) {
        let addr = shared.config.addr();
        let timing = shared.timing;
        let read_timeout = timing.read_timeout(shared.config.polling_interval());

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = Self::read_loop(&shared, &mut reader, read_timeout) => outcome,
            };
            match outcome {
                Ok(()) => tracing::warn!("Gateway {} closed the connection", addr),
                Err(e) => tracing::warn!("Read from gateway {} failed: {}", addr, e),
            }
            shared.bus.uninstall().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(timing.error_pause) => {}
            }

            reader = loop {
                let attempt = tokio::select! {
                    _ = cancel.cancelled() => return,
                    attempt = GatewayStream::connect(&addr, timing.connect_timeout) => attempt,
                };
                match attempt {
                    Ok(stream) => {
                        let (reader, writer) = stream.into_split();
                        shared.bus.install(writer).await;
                        tracing::info!("Reconnected to gateway {}", addr);
                        break reader;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Reconnect failed: {}; retrying in {:?}",
                            e,
                            timing.reconnect_delay
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(timing.reconnect_delay) => {}
                        }
                    }
                }
            };
        }

        shared.bus.uninstall().await;
        tracing::info!("Disconnected from gateway {}", addr);
    }

    /// Main read loop - reads bytes, extracts frames and ingests them.
    ///
    /// Returns `Ok(())` on EOF. A read timeout only means the bus was quiet.
    async fn read_loop<R: AsyncRead + Unpin>(
        shared: &Shared,
        reader: &mut R,
        read_timeout: Duration,
    ) -> Result<()> {
        let mut frame_buffer = FrameBuffer::new();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            let n = match tokio::time::timeout(read_timeout, reader.read(&mut buf)).await {
                Err(_elapsed) => {
                    tracing::debug!("No bus traffic for {:?}", read_timeout);
                    continue;
                }
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(WallpadError::Io(e)),
            };
            shared.bus.note_read();

            for frame in frame_buffer.push(&buf[..n]) {
                shared.ingest(frame);
            }
        }
    }

    /// Send a semantic command and wait for the device to confirm it.
    ///
    /// On confirmation the device's state is updated from the sent value
    /// and a [`StateChange`] is emitted.
    pub async fn execute(&self, request: CommandRequest) -> Result<()> {
        let shared = &*self.shared;
        let address = request.address();
        let key = request.key();

        let mut bus = shared.bus.lock().await;
        let base = key.and_then(|k| shared.state(k)).map(|state| state.raw);
        let value = build_value(&request, base, &shared.options)?;

        if bus.send_semantic(address, Cmd::State, value).await.is_none() {
            return Err(WallpadError::CommandUnconfirmed {
                key: key.map_or_else(|| address.to_string(), |k| k.to_string()),
            });
        }
        tracing::info!("Sent command to {}: {}", address, hex_string(&value));

        let confirmed = apply_confirmed(&request, &value, &shared.options);
        if let (Some(key), Some(attributes)) = (key, confirmed) {
            shared.store(key, DeviceState::new(attributes, value));
        }
        drop(bus);
        Ok(())
    }

    /// [`execute`](Self::execute), reporting only whether it was confirmed.
    pub async fn send_semantic_command(
        &self,
        class: DeviceClass,
        room: Room,
        command: CommandName,
        value: Option<CommandValue>,
    ) -> bool {
        match self
            .execute(CommandRequest::new(class, room, command, value))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{} {} in {} failed: {}", class, command, room, e);
                false
            }
        }
    }

    /// Current state of a tracked device, if known.
    pub fn get_cached_state(&self, key: DeviceKey) -> Option<DeviceState> {
        self.shared.state(key)
    }

    /// All known device states.
    pub fn snapshot(&self) -> HashMap<DeviceKey, DeviceState> {
        lock(&self.shared.states).clone()
    }

    /// State of `key` from a fresh cached frame, or from an explicit query.
    pub async fn query_device(&self, key: DeviceKey) -> Option<DeviceState> {
        self.shared.query_device(key).await
    }

    /// Query every enabled device and store the results.
    pub async fn poll_enabled(&self) -> HashMap<DeviceKey, DeviceState> {
        let shared = &*self.shared;
        for key in shared.config.enabled_devices.iter().copied() {
            if key == DeviceKey::Elevator {
                continue;
            }
            match shared.query_device(key).await {
                Some(state) => shared.store(key, state),
                None => tracing::debug!("No state for {}", key),
            }
        }
        self.snapshot()
    }

    /// Send a query to every enabled device; replies are ingested by the
    /// reader like any other traffic. Returns the number answered.
    pub async fn refresh_all(&self) -> usize {
        tracing::info!("Refreshing all devices");
        let mut answered = 0;
        for key in self.shared.config.enabled_devices.iter().copied() {
            if self
                .shared
                .bus
                .send_semantic(key.address(), Cmd::Query, [0; 8])
                .await
                .is_some()
            {
                answered += 1;
            }
        }
        answered
    }

    /// Receive every future [`StateChange`].
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.shared.events.subscribe()
    }

    /// Floor number the elevator controller knows this unit by.
    pub fn elevator_floor(&self) -> u8 {
        self.shared.config.rs485_floor
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.shared.config
    }

    /// Whether a gateway connection is currently installed.
    pub async fn is_connected(&self) -> bool {
        self.shared.bus.is_connected().await
    }

    /// Stop the supervisor and drop the connection.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.await {
                tracing::error!("Supervisor task failed: {}", e);
            }
        }
        self.shared.bus.uninstall().await;
    }
}

impl Drop for Wallpad {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
