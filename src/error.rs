//! Error types for kocom-wallpad.

use thiserror::Error;

/// Reasons a 21-byte candidate frame is rejected by the codec.
///
/// These never leave the read path: the frame is dropped and the reader
/// keeps scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Input is not exactly one frame long.
    #[error("Invalid frame length: {0} bytes")]
    InvalidLength(usize),

    /// First two bytes are not the `aa 55` marker.
    #[error("Header mismatch")]
    HeaderMismatch,

    /// Computed checksum differs from the checksum byte.
    #[error("Checksum mismatch: expected {expected:#04x}, found {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over bytes 2..18.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },

    /// Last two bytes are not the `0d 0d` marker.
    #[error("Trailer mismatch")]
    TrailerMismatch,

    /// Sequence nibble outside `c..=f`.
    #[error("Unknown sequence code: {0:#x}")]
    UnknownSequence(u8),
}

/// Main error type for all wallpad operations.
#[derive(Debug, Error)]
pub enum WallpadError {
    /// I/O error on the gateway socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TCP connection to the gateway could not be established.
    #[error("Connection to {addr} failed: {source}")]
    Connection {
        /// `host:port` that was dialed.
        addr: String,
        /// Underlying socket error (or `TimedOut`).
        #[source]
        source: std::io::Error,
    },

    /// Frame failed validation.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// No gateway connection is currently installed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// All sequence codes were tried without a matching reply.
    #[error("Command for {key} was not confirmed")]
    CommandUnconfirmed {
        /// Device key (or address) the command targeted.
        key: String,
    },

    /// Command/value combination not supported by the device class.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Device key, class or room name not recognized.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias using WallpadError.
pub type Result<T> = std::result::Result<T, WallpadError>;
