//! Transport module - TCP link to the serial gateway.

mod tcp;

pub use tcp::GatewayStream;
