//! Monitor - connect to a gateway and print every device state change.
//!
//! This example demonstrates:
//! - Loading a `GatewayConfig` from JSON
//! - Polling the enabled devices once at startup
//! - Subscribing to state changes
//! - Closing the session cleanly on Ctrl-C
//!
//! # Running
//!
//! ```text
//! $ cat wallpad.json
//! { "host": "192.168.0.40", "enabled_devices": ["light", "fan", "thermo_bedroom"] }
//! $ RUST_LOG=kocom_wallpad=debug cargo run --example monitor -- wallpad.json
//! ```

use kocom_wallpad::{GatewayConfig, Wallpad};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wallpad.json".to_string());
    let config = GatewayConfig::from_path(&path)?;

    let mut wallpad = Wallpad::open(config).await?;
    let mut changes = wallpad.subscribe();

    // Initial snapshot
    for (key, state) in wallpad.poll_enabled().await {
        println!("{key}: {}", serde_json::to_string(&state)?);
    }
    println!("elevator floor: {}", wallpad.elevator_floor());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => println!("{}", serde_json::to_string(&change)?),
                Err(RecvError::Lagged(n)) => eprintln!("missed {n} updates"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    wallpad.close().await;
    Ok(())
}
