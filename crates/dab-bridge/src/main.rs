//! DAB bridge process.
//!
//! Hosts one device adapter and serves it over MQTT:
//!
//! ```text
//! dab-bridge <broker-url> <device-id> <device-address>
//! ```
//!
//! Exits 0 on a clean disconnect (Ctrl-C), nonzero when startup fails.

mod panel;
mod rdk;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dab_core::{AdapterRegistry, DabBridge, Transport};
use dab_mqtt::{MqttConfig, MqttTransport};

/// Host a DAB device adapter on an MQTT broker.
#[derive(Parser, Debug)]
#[command(name = "dab-bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// MQTT broker URL, e.g. tcp://localhost:1883.
    broker: String,

    /// DAB deviceId served by this process.
    device_id: String,

    /// Free-form address of the device to manage.
    device_address: String,

    /// Verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = MqttConfig::from_url(&args.broker)?;
    let (publish, outbound) = dab_core::publish_channel(config.channel_capacity);

    // probed in order; the panel stub is the catch-all
    let mut registry = AdapterRegistry::new();
    registry.register(rdk::RdkAdapter::factory());
    registry.register(panel::PanelAdapter::factory());

    let bridge = Arc::new(
        DabBridge::builder()
            .device(&args.device_id, &args.device_address)
            .build(&registry, publish.clone())?,
    );

    let transport = MqttTransport::new(&config, bridge, publish, outbound);
    transport.connect().await?;
    info!(
        broker = %args.broker,
        device = %args.device_id,
        "bridge running"
    );

    tokio::select! {
        _ = transport.wait_until_stopped() => {
            info!("transport stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            transport.disconnect().await?;
            transport.wait_until_stopped().await;
        }
    }
    Ok(())
}
