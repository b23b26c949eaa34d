//! MQTT v5 transport for the DAB adapter framework.
//!
//! Wraps `rumqttc`'s v5 client behind the [`Transport`](dab_core::Transport)
//! contract: incoming `dab/...` publishes are dispatched through the
//! bridge (honoring the MQTT5 response-topic and correlation-data
//! properties), and every outbound frame, reply or telemetry
//! notification alike, leaves through a single publisher task.
//!
//! [`MemoryTransport`] provides the same surface without a broker for
//! deterministic tests.

mod config;
mod memory;
mod transport;

pub use config::MqttConfig;
pub use memory::MemoryTransport;
pub use transport::MqttTransport;
