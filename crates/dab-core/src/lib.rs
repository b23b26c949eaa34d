//! Adapter framework for the Device Automation Bus (DAB).
//!
//! DAB drives consumer devices (TVs, set-top boxes) over a JSON-on-MQTT
//! request/response protocol. This crate is the broker-side framework:
//!
//! - **Adapters** register async handlers for the operations their device
//!   supports; the registered set becomes the op-set advertised by
//!   `operations/list` ([`AdapterBuilder`]).
//! - **The bridge** routes `dab/<deviceId>/<method>` requests to the
//!   right adapter, validates parameters, and maps every failure to a
//!   `{status, error}` reply ([`DabBridge`]).
//! - **Telemetry** streams run per device on their own timers and push
//!   unsolicited metric notifications ([`telemetry::TelemetryScheduler`]).
//! - **Transports** deliver requests and drain the shared outbound
//!   publish channel ([`Transport`], [`publish_channel`]).
//!
//! Wire payloads use the [`dab_json`] value model throughout.

pub mod adapter;
pub mod bridge;
pub mod error;
pub mod factory;
pub mod method;
pub mod outbound;
pub mod params;
pub mod telemetry;
pub mod topic;
pub mod transport;

pub use adapter::{AdapterBuilder, DeviceAdapter, HandlerFuture, PROTOCOL_VERSION};
pub use bridge::{BridgeBuilder, DabBridge, InboundRequest, DEFAULT_RESPONSE_TOPIC};
pub use error::{DabError, DabResult, TransportError};
pub use factory::{AdapterContext, AdapterFactory, AdapterRegistry};
pub use method::DabMethod;
pub use outbound::{publish_channel, OutboundMessage, PublishHandle};
pub use params::{ParamKind, ParamSpec, Params};
pub use telemetry::TelemetryKey;
pub use transport::Transport;
