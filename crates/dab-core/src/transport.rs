//! The abstract transport contract.
//!
//! The bridge and scheduler never speak to an MQTT library; they produce
//! [`OutboundMessage`](crate::OutboundMessage)s and consume
//! [`InboundRequest`](crate::InboundRequest)s. A transport implementation
//! connects those two ends to a broker (or, in tests, to an in-memory
//! queue) and exposes this lifecycle.

use async_trait::async_trait;

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link and subscribe to every topic the bridge serves.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Cooperative shutdown: cancel telemetry, stop publishing, close
    /// the link, and wake [`wait_until_stopped`](Self::wait_until_stopped).
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Block until the transport stops, either via
    /// [`disconnect`](Self::disconnect) or because the underlying link
    /// dropped.
    async fn wait_until_stopped(&self);
}
