//! In-memory transport for deterministic tests.
//!
//! Stands in for the broker: tests inject inbound frames and read every
//! publish, replies and telemetry alike, from the same outbound channel
//! the real transport would drain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use dab_core::{
    DabBridge, InboundRequest, OutboundMessage, PublishHandle, Transport, TransportError,
};

pub struct MemoryTransport {
    bridge: Arc<DabBridge>,
    publish: PublishHandle,
    outbound: Mutex<mpsc::Receiver<OutboundMessage>>,
    stopped: Arc<watch::Sender<bool>>,
}

impl MemoryTransport {
    pub fn new(
        bridge: Arc<DabBridge>,
        publish: PublishHandle,
        outbound: mpsc::Receiver<OutboundMessage>,
    ) -> Self {
        let (stopped, _) = watch::channel(false);
        MemoryTransport {
            bridge,
            publish,
            outbound: Mutex::new(outbound),
            stopped: Arc::new(stopped),
        }
    }

    /// Deliver one frame as the broker would, pushing every reply onto
    /// the outbound channel.
    pub async fn inject(&self, request: InboundRequest) {
        for reply in self.bridge.dispatch(request).await {
            self.publish.send(reply).await;
        }
    }

    /// Next published frame, in publish order.
    pub async fn recv(&self) -> Option<OutboundMessage> {
        self.outbound.lock().await.recv().await
    }

    /// Next published frame, or `None` after `wait`.
    pub async fn recv_timeout(&self, wait: Duration) -> Option<OutboundMessage> {
        tokio::time::timeout(wait, self.recv()).await.ok().flatten()
    }

    pub fn bridge(&self) -> &Arc<DabBridge> {
        &self.bridge
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.bridge.shutdown();
        let _ = self.stopped.send(true);
        Ok(())
    }

    async fn wait_until_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}
