//! The outbound publish path.
//!
//! Every publish (dispatch replies, telemetry notifications, anything an
//! adapter worker wants to emit) is an [`OutboundMessage`] sent on one
//! bounded channel and drained by a single publisher task inside the
//! transport. Producers never touch the MQTT client, so the receive path
//! cannot re-enter it.

use dab_json::Json;
use tokio::sync::mpsc;
use tracing::warn;

/// A frame waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// MQTT5 correlation data, echoed verbatim from the request.
    pub correlation: Option<Vec<u8>>,
}

impl OutboundMessage {
    /// Notification frame (no correlation, e.g. telemetry metrics).
    pub fn notification(topic: impl Into<String>, body: &Json) -> Self {
        OutboundMessage {
            topic: topic.into(),
            payload: body.serialize().into_bytes(),
            correlation: None,
        }
    }

    /// Reply frame carrying the request's correlation data.
    pub fn reply(topic: impl Into<String>, body: &Json, correlation: Option<Vec<u8>>) -> Self {
        OutboundMessage {
            topic: topic.into(),
            payload: body.serialize().into_bytes(),
            correlation,
        }
    }
}

/// Cloneable sending side of the publish channel, handed to the bridge
/// and to every telemetry scheduler.
#[derive(Debug, Clone)]
pub struct PublishHandle {
    tx: mpsc::Sender<OutboundMessage>,
}

impl PublishHandle {
    /// Queue a frame for publishing. A closed channel means the
    /// transport is shutting down; the frame is dropped with a log line,
    /// matching the "request is considered dropped" publish-failure
    /// policy.
    pub async fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).await.is_err() {
            warn!("publish channel closed, dropping outbound message");
        }
    }

    /// Serialize `body` and queue it as a notification on `topic`.
    pub async fn notify(&self, topic: impl Into<String>, body: &Json) {
        self.send(OutboundMessage::notification(topic, body)).await;
    }
}

/// Create the publish channel. The receiving half goes to the transport's
/// publisher task.
pub fn publish_channel(capacity: usize) -> (PublishHandle, mpsc::Receiver<OutboundMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    (PublishHandle { tx }, rx)
}
