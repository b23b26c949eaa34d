//! The bridge: request routing across adapters.
//!
//! The bridge owns every adapter instance, keyed by deviceId. The table
//! is built once at bootstrap and never mutated afterwards, so dispatch
//! reads it without locking and any number of dispatch calls may be in
//! flight concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use dab_json::Json;
use tracing::{debug, info, warn};

use crate::adapter::DeviceAdapter;
use crate::error::{DabError, DabResult};
use crate::factory::{AdapterContext, AdapterRegistry};
use crate::method::DabMethod;
use crate::outbound::{OutboundMessage, PublishHandle};
use crate::topic::{parse_topic, Route};

/// Replies go here when the request carried no MQTT5 response-topic.
pub const DEFAULT_RESPONSE_TOPIC: &str = "dab/response";

/// One request as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    /// MQTT5 response-topic property.
    pub response_topic: Option<String>,
    /// MQTT5 correlation-data property, echoed verbatim in replies.
    pub correlation: Option<Vec<u8>>,
}

impl InboundRequest {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundRequest {
            topic: topic.into(),
            payload: payload.into(),
            response_topic: None,
            correlation: None,
        }
    }

    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
        self.response_topic = Some(topic.into());
        self
    }

    pub fn with_correlation(mut self, correlation: impl Into<Vec<u8>>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }
}

/// Router over all adapter instances in the process.
pub struct DabBridge {
    adapters: HashMap<String, Arc<DeviceAdapter>>,
}

/// Declares the devices the bridge should host.
#[derive(Default)]
pub struct BridgeBuilder {
    devices: Vec<(String, String)>,
}

impl BridgeBuilder {
    /// Add a device by id and free-form address; the registry picks the
    /// implementation at build time.
    pub fn device(mut self, device_id: impl Into<String>, address: impl Into<String>) -> Self {
        self.devices.push((device_id.into(), address.into()));
        self
    }

    pub fn build(self, registry: &AdapterRegistry, publish: PublishHandle) -> DabResult<DabBridge> {
        let mut adapters = HashMap::new();
        for (device_id, address) in self.devices {
            if adapters.contains_key(&device_id) {
                return Err(DabError::bad_request(format!(
                    "duplicate deviceId \"{device_id}\""
                )));
            }
            let adapter = registry.build(AdapterContext {
                device_id: device_id.clone(),
                address,
                publish: publish.clone(),
            })?;
            info!(device = %device_id, ops = adapter.operations().len(), "adapter ready");
            adapters.insert(device_id, Arc::new(adapter));
        }
        Ok(DabBridge { adapters })
    }
}

impl DabBridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    pub fn adapter(&self, device_id: &str) -> Option<&Arc<DeviceAdapter>> {
        self.adapters.get(device_id)
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Every topic the transport must subscribe to: one per adapter per
    /// advertised operation, plus the shared discovery broadcast.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .adapters
            .values()
            .flat_map(|adapter| adapter.topics())
            .collect();
        topics.push("dab/discovery".to_owned());
        topics
    }

    /// Cancel all telemetry streams; part of cooperative shutdown.
    pub fn shutdown(&self) {
        for adapter in self.adapters.values() {
            adapter.shutdown();
        }
    }

    /// Route one request and produce its replies ready for publishing.
    ///
    /// Device-targeted requests yield exactly one reply, success or
    /// error; the discovery broadcast yields one reply per adapter.
    pub async fn dispatch(&self, request: InboundRequest) -> Vec<OutboundMessage> {
        let response_topic = request
            .response_topic
            .clone()
            .unwrap_or_else(|| DEFAULT_RESPONSE_TOPIC.to_owned());
        let correlation = request.correlation.clone();
        debug!(topic = %request.topic, %response_topic, "dispatching request");

        match parse_topic(&request.topic) {
            Ok(Route::Device { device_id, method }) => {
                let body = finish(self.call_device(device_id, method, &request.payload).await);
                vec![OutboundMessage::reply(response_topic, &body, correlation)]
            }
            Ok(Route::Broadcast { method }) => {
                self.dispatch_broadcast(method, &request.payload, &response_topic, &correlation)
                    .await
            }
            Err(err) => {
                warn!(topic = %request.topic, %err, "refusing request");
                vec![OutboundMessage::reply(
                    response_topic,
                    &error_body(&err),
                    correlation,
                )]
            }
        }
    }

    async fn call_device(
        &self,
        device_id: &str,
        method: &str,
        payload: &[u8],
    ) -> DabResult<Json> {
        let adapter = self
            .adapters
            .get(device_id)
            .ok_or_else(DabError::unknown_device)?;
        let payload = parse_payload(payload)?;
        let method = DabMethod::from_path(method).ok_or_else(DabError::unsupported)?;
        adapter.call(method, &payload).await
    }

    /// The deviceId-less topic form exists only for discovery; every
    /// adapter answers it individually.
    async fn dispatch_broadcast(
        &self,
        method: &str,
        payload: &[u8],
        response_topic: &str,
        correlation: &Option<Vec<u8>>,
    ) -> Vec<OutboundMessage> {
        if DabMethod::from_path(method) != Some(DabMethod::Discovery) {
            return vec![OutboundMessage::reply(
                response_topic,
                &error_body(&DabError::topic_malformed()),
                correlation.clone(),
            )];
        }
        let payload = match parse_payload(payload) {
            Ok(payload) => payload,
            Err(err) => {
                return vec![OutboundMessage::reply(
                    response_topic,
                    &error_body(&err),
                    correlation.clone(),
                )];
            }
        };

        let mut replies = Vec::with_capacity(self.adapters.len());
        for adapter in self.adapters.values() {
            let body = finish(adapter.call(DabMethod::Discovery, &payload).await);
            replies.push(OutboundMessage::reply(
                response_topic,
                &body,
                correlation.clone(),
            ));
        }
        replies
    }
}

/// Empty payloads are an empty object; everything else must parse.
fn parse_payload(bytes: &[u8]) -> DabResult<Json> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Json::object());
    }
    let text = std::str::from_utf8(bytes).map_err(|_| DabError::malformed_request())?;
    Ok(dab_json::parse(text)?)
}

/// Collapse a handler result into the reply body.
fn finish(result: DabResult<Json>) -> Json {
    match result {
        Ok(body) => ensure_status(body),
        Err(err) => error_body(&err),
    }
}

/// Add `status: 200` when the handler did not set one.
fn ensure_status(body: Json) -> Json {
    let mut body = if body.is_null() { Json::object() } else { body };
    if body.is_object() && !body.has("status") {
        body.set("status", 200);
    }
    body
}

fn error_body(err: &DabError) -> Json {
    Json::object()
        .with("status", err.code)
        .with("error", err.text.as_str())
}
