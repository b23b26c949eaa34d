//! The broker-facing transport.
//!
//! Two long-lived tasks do all the MQTT work:
//!
//! - the **receive task** polls the event loop and spawns one dispatch
//!   task per incoming request, so a slow device never blocks the link;
//! - the **publisher task** is the only code that calls publish on the
//!   client, draining the shared outbound channel that the bridge and
//!   every telemetry stream feed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{Packet, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use dab_core::{
    DabBridge, InboundRequest, OutboundMessage, PublishHandle, Transport, TransportError,
};

use crate::config::MqttConfig;

/// Consecutive event-loop failures tolerated before the link is
/// declared lost.
const MAX_POLL_ERRORS: u32 = 5;

/// MQTT v5 transport bound to one bridge.
pub struct MqttTransport {
    bridge: Arc<DabBridge>,
    client: AsyncClient,
    publish: PublishHandle,
    eventloop: Mutex<Option<EventLoop>>,
    outbound: Mutex<Option<mpsc::Receiver<OutboundMessage>>>,
    stopped: Arc<watch::Sender<bool>>,
}

impl MqttTransport {
    /// Wire a transport to `bridge`. `publish` / `outbound` are the two
    /// ends of the channel from [`dab_core::publish_channel`]; the same
    /// `publish` handle must have been given to the bridge builder so
    /// telemetry notifications share the publish path.
    pub fn new(
        config: &MqttConfig,
        bridge: Arc<DabBridge>,
        publish: PublishHandle,
        outbound: mpsc::Receiver<OutboundMessage>,
    ) -> Self {
        let mut options =
            MqttOptions::new(config.effective_client_id(), &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_start(config.clean_start);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 64);
        let (stopped, _) = watch::channel(false);
        let stopped = Arc::new(stopped);

        MqttTransport {
            bridge,
            client,
            publish,
            eventloop: Mutex::new(Some(eventloop)),
            outbound: Mutex::new(Some(outbound)),
            stopped,
        }
    }

    async fn subscribe_all(client: &AsyncClient, topics: &[String]) {
        for topic in topics {
            if let Err(err) = client.subscribe(topic, QoS::AtLeastOnce).await {
                warn!(%topic, %err, "subscribe failed");
            }
        }
    }

    /// Receive loop: incoming publishes become dispatch tasks; the
    /// replies flow back through the outbound channel.
    async fn run_receive(
        bridge: Arc<DabBridge>,
        client: AsyncClient,
        publish: PublishHandle,
        mut eventloop: EventLoop,
        topics: Vec<String>,
        stopped: Arc<watch::Sender<bool>>,
    ) {
        let mut stop_rx = stopped.subscribe();
        let mut errors = 0u32;
        loop {
            let event = tokio::select! {
                _ = stop_rx.changed() => break,
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::Publish(frame))) => {
                    errors = 0;
                    let topic = String::from_utf8_lossy(&frame.topic).into_owned();
                    let mut request = InboundRequest::new(topic, frame.payload.to_vec());
                    if let Some(props) = frame.properties {
                        request.response_topic = props.response_topic;
                        request.correlation = props.correlation_data.map(|data| data.to_vec());
                    }
                    debug!(topic = %request.topic, "request received");

                    let bridge = bridge.clone();
                    let publish = publish.clone();
                    tokio::spawn(async move {
                        for reply in bridge.dispatch(request).await {
                            publish.send(reply).await;
                        }
                    });
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    errors = 0;
                    info!("broker connection acknowledged, subscribing");
                    Self::subscribe_all(&client, &topics).await;
                }
                Ok(_) => {}
                Err(err) => {
                    errors += 1;
                    if errors >= MAX_POLL_ERRORS {
                        error!(%err, "connection lost, stopping transport");
                        break;
                    }
                    warn!(%err, attempt = errors, "event loop error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        // link is gone either way: cancel telemetry and wake waiters
        bridge.shutdown();
        let _ = stopped.send(true);
    }

    /// Publisher loop: the single owner of the publish side of the
    /// client.
    async fn run_publisher(
        client: AsyncClient,
        mut outbound: mpsc::Receiver<OutboundMessage>,
        stopped: Arc<watch::Sender<bool>>,
    ) {
        let mut stop_rx = stopped.subscribe();
        loop {
            let message = tokio::select! {
                _ = stop_rx.changed() => break,
                message = outbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let mut properties = PublishProperties::default();
            if let Some(correlation) = message.correlation {
                properties.correlation_data = Some(Bytes::from(correlation));
            }
            if let Err(err) = client
                .publish_with_properties(
                    message.topic,
                    QoS::AtMostOnce,
                    false,
                    message.payload,
                    properties,
                )
                .await
            {
                // the requester retries on its own correlation timeout
                warn!(%err, "publish failed, dropping message");
            }
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let eventloop = self
            .eventloop
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyConnected)?;
        let outbound = self
            .outbound
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyConnected)?;

        let topics = self.bridge.topics();
        info!(topics = topics.len(), "connecting to broker");

        // tasks first: subscribe requests are only drained once the
        // event loop is being polled
        tokio::spawn(Self::run_receive(
            self.bridge.clone(),
            self.client.clone(),
            self.publish.clone(),
            eventloop,
            topics.clone(),
            self.stopped.clone(),
        ));
        tokio::spawn(Self::run_publisher(
            self.client.clone(),
            outbound,
            self.stopped.clone(),
        ));
        Self::subscribe_all(&self.client, &topics).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.bridge.shutdown();
        let _ = self.stopped.send(true);
        self.client
            .disconnect()
            .await
            .map_err(|err| TransportError::ConnectionLost(err.to_string()))?;
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
