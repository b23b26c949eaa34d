//! Telemetry lifecycle through the DAB operations: start, periodic
//! metric publishes, stop idempotence, and stream independence.

use std::time::Duration;

use dab_core::{
    AdapterBuilder, AdapterContext, AdapterFactory, AdapterRegistry, DabBridge, InboundRequest,
    OutboundMessage,
};
use dab_json::Json;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn telemetry_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(AdapterFactory {
        name: "telemetry-panel",
        is_compatible: |_| true,
        build: Box::new(|ctx: AdapterContext| {
            Ok(AdapterBuilder::new(ctx.device_id, ctx.publish)
                .device_telemetry(|| async { Ok(Json::object().with("cpu", 17)) })
                .app_telemetry(|app_id| async move {
                    Ok(Json::object().with("appId", app_id).with("memory", 512))
                })
                .build())
        }),
    });
    registry
}

fn telemetry_bridge() -> (DabBridge, mpsc::Receiver<OutboundMessage>) {
    let (publish, rx) = dab_core::publish_channel(64);
    let bridge = DabBridge::builder()
        .device("dev1", "10.0.0.5")
        .build(&telemetry_registry(), publish)
        .unwrap();
    (bridge, rx)
}

fn body_of(msg: &OutboundMessage) -> Json {
    dab_json::parse(std::str::from_utf8(&msg.payload).unwrap()).unwrap()
}

async fn dispatch_ok(bridge: &DabBridge, topic: &str, payload: &str) -> Json {
    let replies = bridge
        .dispatch(InboundRequest::new(topic, payload.as_bytes().to_vec()))
        .await;
    assert_eq!(replies.len(), 1);
    let body = body_of(&replies[0]);
    assert_eq!(body["status"].as_i64().unwrap(), 200, "body: {body:?}");
    body
}

#[tokio::test]
async fn device_stream_publishes_until_stopped() {
    let (bridge, mut rx) = telemetry_bridge();

    let body = dispatch_ok(
        &bridge,
        "dab/dev1/device-telemetry/start",
        r#"{"duration": 100}"#,
    )
    .await;
    assert_eq!(body["duration"].as_i64().unwrap(), 100);

    // liveness: at least two publishes within a couple of intervals
    // (the first tick fires immediately)
    for _ in 0..2 {
        let msg = timeout(Duration::from_millis(1500), rx.recv())
            .await
            .expect("metrics publish overdue")
            .unwrap();
        assert_eq!(msg.topic, "dab/dev1/device-telemetry/metrics");
        assert!(msg.correlation.is_none());
        assert_eq!(body_of(&msg)["cpu"].as_i64().unwrap(), 17);
    }

    dispatch_ok(&bridge, "dab/dev1/device-telemetry/stop", "{}").await;

    // drain whatever was in flight before the stop took effect, then
    // expect silence
    tokio::time::sleep(Duration::from_millis(50)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "stream survived stop");
}

#[tokio::test]
async fn app_stream_uses_per_app_topic() {
    let (bridge, mut rx) = telemetry_bridge();

    dispatch_ok(
        &bridge,
        "dab/dev1/app-telemetry/start",
        r#"{"appId": "netflix", "duration": 50}"#,
    )
    .await;

    let msg = timeout(Duration::from_millis(1500), rx.recv())
        .await
        .expect("metrics publish overdue")
        .unwrap();
    assert_eq!(msg.topic, "dab/dev1/app-telemetry/metrics/netflix");
    let body = body_of(&msg);
    assert_eq!(body["appId"].as_str().unwrap(), "netflix");
    assert_eq!(body["memory"].as_i64().unwrap(), 512);

    dispatch_ok(
        &bridge,
        "dab/dev1/app-telemetry/stop",
        r#"{"appId": "netflix"}"#,
    )
    .await;
}

#[tokio::test]
async fn stop_without_a_stream_is_success() {
    let (bridge, _rx) = telemetry_bridge();
    dispatch_ok(&bridge, "dab/dev1/device-telemetry/stop", "{}").await;
    dispatch_ok(
        &bridge,
        "dab/dev1/app-telemetry/stop",
        r#"{"appId": "nobody"}"#,
    )
    .await;
}

#[tokio::test]
async fn restart_updates_the_interval() {
    let (bridge, _rx) = telemetry_bridge();

    dispatch_ok(
        &bridge,
        "dab/dev1/device-telemetry/start",
        r#"{"duration": 100}"#,
    )
    .await;
    dispatch_ok(
        &bridge,
        "dab/dev1/device-telemetry/start",
        r#"{"duration": 400}"#,
    )
    .await;

    let adapter = bridge.adapter("dev1").unwrap();
    assert_eq!(adapter.telemetry().active_streams(), 1);
    assert_eq!(
        adapter.telemetry().interval(&dab_core::TelemetryKey::Device),
        Some(Duration::from_millis(400))
    );
    bridge.shutdown();
}

#[tokio::test]
async fn invalid_duration_is_refused() {
    let (bridge, _rx) = telemetry_bridge();
    let replies = bridge
        .dispatch(InboundRequest::new(
            "dab/dev1/device-telemetry/start",
            br#"{"duration": 0}"#.to_vec(),
        ))
        .await;
    let body = body_of(&replies[0]);
    assert_eq!(body["status"].as_i64().unwrap(), 400);

    let replies = bridge
        .dispatch(InboundRequest::new(
            "dab/dev1/device-telemetry/start",
            br#"{"duration": "fast"}"#.to_vec(),
        ))
        .await;
    assert_eq!(body_of(&replies[0])["status"].as_i64().unwrap(), 400);
}

#[tokio::test]
async fn missing_app_id_is_refused() {
    let (bridge, _rx) = telemetry_bridge();
    let replies = bridge
        .dispatch(InboundRequest::new(
            "dab/dev1/app-telemetry/start",
            br#"{"duration": 100}"#.to_vec(),
        ))
        .await;
    let body = body_of(&replies[0]);
    assert_eq!(body["status"].as_i64().unwrap(), 400);
    assert_eq!(body["error"].as_str().unwrap(), "appId missing or of wrong type");
}

#[tokio::test]
async fn shutdown_cancels_all_streams() {
    let (bridge, mut rx) = telemetry_bridge();

    dispatch_ok(
        &bridge,
        "dab/dev1/device-telemetry/start",
        r#"{"duration": 50}"#,
    )
    .await;
    dispatch_ok(
        &bridge,
        "dab/dev1/app-telemetry/start",
        r#"{"appId": "youtube", "duration": 50}"#,
    )
    .await;

    let adapter = bridge.adapter("dev1").unwrap();
    assert_eq!(adapter.telemetry().active_streams(), 2);

    bridge.shutdown();
    assert_eq!(adapter.telemetry().active_streams(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "streams survived shutdown");
}
