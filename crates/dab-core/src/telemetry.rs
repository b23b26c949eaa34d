//! Per-device telemetry stream scheduling.
//!
//! Each active stream is one tokio task ticking at its own interval and
//! publishing the handler's output as an unsolicited notification. Ticks
//! within a stream are serialized by the task; streams are independent of
//! each other and of request dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use dab_json::Json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::adapter::TelemetryFuture;
use crate::outbound::PublishHandle;

/// A stream is torn down after this many consecutive handler failures.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Identity of a telemetry stream within one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TelemetryKey {
    Device,
    App(String),
}

struct Stream {
    interval: Duration,
    /// Distinguishes a stream from the one that replaced it, so a
    /// failing stream only ever deregisters itself.
    generation: u64,
    task: JoinHandle<()>,
}

type StreamTable = Mutex<HashMap<TelemetryKey, Stream>>;

/// Owns the telemetry streams of one device adapter.
///
/// The table lock is held only for table edits, never across a handler
/// invocation; ticking happens inside the per-stream tasks.
pub struct TelemetryScheduler {
    device_id: String,
    publish: PublishHandle,
    streams: Arc<StreamTable>,
    next_generation: AtomicU64,
}

impl TelemetryScheduler {
    pub fn new(device_id: impl Into<String>, publish: PublishHandle) -> Self {
        TelemetryScheduler {
            device_id: device_id.into(),
            publish,
            streams: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<TelemetryKey, Stream>> {
        // the lock is never held across await points, so poisoning can
        // only come from a panicking handler in another thread; the map
        // itself stays consistent
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (or replace) the stream for `key`. The first tick fires
    /// immediately, the next ones every `interval`.
    pub fn start<F>(&self, key: TelemetryKey, interval: Duration, source: F)
    where
        F: Fn() -> TelemetryFuture + Send + Sync + 'static,
    {
        let topic = self.metrics_topic(&key);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // abort a replaced stream before its successor starts ticking,
        // so ticks for one key never interleave
        let mut table = self.table();
        if let Some(previous) = table.remove(&key) {
            debug!(device = %self.device_id, ?key, "replacing telemetry stream");
            previous.task.abort();
        }
        let task = tokio::spawn(run_stream(
            key.clone(),
            generation,
            topic,
            interval,
            source,
            self.publish.clone(),
            Arc::downgrade(&self.streams),
        ));
        table.insert(
            key,
            Stream {
                interval,
                generation,
                task,
            },
        );
    }

    /// Deregister the stream for `key`. Stopping an inactive stream is a
    /// success no-op; no tick is issued after this returns.
    pub fn stop(&self, key: &TelemetryKey) {
        if let Some(stream) = self.table().remove(key) {
            stream.task.abort();
            debug!(device = %self.device_id, ?key, "telemetry stream stopped");
        }
    }

    /// Cancel every stream; called on adapter shutdown.
    pub fn shutdown(&self) {
        for (_, stream) in self.table().drain() {
            stream.task.abort();
        }
    }

    /// Interval of the active stream for `key`, if any.
    pub fn interval(&self, key: &TelemetryKey) -> Option<Duration> {
        self.table().get(key).map(|s| s.interval)
    }

    pub fn active_streams(&self) -> usize {
        self.table().len()
    }

    /// Topic the stream for `key` publishes on.
    pub fn metrics_topic(&self, key: &TelemetryKey) -> String {
        match key {
            TelemetryKey::Device => {
                format!("dab/{}/device-telemetry/metrics", self.device_id)
            }
            TelemetryKey::App(app_id) => {
                format!("dab/{}/app-telemetry/metrics/{}", self.device_id, app_id)
            }
        }
    }
}

impl Drop for TelemetryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_stream<F>(
    key: TelemetryKey,
    generation: u64,
    topic: String,
    interval: Duration,
    source: F,
    publish: PublishHandle,
    streams: Weak<StreamTable>,
) where
    F: Fn() -> TelemetryFuture + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        ticker.tick().await;
        match source().await {
            Ok(body) => {
                failures = 0;
                publish.notify(&topic, &body).await;
            }
            Err(err) => {
                failures += 1;
                warn!(%topic, %err, failures, "telemetry handler failed");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    let notice = Json::object()
                        .with("state", "stopped")
                        .with("reason", "handler-failed");
                    publish.notify(&topic, &notice).await;
                    break;
                }
            }
        }
    }

    // failure teardown: deregister ourselves so a later stop is a no-op,
    // but never a replacement that took over the key in the meantime
    if let Some(streams) = streams.upgrade() {
        if let Ok(mut table) = streams.lock() {
            if table.get(&key).is_some_and(|s| s.generation == generation) {
                table.remove(&key);
            }
        }
    }
}
