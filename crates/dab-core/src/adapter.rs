//! Device adapter base: handler registration and the capability model.
//!
//! A concrete adapter is not a trait implementation but a value: its
//! factory builds a [`DeviceAdapter`] through [`AdapterBuilder`],
//! registering one async closure per DAB method it supports plus optional
//! telemetry sources. The registered set *is* the adapter's op-set: it
//! is computed once at build time, drives `operations/list` and the MQTT
//! subscription list, and everything outside it is refused with 501
//! before any adapter code runs.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dab_json::Json;
use tracing::warn;

use crate::error::{DabError, DabResult};
use crate::method::DabMethod;
use crate::outbound::PublishHandle;
use crate::params::Params;
use crate::telemetry::{TelemetryKey, TelemetryScheduler};

/// DAB protocol version implemented by the framework.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Boxed future returned by handlers and telemetry sources.
pub type HandlerFuture = Pin<Box<dyn Future<Output = DabResult<Json>> + Send>>;
pub type TelemetryFuture = HandlerFuture;

type Handler = Arc<dyn Fn(Params) -> HandlerFuture + Send + Sync>;
type DeviceTelemetrySource = Arc<dyn Fn() -> TelemetryFuture + Send + Sync>;
type AppTelemetrySource = Arc<dyn Fn(String) -> TelemetryFuture + Send + Sync>;

/// Constructor-time registration of an adapter's handlers.
pub struct AdapterBuilder {
    device_id: String,
    ip: String,
    publish: PublishHandle,
    handlers: HashMap<DabMethod, Handler>,
    device_telemetry: Option<DeviceTelemetrySource>,
    app_telemetry: Option<AppTelemetrySource>,
}

impl AdapterBuilder {
    pub fn new(device_id: impl Into<String>, publish: PublishHandle) -> Self {
        AdapterBuilder {
            device_id: device_id.into(),
            ip: String::new(),
            publish,
            handlers: HashMap::new(),
            device_telemetry: None,
            app_telemetry: None,
        }
    }

    /// Address reported in the discovery reply.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// Register the handler for `method`. Built-ins and telemetry
    /// lifecycle methods are framework-owned and cannot be overridden;
    /// registering one is ignored.
    pub fn handle<F, Fut>(mut self, method: DabMethod, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DabResult<Json>> + Send + 'static,
    {
        if method.is_builtin() || method.is_telemetry_control() {
            warn!(method = method.path(), "ignoring handler for framework-owned method");
            return self;
        }
        self.handlers
            .insert(method, Arc::new(move |params| Box::pin(handler(params))));
        self
    }

    /// Register the device telemetry source. Its presence puts
    /// `device-telemetry/start|stop` into the op-set.
    pub fn device_telemetry<F, Fut>(mut self, source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DabResult<Json>> + Send + 'static,
    {
        self.device_telemetry = Some(Arc::new(move || Box::pin(source())));
        self
    }

    /// Register the per-application telemetry source. Its presence puts
    /// `app-telemetry/start|stop` into the op-set.
    pub fn app_telemetry<F, Fut>(mut self, source: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DabResult<Json>> + Send + 'static,
    {
        self.app_telemetry = Some(Arc::new(move |app_id| Box::pin(source(app_id))));
        self
    }

    /// Freeze the registration into an adapter. The op-set is computed
    /// here, once.
    pub fn build(self) -> DeviceAdapter {
        let mut op_set: HashSet<DabMethod> = self.handlers.keys().copied().collect();
        op_set.extend([
            DabMethod::OperationsList,
            DabMethod::Version,
            DabMethod::Discovery,
        ]);
        if self.device_telemetry.is_some() {
            op_set.extend([
                DabMethod::DeviceTelemetryStart,
                DabMethod::DeviceTelemetryStop,
            ]);
        }
        if self.app_telemetry.is_some() {
            op_set.extend([DabMethod::AppTelemetryStart, DabMethod::AppTelemetryStop]);
        }

        // advertised operations: everything dispatchable except the
        // discovery broadcast, in lexicographic path order
        let mut operations: Vec<&'static str> = op_set
            .iter()
            .filter(|m| **m != DabMethod::Discovery)
            .map(|m| m.path())
            .collect();
        operations.sort_unstable();

        let telemetry = TelemetryScheduler::new(self.device_id.clone(), self.publish);
        DeviceAdapter {
            device_id: self.device_id,
            ip: self.ip,
            handlers: self.handlers,
            device_telemetry: self.device_telemetry,
            app_telemetry: self.app_telemetry,
            op_set,
            operations,
            telemetry,
        }
    }
}

/// One device on the bus: an immutable handler table plus that device's
/// telemetry scheduler.
pub struct DeviceAdapter {
    device_id: String,
    ip: String,
    handlers: HashMap<DabMethod, Handler>,
    device_telemetry: Option<DeviceTelemetrySource>,
    app_telemetry: Option<AppTelemetrySource>,
    op_set: HashSet<DabMethod>,
    operations: Vec<&'static str>,
    telemetry: TelemetryScheduler,
}

impl std::fmt::Debug for DeviceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("device_id", &self.device_id)
            .field("ip", &self.ip)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl DeviceAdapter {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Cached op-set membership.
    pub fn supports(&self, method: DabMethod) -> bool {
        self.op_set.contains(&method)
    }

    /// Advertised operation paths, as returned by `operations/list`.
    pub fn operations(&self) -> &[&'static str] {
        &self.operations
    }

    /// Request topics this adapter subscribes to (one per op-set entry;
    /// the shared `dab/discovery` broadcast is the bridge's concern).
    pub fn topics(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|path| format!("dab/{}/{}", self.device_id, path))
            .collect()
    }

    pub fn telemetry(&self) -> &TelemetryScheduler {
        &self.telemetry
    }

    /// Cancel telemetry streams; called when the bridge shuts down.
    pub fn shutdown(&self) {
        self.telemetry.shutdown();
    }

    /// Execute `method` against this adapter: op-set check, schema
    /// extraction, then the framework built-in or the registered handler.
    pub async fn call(&self, method: DabMethod, payload: &Json) -> DabResult<Json> {
        if !self.supports(method) {
            return Err(DabError::unsupported());
        }
        let params = Params::extract(method.params(), payload)?;
        match method {
            DabMethod::OperationsList => Ok(self.operations_reply()),
            DabMethod::Version => Ok(version_reply()),
            DabMethod::Discovery => Ok(self.discovery_reply()),
            DabMethod::DeviceTelemetryStart => self.device_telemetry_start(&params),
            DabMethod::DeviceTelemetryStop => {
                self.telemetry.stop(&TelemetryKey::Device);
                Ok(Json::object())
            }
            DabMethod::AppTelemetryStart => self.app_telemetry_start(&params),
            DabMethod::AppTelemetryStop => {
                let app_id = params.str("appId")?;
                self.telemetry.stop(&TelemetryKey::App(app_id.to_owned()));
                Ok(Json::object())
            }
            _ => match self.handlers.get(&method) {
                Some(handler) => handler(params).await,
                // op-set membership guarantees a handler; kept total for safety
                None => Err(DabError::unsupported()),
            },
        }
    }

    fn operations_reply(&self) -> Json {
        let mut reply = Json::object();
        for path in &self.operations {
            reply["operations"].push(*path);
        }
        reply
    }

    fn discovery_reply(&self) -> Json {
        Json::object()
            .with("ip", self.ip.as_str())
            .with("deviceId", self.device_id.as_str())
    }

    fn device_telemetry_start(&self, params: &Params) -> DabResult<Json> {
        let duration = positive_duration(params)?;
        let source = self
            .device_telemetry
            .clone()
            .ok_or_else(DabError::unsupported)?;
        self.telemetry
            .start(TelemetryKey::Device, duration, move || source());
        Ok(Json::object().with("duration", duration.as_millis() as i64))
    }

    fn app_telemetry_start(&self, params: &Params) -> DabResult<Json> {
        let duration = positive_duration(params)?;
        let app_id = params.str("appId")?.to_owned();
        let source = self
            .app_telemetry
            .clone()
            .ok_or_else(DabError::unsupported)?;
        let key = TelemetryKey::App(app_id.clone());
        self.telemetry
            .start(key, duration, move || source(app_id.clone()));
        Ok(Json::object().with("duration", duration.as_millis() as i64))
    }
}

fn positive_duration(params: &Params) -> DabResult<Duration> {
    let millis = params.int("duration")?;
    if millis <= 0 {
        return Err(DabError::bad_parameter("duration"));
    }
    Ok(Duration::from_millis(millis as u64))
}

fn version_reply() -> Json {
    let mut reply = Json::object();
    reply["versions"].push(PROTOCOL_VERSION);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::publish_channel;

    fn adapter() -> DeviceAdapter {
        let (publish, _rx) = publish_channel(8);
        AdapterBuilder::new("dev1", publish)
            .with_ip("192.168.1.20")
            .handle(DabMethod::DeviceInfo, |_params| async {
                Ok(Json::object().with("status", 200).with("version", "2.0"))
            })
            .device_telemetry(|| async { Ok(Json::object().with("cpu", 12)) })
            .build()
    }

    #[tokio::test]
    async fn op_set_reflects_registration() {
        let adapter = adapter();
        assert!(adapter.supports(DabMethod::DeviceInfo));
        assert!(adapter.supports(DabMethod::DeviceTelemetryStart));
        assert!(adapter.supports(DabMethod::OperationsList));
        assert!(!adapter.supports(DabMethod::AppLaunch));
        assert!(!adapter.supports(DabMethod::AppTelemetryStart));
    }

    #[tokio::test]
    async fn operations_list_is_sorted_and_excludes_discovery() {
        let adapter = adapter();
        let ops = adapter.operations();
        assert!(ops.contains(&"device/info"));
        assert!(ops.contains(&"operations/list"));
        assert!(ops.contains(&"version"));
        assert!(ops.contains(&"device-telemetry/start"));
        assert!(!ops.contains(&"discovery"));
        let mut sorted = ops.to_vec();
        sorted.sort_unstable();
        assert_eq!(ops, sorted.as_slice());
    }

    #[tokio::test]
    async fn unsupported_method_never_reaches_handlers() {
        let adapter = adapter();
        let err = adapter
            .call(DabMethod::AppLaunch, &Json::object().with("appId", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, DabError::unsupported());
    }

    #[tokio::test]
    async fn version_and_discovery_builtins() {
        let adapter = adapter();
        let version = adapter.call(DabMethod::Version, &Json::object()).await.unwrap();
        assert_eq!(version["versions"][0].as_str().unwrap(), "2.0");

        let discovery = adapter
            .call(DabMethod::Discovery, &Json::object())
            .await
            .unwrap();
        assert_eq!(discovery["deviceId"].as_str().unwrap(), "dev1");
        assert_eq!(discovery["ip"].as_str().unwrap(), "192.168.1.20");
    }

    #[tokio::test]
    async fn telemetry_start_validates_duration() {
        let adapter = adapter();
        let err = adapter
            .call(
                DabMethod::DeviceTelemetryStart,
                &Json::object().with("duration", -5),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, 400);

        let ok = adapter
            .call(
                DabMethod::DeviceTelemetryStart,
                &Json::object().with("duration", 100),
            )
            .await
            .unwrap();
        assert_eq!(ok["duration"].as_i64().unwrap(), 100);
        adapter.shutdown();
    }

    #[tokio::test]
    async fn framework_owned_methods_cannot_be_overridden() {
        let (publish, _rx) = publish_channel(8);
        let adapter = AdapterBuilder::new("dev1", publish)
            .handle(DabMethod::Version, |_| async {
                Ok(Json::object().with("versions", vec!["9.9"]))
            })
            .build();
        let version = adapter.call(DabMethod::Version, &Json::object()).await.unwrap();
        assert_eq!(version["versions"][0].as_str().unwrap(), "2.0");
    }
}
