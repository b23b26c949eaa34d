//! RDK device adapter.
//!
//! Drives an RDK set-top device through the Thunder JSON-RPC gateway on
//! port 9998. Applications are Thunder plugins addressed by callsign:
//! launching activates the plugin through RDKShell, exiting suspends or
//! destroys it, and key input is injected as RDKShell key events.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dab_core::{
    AdapterBuilder, AdapterContext, AdapterFactory, DabError, DabMethod, DabResult, DeviceAdapter,
};
use dab_json::Json;
use tracing::debug;

const THUNDER_PORT: u16 = 9998;

const SYSTEM: &str = "org.rdk.System";
const RDKSHELL: &str = "org.rdk.RDKShell";
const DEVICE_INFO: &str = "DeviceInfo";

/// DAB key names mapped to RDKShell key codes.
const RDK_KEYMAP: &[(&str, u16)] = &[
    ("KEY_POWER", 116),
    ("KEY_HOME", 36),
    ("KEY_VOLUME_UP", 175),
    ("KEY_VOLUME_DOWN", 174),
    ("KEY_MUTE", 173),
    ("KEY_EXIT", 27),
    ("KEY_UP", 38),
    ("KEY_PAGE_UP", 33),
    ("KEY_PAGE_DOWN", 34),
    ("KEY_RIGHT", 39),
    ("KEY_DOWN", 40),
    ("KEY_LEFT", 37),
    ("KEY_ENTER", 13),
    ("KEY_BACK", 8),
    ("KEY_PLAY", 179),
    ("KEY_PLAY_PAUSE", 179),
    ("KEY_PAUSE", 179),
    ("KEY_STOP", 178),
    ("KEY_REWIND", 227),
    ("KEY_FAST_FORWARD", 228),
    ("KEY_SKIP_REWIND", 177),
    ("KEY_SKIP_FAST_FORWARD", 176),
    ("KEY_0", 48),
    ("KEY_1", 49),
    ("KEY_2", 50),
    ("KEY_3", 51),
    ("KEY_4", 52),
    ("KEY_5", 53),
    ("KEY_6", 54),
    ("KEY_7", 55),
    ("KEY_8", 56),
    ("KEY_9", 57),
];

fn key_code(name: &str) -> Option<u16> {
    RDK_KEYMAP
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, code)| *code)
}

/// JSON-RPC client for one Thunder gateway.
pub struct RdkClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RdkClient {
    pub fn new(address: &str) -> Self {
        RdkClient {
            http: reqwest::Client::new(),
            endpoint: format!("http://{address}:{THUNDER_PORT}/jsonrpc"),
            next_id: AtomicU64::new(0),
        }
    }

    /// One JSON-RPC round trip. A reply with an `error` member, or a
    /// result carrying `success: false`, is a device failure.
    pub async fn request(&self, method: &str, params: Option<Json>) -> DabResult<Json> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut body = Json::object()
            .with("jsonrpc", "2.0")
            .with("id", id as i64)
            .with("method", method);
        if let Some(params) = params {
            body.set("params", params);
        }
        debug!(%method, "rdk request");

        let text = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .body(body.serialize())
            .send()
            .await
            .map_err(|err| DabError::device(500, format!("RDK request failed: {err}")))?
            .text()
            .await
            .map_err(|err| DabError::device(500, format!("RDK request failed: {err}")))?;

        let reply = dab_json::parse(&text).map_err(|_| {
            DabError::device(500, format!("RDK method {method} returned malformed JSON"))
        })?;
        if reply.has("error") {
            return Err(DabError::device(500, format!("RDK method {method} failed")));
        }
        let result = &reply["result"];
        if result.has("success") && !result["success"].as_bool().unwrap_or(false) {
            return Err(DabError::device(
                500,
                format!("RDK method {method} finished without success"),
            ));
        }
        Ok(result.clone())
    }

    async fn shell(&self, method: &str, params: Option<Json>) -> DabResult<Json> {
        self.request(&format!("{RDKSHELL}.{method}"), params).await
    }

    pub async fn app_list(&self) -> DabResult<Json> {
        let types = self.shell("getAvailableTypes", None).await?;
        let mut reply = Json::object();
        reply["applications"] = Json::array();
        if let Ok(entries) = types["types"].as_array() {
            for entry in entries {
                reply["applications"].push(Json::object().with("appId", entry.clone()));
            }
        }
        Ok(reply)
    }

    /// DAB state of one application: FOREGROUND, BACKGROUND, or STOPPED.
    pub async fn app_state(&self, app_id: &str) -> DabResult<&'static str> {
        let state = self.shell("getState", None).await?;
        Ok(app_state_from_reply(&state, app_id))
    }

    pub async fn app_launch(&self, app_id: &str) -> DabResult<Json> {
        match self.app_state(app_id).await? {
            "STOPPED" => {
                self.shell(
                    "launch",
                    Some(Json::object().with("callsign", app_id)),
                )
                .await?;
            }
            // already running: bring it to the foreground
            _ => {
                self.shell(
                    "launch",
                    Some(
                        Json::object()
                            .with("client", app_id)
                            .with("callsign", app_id),
                    ),
                )
                .await?;
            }
        }
        Ok(Json::object())
    }

    pub async fn app_exit(&self, app_id: &str, force: bool) -> DabResult<Json> {
        let state = self.app_state(app_id).await?;
        let state = if state != "STOPPED" {
            if force {
                self.shell("destroy", Some(Json::object().with("callsign", app_id)))
                    .await?;
                "STOPPED"
            } else {
                self.shell("suspend", Some(Json::object().with("callsign", app_id)))
                    .await?;
                "BACKGROUND"
            }
        } else {
            state
        };
        Ok(Json::object().with("state", state))
    }

    pub async fn inject_key(&self, code: u16) -> DabResult<Json> {
        self.shell(
            "injectKey",
            Some(Json::object().with("keyCode", code as i64)),
        )
        .await
    }

    pub async fn system_restart(&self) -> DabResult<Json> {
        self.request(
            &format!("{SYSTEM}.reboot"),
            Some(Json::object().with("rebootReason", "DAB_REQUEST")),
        )
        .await?;
        Ok(Json::object())
    }

    pub async fn device_info(&self) -> DabResult<Json> {
        let info = self.request(&format!("{SYSTEM}.getDeviceInfo"), None).await?;
        Ok(device_info_from_reply(&info))
    }

    /// Raw system metrics, published by the device telemetry stream.
    pub async fn device_metrics(&self) -> DabResult<Json> {
        let info = self.request(&format!("{DEVICE_INFO}.systeminfo"), None).await?;
        let mut metrics = Json::object();
        for field in ["cpuload", "freeram", "totalram", "uptime"] {
            if info.has(field) {
                metrics.set(field, info[field].clone());
            }
        }
        Ok(metrics)
    }
}

fn app_state_from_reply(reply: &Json, app_id: &str) -> &'static str {
    if let Ok(apps) = reply["state"].as_array() {
        for app in apps {
            if app["callsign"].as_str() == Ok(app_id) {
                return match app["state"].as_str() {
                    Ok("suspended") => "BACKGROUND",
                    _ => "FOREGROUND",
                };
            }
        }
    }
    "STOPPED"
}

fn device_info_from_reply(info: &Json) -> Json {
    let mut reply = Json::object().with("status", 200);
    for (dab_name, rdk_name) in [
        ("manufacturer", "make"),
        ("model", "model_number"),
        ("firmwareVersion", "imageRevision"),
        ("firmwareBuild", "imageVersion"),
        ("serialNumber", "serialNumber"),
    ] {
        if info.has(rdk_name) {
            reply.set(dab_name, info[rdk_name].clone());
        }
    }
    reply
}

pub struct RdkAdapter;

impl RdkAdapter {
    pub fn factory() -> AdapterFactory {
        AdapterFactory {
            name: "rdk",
            // RDK devices are addressed by IP; the first JSON-RPC round
            // trip reports an unreachable gateway
            is_compatible: |address| address.parse::<IpAddr>().is_ok(),
            build: Box::new(build),
        }
    }
}

fn build(ctx: AdapterContext) -> DabResult<DeviceAdapter> {
    let rdk = Arc::new(RdkClient::new(&ctx.address));

    let list = rdk.clone();
    let get_state = rdk.clone();
    let launch = rdk.clone();
    let exit = rdk.clone();
    let key_press = rdk.clone();
    let restart = rdk.clone();
    let info = rdk.clone();
    let health = rdk.clone();
    let metrics = rdk.clone();

    Ok(AdapterBuilder::new(ctx.device_id, ctx.publish)
        .with_ip(ctx.address)
        .handle(DabMethod::AppList, move |_params| {
            let rdk = list.clone();
            async move { rdk.app_list().await }
        })
        .handle(DabMethod::AppGetState, move |params| {
            let rdk = get_state.clone();
            async move {
                let state = rdk.app_state(params.str("appId")?).await?;
                Ok(Json::object().with("state", state))
            }
        })
        .handle(DabMethod::AppLaunch, move |params| {
            let rdk = launch.clone();
            async move { rdk.app_launch(params.str("appId")?).await }
        })
        .handle(DabMethod::AppExit, move |params| {
            let rdk = exit.clone();
            async move {
                rdk.app_exit(params.str("appId")?, params.bool_or("force", false))
                    .await
            }
        })
        .handle(DabMethod::InputKeyList, |_params| async {
            let mut reply = Json::object();
            reply["keyCodes"] = Json::array();
            for (name, _) in RDK_KEYMAP {
                reply["keyCodes"].push(*name);
            }
            Ok(reply)
        })
        .handle(DabMethod::InputKeyPress, move |params| {
            let rdk = key_press.clone();
            async move {
                let name = params.str("keyCode")?;
                let code = key_code(name)
                    .ok_or_else(|| DabError::bad_request(format!("unsupported keyCode \"{name}\"")))?;
                rdk.inject_key(code).await?;
                Ok(Json::object())
            }
        })
        .handle(DabMethod::SystemRestart, move |_params| {
            let rdk = restart.clone();
            async move { rdk.system_restart().await }
        })
        .handle(DabMethod::DeviceInfo, move |_params| {
            let rdk = info.clone();
            async move { rdk.device_info().await }
        })
        .handle(DabMethod::HealthCheckGet, move |_params| {
            let rdk = health.clone();
            async move {
                rdk.device_metrics().await?;
                Ok(Json::object().with("healthy", true))
            }
        })
        .device_telemetry(move || {
            let rdk = metrics.clone();
            async move { rdk.device_metrics().await }
        })
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keymap_lookup() {
        assert_eq!(key_code("KEY_ENTER"), Some(13));
        assert_eq!(key_code("KEY_9"), Some(57));
        assert_eq!(key_code("KEY_UNKNOWN"), None);
    }

    #[test]
    fn compatible_only_with_ip_addresses() {
        let factory = RdkAdapter::factory();
        assert!((factory.is_compatible)("192.168.1.20"));
        assert!((factory.is_compatible)("::1"));
        assert!(!(factory.is_compatible)("panel.local"));
    }

    #[test]
    fn app_state_mapping() {
        let reply = dab_json::parse(
            r#"{"state": [
                {"callsign": "YouTube", "state": "suspended"},
                {"callsign": "Netflix", "state": "resumed"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(app_state_from_reply(&reply, "YouTube"), "BACKGROUND");
        assert_eq!(app_state_from_reply(&reply, "Netflix"), "FOREGROUND");
        assert_eq!(app_state_from_reply(&reply, "Prime"), "STOPPED");
    }

    #[test]
    fn device_info_mapping() {
        let info = dab_json::parse(
            r#"{"make": "Acme", "model_number": "STB-9", "imageRevision": "4.2.1", "extra": 1}"#,
        )
        .unwrap();
        let reply = device_info_from_reply(&info);
        assert_eq!(reply["status"].as_i64().unwrap(), 200);
        assert_eq!(reply["manufacturer"].as_str().unwrap(), "Acme");
        assert_eq!(reply["model"].as_str().unwrap(), "STB-9");
        assert!(!reply.has("extra"));
    }

    #[tokio::test]
    async fn rdk_adapter_op_set() {
        let (publish, _rx) = dab_core::publish_channel(8);
        let adapter = (RdkAdapter::factory().build)(AdapterContext {
            device_id: "stb1".into(),
            address: "192.168.1.20".into(),
            publish,
        })
        .unwrap();

        assert!(adapter.supports(DabMethod::AppLaunch));
        assert!(adapter.supports(DabMethod::InputKeyPress));
        assert!(adapter.supports(DabMethod::DeviceTelemetryStart));
        assert!(!adapter.supports(DabMethod::AppTelemetryStart));
        assert!(!adapter.supports(DabMethod::VoiceList));
    }

    #[tokio::test]
    async fn unreachable_gateway_maps_to_device_error() {
        // no Thunder gateway on this port; request errors, never panics
        let rdk = RdkClient::new("127.0.0.1");
        let err = rdk.device_info().await.unwrap_err();
        assert_eq!(err.code, 500);
    }
}
