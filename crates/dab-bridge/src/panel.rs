//! Reference panel adapter.
//!
//! A stub TV panel that answers a handful of operations with fixed data.
//! It demonstrates the registration API and serves as the catch-all
//! implementation when no device-specific adapter claims the address, so
//! register its factory last.

use dab_core::{
    AdapterBuilder, AdapterContext, AdapterFactory, DabMethod, DabResult, DeviceAdapter,
};
use dab_json::Json;

pub struct PanelAdapter;

impl PanelAdapter {
    pub fn factory() -> AdapterFactory {
        AdapterFactory {
            name: "panel",
            is_compatible: |_address| true,
            build: Box::new(build),
        }
    }
}

fn build(ctx: AdapterContext) -> DabResult<DeviceAdapter> {
    Ok(AdapterBuilder::new(ctx.device_id, ctx.publish)
        .with_ip(ctx.address)
        .handle(DabMethod::DeviceInfo, |_params| async {
            Ok(Json::object().with("status", 200).with("version", "2.0"))
        })
        .handle(DabMethod::SystemSettingsGet, |_params| async {
            Ok(settings_snapshot())
        })
        .handle(DabMethod::AppList, |_params| async {
            let mut reply = Json::object();
            reply["applications"] = Json::array();
            for app in ["home", "settings", "media-player", "screensaver"] {
                reply["applications"].push(app);
            }
            Ok(reply)
        })
        .handle(DabMethod::AppLaunchWithContent, |params| async move {
            Ok(Json::object()
                .with("status", 200)
                .with("state", "launched")
                .with("appId", params.str("appId")?)
                .with("contentId", params.str("contentId")?))
        })
        .app_telemetry(|app_id| async move {
            Ok(Json::object()
                .with("appId", app_id)
                .with("state", "all systems nominal"))
        })
        .build())
}

fn settings_snapshot() -> Json {
    Json::object()
        .with("status", 200)
        .with("language", "en-US")
        .with(
            "outputResolution",
            Json::object()
                .with("width", 3840)
                .with("height", 2160)
                .with("frequency", 60),
        )
        .with("memc", false)
        .with("cec", true)
        .with("lowLatencyMode", true)
        .with("matchContentFrameRate", "EnabledSeamlessOnly")
        .with("hdrOutputMode", "AlwaysHdr")
        .with("pictureMode", "Other")
        .with("audioOutputMode", "Auto")
        .with("audioOutputSource", "HDMI")
        .with("videoInputSource", "Other")
        .with("audioVolume", 20)
        .with("mute", false)
        .with("textToSpeech", true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_core::{AdapterContext, DabMethod};

    fn panel() -> DeviceAdapter {
        let (publish, _rx) = dab_core::publish_channel(8);
        (PanelAdapter::factory().build)(AdapterContext {
            device_id: "panel1".into(),
            address: "10.0.0.9".into(),
            publish,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn implements_the_stub_surface() {
        let adapter = panel();
        assert!(adapter.supports(DabMethod::DeviceInfo));
        assert!(adapter.supports(DabMethod::SystemSettingsGet));
        assert!(adapter.supports(DabMethod::AppTelemetryStart));
        assert!(!adapter.supports(DabMethod::DeviceTelemetryStart));
        assert!(!adapter.supports(DabMethod::SystemRestart));
    }

    #[tokio::test]
    async fn settings_reply_shape() {
        let adapter = panel();
        let settings = adapter
            .call(DabMethod::SystemSettingsGet, &Json::object())
            .await
            .unwrap();
        assert_eq!(settings["language"].as_str().unwrap(), "en-US");
        assert_eq!(
            settings["outputResolution"]["width"].as_i64().unwrap(),
            3840
        );
        assert!(settings["cec"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn launch_with_content_echoes_ids() {
        let adapter = panel();
        let payload = Json::object()
            .with("appId", "media-player")
            .with("contentId", "movie-42");
        let reply = adapter
            .call(DabMethod::AppLaunchWithContent, &payload)
            .await
            .unwrap();
        assert_eq!(reply["state"].as_str().unwrap(), "launched");
        assert_eq!(reply["contentId"].as_str().unwrap(), "movie-42");
    }
}
