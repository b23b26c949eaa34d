//! The closed set of DAB operations and their parameter schemas.

use crate::params::{ParamKind, ParamSpec};

/// Every operation a DAB adapter can be asked to perform.
///
/// The set is closed by protocol version 2.0; adapters choose which
/// subset to implement, and the dispatcher refuses everything else with
/// status 501. `OperationsList`, `Version`, and `Discovery` are served
/// by the framework itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DabMethod {
    OperationsList,
    AppList,
    AppLaunch,
    AppLaunchWithContent,
    AppGetState,
    AppExit,
    DeviceInfo,
    SystemRestart,
    SystemSettingsList,
    SystemSettingsGet,
    SystemSettingsSet,
    InputKeyList,
    InputKeyPress,
    InputKeyLongPress,
    OutputImage,
    DeviceTelemetryStart,
    DeviceTelemetryStop,
    AppTelemetryStart,
    AppTelemetryStop,
    HealthCheckGet,
    VoiceList,
    VoiceSet,
    VoiceSendAudio,
    VoiceSendText,
    Version,
    Discovery,
}

const fn req(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
    }
}

const NO_PARAMS: &[ParamSpec] = &[];
const APP_ID: &[ParamSpec] = &[req("appId", ParamKind::String)];
const APP_LAUNCH: &[ParamSpec] = &[
    req("appId", ParamKind::String),
    opt("parameters", ParamKind::Value),
];
const APP_LAUNCH_WITH_CONTENT: &[ParamSpec] = &[
    req("appId", ParamKind::String),
    req("contentId", ParamKind::String),
    opt("parameters", ParamKind::Value),
];
const APP_EXIT: &[ParamSpec] = &[
    req("appId", ParamKind::String),
    opt("force", ParamKind::Bool),
];
const SETTINGS_SET: &[ParamSpec] = &[req("settings", ParamKind::Value)];
const KEY_PRESS: &[ParamSpec] = &[req("keyCode", ParamKind::String)];
const KEY_LONG_PRESS: &[ParamSpec] = &[
    req("keyCode", ParamKind::String),
    req("durationsMs", ParamKind::Int),
];
const TELEMETRY_START: &[ParamSpec] = &[req("duration", ParamKind::Int)];
const APP_TELEMETRY_START: &[ParamSpec] = &[
    req("appId", ParamKind::String),
    req("duration", ParamKind::Int),
];
const VOICE_SET: &[ParamSpec] = &[req("voiceSystem", ParamKind::Value)];
const VOICE_SEND_AUDIO: &[ParamSpec] = &[
    req("fileLocation", ParamKind::String),
    opt("voiceSystem", ParamKind::String),
];
const VOICE_SEND_TEXT: &[ParamSpec] = &[
    req("requestText", ParamKind::String),
    opt("voiceSystem", ParamKind::String),
];

impl DabMethod {
    /// All methods, in operations-list order.
    pub const ALL: [DabMethod; 26] = [
        DabMethod::OperationsList,
        DabMethod::AppList,
        DabMethod::AppLaunch,
        DabMethod::AppLaunchWithContent,
        DabMethod::AppGetState,
        DabMethod::AppExit,
        DabMethod::DeviceInfo,
        DabMethod::SystemRestart,
        DabMethod::SystemSettingsList,
        DabMethod::SystemSettingsGet,
        DabMethod::SystemSettingsSet,
        DabMethod::InputKeyList,
        DabMethod::InputKeyPress,
        DabMethod::InputKeyLongPress,
        DabMethod::OutputImage,
        DabMethod::DeviceTelemetryStart,
        DabMethod::DeviceTelemetryStop,
        DabMethod::AppTelemetryStart,
        DabMethod::AppTelemetryStop,
        DabMethod::HealthCheckGet,
        DabMethod::VoiceList,
        DabMethod::VoiceSet,
        DabMethod::VoiceSendAudio,
        DabMethod::VoiceSendText,
        DabMethod::Version,
        DabMethod::Discovery,
    ];

    /// Wire path of the method below `dab/<deviceId>/`.
    pub fn path(&self) -> &'static str {
        match self {
            DabMethod::OperationsList => "operations/list",
            DabMethod::AppList => "applications/list",
            DabMethod::AppLaunch => "applications/launch",
            DabMethod::AppLaunchWithContent => "applications/launch-with-content",
            DabMethod::AppGetState => "applications/get-state",
            DabMethod::AppExit => "applications/exit",
            DabMethod::DeviceInfo => "device/info",
            DabMethod::SystemRestart => "system/restart",
            DabMethod::SystemSettingsList => "system/settings/list",
            DabMethod::SystemSettingsGet => "system/settings/get",
            DabMethod::SystemSettingsSet => "system/settings/set",
            DabMethod::InputKeyList => "input/key/list",
            DabMethod::InputKeyPress => "input/key-press",
            DabMethod::InputKeyLongPress => "input/long-key-press",
            DabMethod::OutputImage => "output/image",
            DabMethod::DeviceTelemetryStart => "device-telemetry/start",
            DabMethod::DeviceTelemetryStop => "device-telemetry/stop",
            DabMethod::AppTelemetryStart => "app-telemetry/start",
            DabMethod::AppTelemetryStop => "app-telemetry/stop",
            DabMethod::HealthCheckGet => "health-check/get",
            DabMethod::VoiceList => "voice/list",
            DabMethod::VoiceSet => "voice/set",
            DabMethod::VoiceSendAudio => "voice/send-audio",
            DabMethod::VoiceSendText => "voice/send-text",
            DabMethod::Version => "version",
            DabMethod::Discovery => "discovery",
        }
    }

    /// Reverse of [`path`](Self::path).
    pub fn from_path(path: &str) -> Option<DabMethod> {
        DabMethod::ALL.iter().copied().find(|m| m.path() == path)
    }

    /// Parameter schema checked before the handler runs.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            DabMethod::AppLaunch => APP_LAUNCH,
            DabMethod::AppLaunchWithContent => APP_LAUNCH_WITH_CONTENT,
            DabMethod::AppGetState => APP_ID,
            DabMethod::AppExit => APP_EXIT,
            DabMethod::SystemSettingsSet => SETTINGS_SET,
            DabMethod::InputKeyPress => KEY_PRESS,
            DabMethod::InputKeyLongPress => KEY_LONG_PRESS,
            DabMethod::DeviceTelemetryStart => TELEMETRY_START,
            DabMethod::AppTelemetryStart => APP_TELEMETRY_START,
            DabMethod::AppTelemetryStop => APP_ID,
            DabMethod::VoiceSet => VOICE_SET,
            DabMethod::VoiceSendAudio => VOICE_SEND_AUDIO,
            DabMethod::VoiceSendText => VOICE_SEND_TEXT,
            _ => NO_PARAMS,
        }
    }

    /// Methods always served by the framework, never by adapter code.
    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            DabMethod::OperationsList | DabMethod::Version | DabMethod::Discovery
        )
    }

    /// Telemetry lifecycle methods; these join the op-set only when the
    /// adapter registered the matching telemetry source.
    pub fn is_telemetry_control(&self) -> bool {
        matches!(
            self,
            DabMethod::DeviceTelemetryStart
                | DabMethod::DeviceTelemetryStop
                | DabMethod::AppTelemetryStart
                | DabMethod::AppTelemetryStop
        )
    }
}
