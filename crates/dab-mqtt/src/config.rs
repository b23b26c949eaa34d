//! MQTT broker configuration.

use serde::{Deserialize, Serialize};

use dab_core::TransportError;

/// Configuration for the broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub broker: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID (generated if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Start with a clean session.
    #[serde(default = "default_clean_start")]
    pub clean_start: bool,

    /// Capacity of the outbound publish channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    20
}
fn default_clean_start() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    256
}

impl MqttConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        MqttConfig {
            broker: broker.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            clean_start: default_clean_start(),
            channel_capacity: default_channel_capacity(),
        }
    }

    /// Parse a broker URL of the form `[tcp://|mqtt://]host[:port]`.
    pub fn from_url(url: &str) -> Result<Self, TransportError> {
        let stripped = url
            .strip_prefix("tcp://")
            .or_else(|| url.strip_prefix("mqtt://"))
            .unwrap_or(url);
        if stripped.is_empty() {
            return Err(TransportError::Connect(format!(
                "invalid broker url \"{url}\""
            )));
        }
        match stripped.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    TransportError::Connect(format!("invalid broker port in \"{url}\""))
                })?;
                Ok(Self::new(host).with_port(port))
            }
            None => Ok(Self::new(stripped)),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Client ID to hand to the broker, generating a unique one when
    /// none was configured.
    pub fn effective_client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("dab-{}", uuid::Uuid::new_v4()))
    }
}
