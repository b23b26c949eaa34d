//! Error types for the adapter framework.

use dab_json::JsonError;

/// Protocol-level error returned by handlers and the dispatcher.
///
/// `code` becomes the `status` of the DAB error response, `text` its
/// `error` member. Adapters raise device-specific failures through
/// [`DabError::device`]; everything else uses the standard constructors
/// so the wire vocabulary stays uniform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dab error {code}: {text}")]
pub struct DabError {
    pub code: i64,
    pub text: String,
}

impl DabError {
    /// Adapter-raised failure with an explicit status code.
    pub fn device(code: i64, text: impl Into<String>) -> Self {
        DabError {
            code,
            text: text.into(),
        }
    }

    pub fn bad_request(text: impl Into<String>) -> Self {
        Self::device(400, text)
    }

    pub fn topic_malformed() -> Self {
        Self::bad_request("topic is malformed")
    }

    pub fn unknown_device() -> Self {
        Self::bad_request("deviceId does not exist")
    }

    pub fn malformed_request() -> Self {
        Self::bad_request("malformed request")
    }

    /// Missing or mistyped request parameter.
    pub fn bad_parameter(name: &str) -> Self {
        Self::bad_request(format!("{name} missing or of wrong type"))
    }

    /// The method is outside the adapter's op-set.
    pub fn unsupported() -> Self {
        Self::device(501, "unsupported")
    }

    pub fn internal() -> Self {
        Self::device(500, "internal")
    }
}

impl From<JsonError> for DabError {
    fn from(err: JsonError) -> Self {
        match err {
            JsonError::Parse { .. } => Self::malformed_request(),
            JsonError::TypeMismatch { .. } => Self::bad_request(err.to_string()),
        }
    }
}

/// Result type for handler and dispatch operations.
pub type DabResult<T> = Result<T, DabError>;

/// Failures in the transport layer. These never reach a DAB client;
/// they are logged and, when fatal, wake `wait_until_stopped`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("transport already connected")]
    AlreadyConnected,

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes() {
        assert_eq!(DabError::unsupported().code, 501);
        assert_eq!(DabError::unknown_device().code, 400);
        assert_eq!(DabError::internal().code, 500);
        assert_eq!(
            DabError::bad_parameter("appId").text,
            "appId missing or of wrong type"
        );
    }

    #[test]
    fn parse_errors_map_to_malformed_request() {
        let err = dab_json::parse("{oops").unwrap_err();
        assert_eq!(DabError::from(err), DabError::malformed_request());
    }
}
