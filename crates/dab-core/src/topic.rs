//! Request topic parsing.

use crate::error::{DabError, DabResult};

/// Where a request topic routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `dab/<deviceId>/<method>`: one adapter.
    Device { device_id: &'a str, method: &'a str },
    /// `dab/<method>` with no deviceId: every adapter (discovery).
    Broadcast { method: &'a str },
}

/// Split a request topic. The method part may itself contain `/`
/// (`system/settings/get`), so only the first separator after the prefix
/// is structural.
pub fn parse_topic(topic: &str) -> DabResult<Route<'_>> {
    let rest = topic
        .strip_prefix("dab/")
        .ok_or_else(DabError::topic_malformed)?;
    if rest.is_empty() {
        return Err(DabError::topic_malformed());
    }
    match rest.split_once('/') {
        None => Ok(Route::Broadcast { method: rest }),
        Some(("", _)) => Err(DabError::topic_malformed()),
        Some((_, "")) => Err(DabError::topic_malformed()),
        Some((device_id, method)) => Ok(Route::Device { device_id, method }),
    }
}
