//! Declarative parameter schemas and typed extraction.
//!
//! Each method declares the parameters it takes; the dispatcher extracts
//! and type-checks them before the handler runs, so handlers work with
//! already-shaped values and a malformed request is refused with 400
//! without touching adapter code.

use std::collections::HashMap;

use dab_json::Json;

use crate::error::{DabError, DabResult};

/// Expected shape of a request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Int,
    Bool,
    /// Any JSON value (objects like `parameters` or `settings`).
    Value,
}

impl ParamKind {
    fn accepts(&self, value: &Json) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Int => value.is_int(),
            ParamKind::Bool => value.is_bool(),
            ParamKind::Value => true,
        }
    }
}

/// One entry of a method's parameter schema.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

/// Parameters extracted from a request payload.
///
/// Getters mirror the schema kinds; because extraction already checked
/// presence and shape, a handler reading a required parameter through
/// the matching getter cannot fail.
#[derive(Debug, Default)]
pub struct Params {
    values: HashMap<&'static str, Json>,
}

impl Params {
    /// Check `payload` against `specs` and pull out the declared
    /// parameters. Null members count as absent.
    pub fn extract(specs: &'static [ParamSpec], payload: &Json) -> DabResult<Params> {
        let mut values = HashMap::new();
        for spec in specs {
            if payload.has(spec.name) {
                let value = &payload[spec.name];
                if !spec.kind.accepts(value) {
                    return Err(DabError::bad_parameter(spec.name));
                }
                values.insert(spec.name, value.clone());
            } else if spec.required {
                return Err(DabError::bad_parameter(spec.name));
            }
        }
        Ok(Params { values })
    }

    pub fn str(&self, name: &str) -> DabResult<&str> {
        match self.values.get(name) {
            Some(v) => v.as_str().map_err(|_| DabError::bad_parameter(name)),
            None => Err(DabError::bad_parameter(name)),
        }
    }

    pub fn int(&self, name: &str) -> DabResult<i64> {
        match self.values.get(name) {
            Some(v) => v.as_i64().map_err(|_| DabError::bad_parameter(name)),
            None => Err(DabError::bad_parameter(name)),
        }
    }

    /// Optional boolean with a default, e.g. `force` on applications/exit.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.values
            .get(name)
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(default)
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_str().ok())
    }

    /// Optional free-form value (`parameters`, `settings`).
    pub fn value(&self, name: &str) -> Option<&Json> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::DabMethod;

    #[test]
    fn extracts_required_and_optional() {
        let payload = dab_json::parse(r#"{"appId": "netflix", "parameters": {"a": 1}}"#).unwrap();
        let params = Params::extract(DabMethod::AppLaunch.params(), &payload).unwrap();
        assert_eq!(params.str("appId").unwrap(), "netflix");
        assert!(params.value("parameters").unwrap().is_object());
    }

    #[test]
    fn missing_required_is_refused() {
        let payload = Json::object();
        let err = Params::extract(DabMethod::AppLaunch.params(), &payload).unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.text, "appId missing or of wrong type");
    }

    #[test]
    fn wrong_kind_is_refused() {
        let payload = Json::object().with("appId", 12);
        let err = Params::extract(DabMethod::AppLaunch.params(), &payload).unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn null_member_counts_as_absent() {
        let payload = Json::object().with("appId", Json::Null);
        assert!(Params::extract(DabMethod::AppLaunch.params(), &payload).is_err());
    }

    #[test]
    fn absent_optional_uses_default() {
        let payload = Json::object().with("appId", "x");
        let params = Params::extract(DabMethod::AppExit.params(), &payload).unwrap();
        assert!(!params.bool_or("force", false));
        assert!(params.value("force").is_none());
    }
}
