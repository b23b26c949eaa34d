//! The in-memory JSON value tree.

use std::ops::{Index, IndexMut};

use crate::error::{JsonError, Result};
use crate::ser::SerializeOptions;

static NULL: Json = Json::Null;

/// A dynamically-typed JSON value.
///
/// Objects keep their members in insertion order; equality between
/// objects ignores that order and compares by key. Exactly one variant is
/// inhabited at any time.
#[derive(Debug, Clone, Default)]
pub enum Json {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

impl Json {
    /// An empty object.
    pub fn object() -> Json {
        Json::Object(Vec::new())
    }

    /// An empty array.
    pub fn array() -> Json {
        Json::Array(Vec::new())
    }

    /// Variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Int(_) => "int",
            Json::Double(_) => "double",
            Json::Str(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Json::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Json::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Json::Int(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Json::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Json::Str(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Json::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Json::Object(_))
    }

    // ----------------------------------------------------------------
    // strict readers

    /// Read a bool, failing on any other variant.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Json::Bool(b) => Ok(*b),
            other => Err(JsonError::mismatch("bool", other.kind())),
        }
    }

    /// Read an integer. A double converts only when it has no fractional
    /// part and fits in `i64`.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Json::Int(v) => Ok(*v),
            Json::Double(d)
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 =>
            {
                Ok(*d as i64)
            }
            other => Err(JsonError::mismatch("int", other.kind())),
        }
    }

    /// Read a double. An integer converts only when `f64` can represent
    /// it exactly.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Json::Double(d) => Ok(*d),
            Json::Int(v) if (*v as f64) as i64 == *v => Ok(*v as f64),
            other => Err(JsonError::mismatch("double", other.kind())),
        }
    }

    /// Read a string slice, failing on any other variant.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Json::Str(s) => Ok(s),
            other => Err(JsonError::mismatch("string", other.kind())),
        }
    }

    /// Read the elements of an array, failing on any other variant.
    pub fn as_array(&self) -> Result<&[Json]> {
        match self {
            Json::Array(a) => Ok(a),
            other => Err(JsonError::mismatch("array", other.kind())),
        }
    }

    /// Read the members of an object, failing on any other variant.
    pub fn as_object(&self) -> Result<&[(String, Json)]> {
        match self {
            Json::Object(o) => Ok(o),
            other => Err(JsonError::mismatch("object", other.kind())),
        }
    }

    // ----------------------------------------------------------------
    // lenient writers

    /// Mutable bool view. Integers coerce via nonzero; any other variant
    /// is replaced with `false`.
    pub fn bool_mut(&mut self) -> &mut bool {
        if let Json::Int(v) = self {
            *self = Json::Bool(*v != 0);
        }
        if !self.is_bool() {
            *self = Json::Bool(false);
        }
        match self {
            Json::Bool(b) => b,
            _ => unreachable!(),
        }
    }

    /// Mutable integer view. Doubles truncate; any other variant is
    /// replaced with `0`.
    pub fn i64_mut(&mut self) -> &mut i64 {
        if let Json::Double(d) = self {
            *self = Json::Int(*d as i64);
        }
        if !self.is_int() {
            *self = Json::Int(0);
        }
        match self {
            Json::Int(v) => v,
            _ => unreachable!(),
        }
    }

    /// Mutable double view. Integers widen; any other variant is
    /// replaced with `0.0`.
    pub fn f64_mut(&mut self) -> &mut f64 {
        if let Json::Int(v) = self {
            *self = Json::Double(*v as f64);
        }
        if !self.is_double() {
            *self = Json::Double(0.0);
        }
        match self {
            Json::Double(d) => d,
            _ => unreachable!(),
        }
    }

    /// Mutable string view; any other variant is replaced with `""`.
    pub fn str_mut(&mut self) -> &mut String {
        if !self.is_string() {
            *self = Json::Str(String::new());
        }
        match self {
            Json::Str(s) => s,
            _ => unreachable!(),
        }
    }

    /// Mutable array view; any other variant is replaced with `[]`.
    pub fn array_mut(&mut self) -> &mut Vec<Json> {
        if !self.is_array() {
            *self = Json::Array(Vec::new());
        }
        match self {
            Json::Array(a) => a,
            _ => unreachable!(),
        }
    }

    /// Mutable object view; any other variant is replaced with `{}`.
    pub fn object_mut(&mut self) -> &mut Vec<(String, Json)> {
        if !self.is_object() {
            *self = Json::Object(Vec::new());
        }
        match self {
            Json::Object(o) => o,
            _ => unreachable!(),
        }
    }

    // ----------------------------------------------------------------
    // object and array access

    /// True when the object has a member `name` with a non-null value.
    /// Null members count as absent, matching DAB parameter semantics.
    pub fn has(&self, name: &str) -> bool {
        matches!(self.get(name), Some(v) if !v.is_null())
    }

    /// Member lookup; `None` on non-objects or missing keys.
    pub fn get(&self, name: &str) -> Option<&Json> {
        match self {
            Json::Object(o) => o.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Element lookup; `None` on non-arrays or out-of-range indices.
    pub fn get_idx(&self, index: usize) -> Option<&Json> {
        match self {
            Json::Array(a) => a.get(index),
            _ => None,
        }
    }

    /// Insert or replace a member. A replaced member keeps its original
    /// position; a non-object value is first replaced with `{}`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Json>) {
        let name = name.into();
        let obj = self.object_mut();
        match obj.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value.into(),
            None => obj.push((name, value.into())),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Json>) -> Json {
        self.set(name, value);
        self
    }

    /// Append to an array, promoting a non-array value to `[]` first.
    pub fn push(&mut self, value: impl Into<Json>) {
        self.array_mut().push(value.into());
    }

    /// Number of members or elements; `0` for null, error for scalars.
    pub fn len(&self) -> Result<usize> {
        match self {
            Json::Object(o) => Ok(o.len()),
            Json::Array(a) => Ok(a.len()),
            Json::Null => Ok(0),
            other => Err(JsonError::mismatch("object or array", other.kind())),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.len(), Ok(0))
    }

    // ----------------------------------------------------------------
    // serialization

    /// Canonical serialization with quoted keys.
    pub fn serialize(&self) -> String {
        self.serialize_with(&SerializeOptions::default())
    }

    /// Serialization with explicit options.
    pub fn serialize_with(&self, opts: &SerializeOptions) -> String {
        crate::ser::to_string(self, opts)
    }
}

/// Missing members and out-of-range elements read as `Null`, mirroring
/// the lenient reader used by handlers; strict accessors on the result
/// still surface the mismatch.
impl Index<&str> for Json {
    type Output = Json;

    fn index(&self, name: &str) -> &Json {
        self.get(name).unwrap_or(&NULL)
    }
}

/// Indexing a non-object for writing replaces it with an empty object;
/// a missing key is inserted as `Null`.
impl IndexMut<&str> for Json {
    fn index_mut(&mut self, name: &str) -> &mut Json {
        let obj = self.object_mut();
        let pos = match obj.iter().position(|(k, _)| k == name) {
            Some(pos) => pos,
            None => {
                obj.push((name.to_owned(), Json::Null));
                obj.len() - 1
            }
        };
        &mut obj[pos].1
    }
}

impl Index<usize> for Json {
    type Output = Json;

    fn index(&self, index: usize) -> &Json {
        self.get_idx(index).unwrap_or(&NULL)
    }
}

/// Indexing a non-array for writing replaces it with an empty array; the
/// array grows with nulls up to `index + 1`.
impl IndexMut<usize> for Json {
    fn index_mut(&mut self, index: usize) -> &mut Json {
        let arr = self.array_mut();
        if index >= arr.len() {
            arr.resize(index + 1, Json::Null);
        }
        &mut arr[index]
    }
}

impl PartialEq for Json {
    fn eq(&self, other: &Json) -> bool {
        match (self, other) {
            (Json::Null, Json::Null) => true,
            (Json::Bool(a), Json::Bool(b)) => a == b,
            (Json::Int(a), Json::Int(b)) => a == b,
            (Json::Double(a), Json::Double(b)) => a == b,
            (Json::Str(a), Json::Str(b)) => a == b,
            (Json::Array(a), Json::Array(b)) => a == b,
            (Json::Object(a), Json::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------
// conversions

impl From<bool> for Json {
    fn from(v: bool) -> Json {
        Json::Bool(v)
    }
}

impl From<i64> for Json {
    fn from(v: i64) -> Json {
        Json::Int(v)
    }
}

impl From<i32> for Json {
    fn from(v: i32) -> Json {
        Json::Int(v as i64)
    }
}

impl From<u32> for Json {
    fn from(v: u32) -> Json {
        Json::Int(v as i64)
    }
}

impl From<f64> for Json {
    fn from(v: f64) -> Json {
        Json::Double(v)
    }
}

impl From<&str> for Json {
    fn from(v: &str) -> Json {
        Json::Str(v.to_owned())
    }
}

impl From<String> for Json {
    fn from(v: String) -> Json {
        Json::Str(v)
    }
}

impl<T: Into<Json>> From<Vec<T>> for Json {
    fn from(v: Vec<T>) -> Json {
        Json::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Json>> From<Option<T>> for Json {
    fn from(v: Option<T>) -> Json {
        v.map(Into::into).unwrap_or(Json::Null)
    }
}

impl FromIterator<Json> for Json {
    fn from_iter<I: IntoIterator<Item = Json>>(iter: I) -> Json {
        Json::Array(iter.into_iter().collect())
    }
}

impl FromIterator<(String, Json)> for Json {
    fn from_iter<I: IntoIterator<Item = (String, Json)>>(iter: I) -> Json {
        let mut obj = Json::object();
        for (k, v) in iter {
            obj.set(k, v);
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_readers_refuse_wrong_variant() {
        let v = Json::from("text");
        assert_eq!(v.as_str().unwrap(), "text");
        assert!(matches!(
            v.as_i64(),
            Err(JsonError::TypeMismatch {
                expected: "int",
                found: "string"
            })
        ));
    }

    #[test]
    fn numeric_readers_coerce_losslessly() {
        assert_eq!(Json::from(3.0).as_i64().unwrap(), 3);
        assert!(Json::from(3.5).as_i64().is_err());
        assert_eq!(Json::from(7).as_f64().unwrap(), 7.0);
    }

    #[test]
    fn lenient_writers_promote_null() {
        let mut v = Json::Null;
        *v.i64_mut() += 5;
        assert_eq!(v, Json::Int(5));

        let mut v = Json::from(2.9);
        assert_eq!(*v.i64_mut(), 2);

        let mut v = Json::from(1);
        assert!(*v.bool_mut());
    }

    #[test]
    fn object_index_promotes_and_inserts() {
        let mut v = Json::from(42);
        v["status"] = Json::from(200);
        assert!(v.is_object());
        assert_eq!(v["status"], Json::Int(200));
        assert_eq!(v["missing"], Json::Null);
    }

    #[test]
    fn array_index_grows_with_nulls() {
        let mut v = Json::Null;
        v[2] = Json::from("third");
        assert_eq!(v.len().unwrap(), 3);
        assert_eq!(v[0], Json::Null);
        assert_eq!(v[2], Json::Str("third".into()));
    }

    #[test]
    fn null_members_count_as_absent() {
        let v = Json::object().with("present", 1).with("nil", Json::Null);
        assert!(v.has("present"));
        assert!(!v.has("nil"));
        assert!(!v.has("missing"));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut v = Json::object().with("a", 1).with("b", 2);
        v.set("a", 9);
        let members = v.as_object().unwrap();
        assert_eq!(members[0].0, "a");
        assert_eq!(members[0].1, Json::Int(9));
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn object_equality_ignores_member_order() {
        let a = Json::object().with("x", 1).with("y", 2);
        let b = Json::object().with("y", 2).with("x", 1);
        assert_eq!(a, b);
        assert_ne!(a, Json::object().with("x", 1));
    }

    #[test]
    fn cross_variant_values_are_unequal() {
        assert_ne!(Json::Int(1), Json::Bool(true));
        assert_ne!(Json::Null, Json::from(""));
    }
}
