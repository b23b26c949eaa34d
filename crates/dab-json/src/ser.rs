//! Canonical JSON serialization.

use crate::value::Json;

/// Serializer switches.
///
/// Keys are quoted by default; a wire partner that expects the compact
/// unquoted form can flip `quote_keys`, in which case keys that are valid
/// identifiers (`[A-Za-z_][A-Za-z0-9_]*`) are emitted bare.
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    pub quote_keys: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions { quote_keys: true }
    }
}

pub(crate) fn to_string(value: &Json, opts: &SerializeOptions) -> String {
    let mut out = String::new();
    write_value(&mut out, value, opts);
    out
}

fn write_value(out: &mut String, value: &Json, opts: &SerializeOptions) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(true) => out.push_str("true"),
        Json::Bool(false) => out.push_str("false"),
        Json::Int(v) => {
            out.push_str(&v.to_string());
        }
        Json::Double(d) => write_double(out, *d),
        Json::Str(s) => write_string(out, s),
        Json::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, opts);
            }
            out.push(']');
        }
        Json::Object(members) => {
            out.push('{');
            for (i, (name, v)) in members.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if !opts.quote_keys && is_identifier(name) {
                    out.push_str(name);
                } else {
                    write_string(out, name);
                }
                out.push(':');
                write_value(out, v, opts);
            }
            out.push('}');
        }
    }
}

/// Shortest round-trip form, with a forced fractional part so the text
/// re-parses as a double rather than an int. Non-finite values have no
/// JSON spelling and degrade to `null`.
fn write_double(out: &mut String, d: f64) {
    if !d.is_finite() {
        out.push_str("null");
        return;
    }
    let text = d.to_string();
    out.push_str(&text);
    if !text.contains('.') && !text.contains('e') && !text.contains('E') {
        out.push_str(".0");
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn canonical_output() {
        let v = Json::object()
            .with("status", 200)
            .with("state", "launched")
            .with("ratio", 0.5)
            .with("flags", vec![Json::Bool(true), Json::Null]);
        assert_eq!(
            v.serialize(),
            r#"{"status":200,"state":"launched","ratio":0.5,"flags":[true,null]}"#
        );
    }

    #[test]
    fn unquoted_keys_only_for_identifiers() {
        let v = Json::object().with("appId", "x").with("not-ident", 1);
        let opts = SerializeOptions { quote_keys: false };
        assert_eq!(v.serialize_with(&opts), r#"{appId:"x","not-ident":1}"#);
    }

    #[test]
    fn doubles_keep_their_variant() {
        assert_eq!(Json::Double(2.0).serialize(), "2.0");
        assert_eq!(parse("2.0").unwrap(), Json::Double(2.0));
        assert_eq!(Json::Double(1.5e10).serialize(), "15000000000.0");
        assert_eq!(Json::Double(f64::NAN).serialize(), "null");
    }

    #[test]
    fn control_characters_escape_as_unicode() {
        let v = Json::from("bell\u{07}tab\t");
        assert_eq!(v.serialize(), "\"bell\\u0007tab\\t\"");
    }

    #[test]
    fn round_trip_identity() {
        let samples = [
            Json::Null,
            Json::Bool(false),
            Json::Int(-42),
            Json::Double(3.25),
            Json::from("控制\u{01}字符 & plain ascii"),
            Json::object()
                .with("nested", Json::object().with("deep", vec![1, 2, 3]))
                .with("empty", Json::array())
                .with("text", "line\nbreak"),
        ];
        for v in &samples {
            let text = v.serialize();
            assert_eq!(&parse(&text).unwrap(), v, "round-trip of {text}");
        }
    }
}
