//! Recursive-descent parser for the permissive DAB JSON dialect.
//!
//! On top of strict JSON the parser accepts unquoted identifier keys and
//! a trailing comma before `}` (not before `]`). Numbers are strict: one
//! optional leading minus, no stray signs, and int64 overflow is a parse
//! error rather than a silent clamp.

use crate::error::{JsonError, Result};
use crate::value::Json;

/// Parse a complete JSON document. Trailing garbage after the top-level
/// value is an error.
pub fn parse(input: &str) -> Result<Json> {
    let mut p = Parser { input, pos: 0 };
    let value = p.parse_value()?;
    p.skip_ws();
    if p.pos < p.input.len() {
        return Err(p.err("trailing characters after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, reason: impl Into<String>) -> JsonError {
        JsonError::parse(self.pos, reason)
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    fn eat(&mut self, byte: u8, what: &str) -> Result<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(what))
        }
    }

    fn parse_value(&mut self) -> Result<Json> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => {
                self.bump();
                Ok(Json::Str(self.parse_string_body()?))
            }
            Some(b'-') | Some(b'0'..=b'9') => self.parse_number(),
            Some(_) => self.parse_literal(),
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<Json> {
        self.bump(); // '{'
        let mut obj = Json::object();
        let mut first = true;
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.bump();
                return Ok(obj);
            }
            if !first {
                self.eat(b',', "missing comma")?;
                self.skip_ws();
                // trailing comma before '}' is tolerated
                if self.peek() == Some(b'}') {
                    self.bump();
                    return Ok(obj);
                }
            }
            first = false;

            let name = self.parse_key()?;
            self.skip_ws();
            self.eat(b':', "missing name/value separator")?;
            let value = self.parse_value()?;
            // duplicate keys: last value wins
            obj.set(name, value);
        }
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"') => {
                self.bump();
                self.parse_string_body()
            }
            Some(c) if c == b'_' || c.is_ascii_alphabetic() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
                    self.bump();
                }
                Ok(self.input[start..self.pos].to_owned())
            }
            _ => Err(self.err("invalid object key")),
        }
    }

    fn parse_array(&mut self) -> Result<Json> {
        self.bump(); // '['
        let mut arr = Json::array();
        let mut first = true;
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.bump();
                return Ok(arr);
            }
            if !first {
                self.eat(b',', "missing comma")?;
            }
            first = false;
            arr.push(self.parse_value()?);
        }
    }

    fn parse_string_body(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            let rest = &self.input[self.pos..];
            let c = match rest.chars().next() {
                Some(c) => c,
                None => return Err(self.err("missing closing quote")),
            };
            match c {
                '"' => {
                    self.bump();
                    return Ok(out);
                }
                '\\' => {
                    self.bump();
                    let esc = match self.input[self.pos..].chars().next() {
                        Some(esc) => esc,
                        None => return Err(self.err("missing closing quote")),
                    };
                    self.pos += esc.len_utf8();
                    match esc {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => match self.parse_unicode_escape() {
                            Some(ch) => out.push(ch),
                            // not followed by hex digits: unknown escape,
                            // keep the literal character
                            None => out.push('u'),
                        },
                        other => out.push(other),
                    }
                }
                _ => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    /// Decode `XXXX` after a `\u`, combining UTF-16 surrogate pairs.
    /// Returns `None` when the next four bytes are not hex digits, so the
    /// caller can fall back to the unknown-escape rule.
    fn parse_unicode_escape(&mut self) -> Option<char> {
        let unit = self.parse_hex4()?;
        if (0xD800..=0xDBFF).contains(&unit) {
            // high surrogate: look for a following \uDC00..=\uDFFF
            let rewind = self.pos;
            if self.peek() == Some(b'\\') {
                self.bump();
                if self.peek() == Some(b'u') {
                    self.bump();
                    if let Some(low) = self.parse_hex4() {
                        if (0xDC00..=0xDFFF).contains(&low) {
                            let code =
                                0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                            return char::from_u32(code);
                        }
                    }
                }
            }
            self.pos = rewind;
            return Some(char::REPLACEMENT_CHARACTER);
        }
        if (0xDC00..=0xDFFF).contains(&unit) {
            return Some(char::REPLACEMENT_CHARACTER);
        }
        char::from_u32(unit)
    }

    fn parse_hex4(&mut self) -> Option<u32> {
        let bytes = self.input.as_bytes().get(self.pos..self.pos + 4)?;
        let mut value = 0u32;
        for &b in bytes {
            value = value * 16 + (b as char).to_digit(16)?;
        }
        self.pos += 4;
        Some(value)
    }

    fn parse_number(&mut self) -> Result<Json> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        if !matches!(self.peek(), Some(b'0'..=b'9')) {
            return Err(self.err("invalid number"));
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let mut is_double = false;
        if self.peek() == Some(b'.') {
            is_double = true;
            self.bump();
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.err("invalid number"));
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_double = true;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.err("invalid number"));
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }

        let text = &self.input[start..self.pos];
        if is_double {
            let value: f64 = text
                .parse()
                .map_err(|_| JsonError::parse(start, "invalid number"))?;
            if !value.is_finite() {
                return Err(JsonError::parse(start, "number out of range"));
            }
            Ok(Json::Double(value))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| JsonError::parse(start, "integer overflow"))?;
            Ok(Json::Int(value))
        }
    }

    fn parse_literal(&mut self) -> Result<Json> {
        let rest = &self.input[self.pos..];
        for (text, value) in [
            ("true", Json::Bool(true)),
            ("false", Json::Bool(false)),
            ("null", Json::Null),
        ] {
            if rest.starts_with(text) {
                self.pos += text.len();
                return Ok(value);
            }
        }
        Err(self.err("unexpected character"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_document() {
        let v = parse(r#"{"a": [1, 2.5, "x"], "b": {"c": true, "d": null}}"#).unwrap();
        assert_eq!(v["a"][0], Json::Int(1));
        assert_eq!(v["a"][1], Json::Double(2.5));
        assert_eq!(v["b"]["c"], Json::Bool(true));
        assert!(v["b"]["d"].is_null());
    }

    #[test]
    fn accepts_unquoted_identifier_keys() {
        let v = parse("{appId: \"netflix\", _count: 3}").unwrap();
        assert_eq!(v["appId"].as_str().unwrap(), "netflix");
        assert_eq!(v["_count"].as_i64().unwrap(), 3);
    }

    #[test]
    fn tolerates_trailing_comma_in_object_only() {
        let v = parse("{foo:1,}").unwrap();
        assert_eq!(v, Json::object().with("foo", 1));
        assert!(parse("[1,2,]").is_err());
    }

    #[test]
    fn integers_and_doubles_split_on_fraction_or_exponent() {
        assert_eq!(parse("42").unwrap(), Json::Int(42));
        assert_eq!(parse("-7").unwrap(), Json::Int(-7));
        assert_eq!(parse("42.0").unwrap(), Json::Double(42.0));
        assert_eq!(parse("1e3").unwrap(), Json::Double(1000.0));
    }

    #[test]
    fn rejects_lax_number_forms() {
        assert!(parse("+1").is_err());
        assert!(parse("1-2").is_err());
        assert!(parse("--3").is_err());
        assert!(parse(".5").is_err());
        assert!(parse("1.").is_err());
    }

    #[test]
    fn integer_overflow_is_a_parse_error() {
        let err = parse("92233720368547758080").unwrap_err();
        assert!(matches!(err, JsonError::Parse { reason, .. } if reason == "integer overflow"));
    }

    #[test]
    fn string_escapes() {
        let v = parse(r#""line\nquote\"tab\tslash\\""#).unwrap();
        assert_eq!(v.as_str().unwrap(), "line\nquote\"tab\tslash\\");
    }

    #[test]
    fn unknown_escape_keeps_literal_character() {
        assert_eq!(parse(r#""\x\q""#).unwrap().as_str().unwrap(), "xq");
    }

    #[test]
    fn unicode_escapes_including_surrogate_pairs() {
        assert_eq!(parse(r#""\u0041""#).unwrap().as_str().unwrap(), "A");
        assert_eq!(
            parse(r#""\uD83D\uDE00""#).unwrap().as_str().unwrap(),
            "\u{1F600}"
        );
        // unpaired surrogate degrades to the replacement character
        assert_eq!(
            parse(r#""\uD800x""#).unwrap().as_str().unwrap(),
            "\u{FFFD}x"
        );
    }

    #[test]
    fn malformed_unicode_escape_is_unknown_escape() {
        assert_eq!(parse(r#""\uZZZZ""#).unwrap().as_str().unwrap(), "uZZZZ");
    }

    #[test]
    fn reports_position_of_failure() {
        let err = parse(r#"{"a" 1}"#).unwrap_err();
        match err {
            JsonError::Parse { pos, reason } => {
                assert_eq!(pos, 5);
                assert_eq!(reason, "missing name/value separator");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage_and_truncation() {
        assert!(parse(r#"{"a": 1} extra"#).is_err());
        assert!(parse(r#""unterminated"#).is_err());
        assert!(parse("{").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn literals_are_case_sensitive() {
        assert_eq!(parse("true").unwrap(), Json::Bool(true));
        assert!(parse("True").is_err());
        assert!(parse("NULL").is_err());
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let v = parse(r#"{"a": 1, "a": 2}"#).unwrap();
        assert_eq!(v.len().unwrap(), 1);
        assert_eq!(v["a"].as_i64().unwrap(), 2);
    }
}
