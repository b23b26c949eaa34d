//! JSON value model and codec for the DAB wire format.
//!
//! Every DAB request, response, and telemetry notification is a [`Json`]
//! tree. The codec is deliberately more permissive than RFC 8259 on the
//! way in (unquoted object keys, a tolerated trailing comma before `}`)
//! and canonical on the way out, because that is what DAB wire partners
//! produce in practice.
//!
//! ## Reading and writing
//!
//! Strict readers (`as_i64`, `as_str`, ...) fail with
//! [`JsonError::TypeMismatch`] when the variant does not match; numeric
//! readers coerce between int and double only when the conversion is
//! lossless. Lenient writers (`i64_mut`, `json["key"]`, `json[idx]`)
//! coerce or replace the value in place, promoting `Null` to the target
//! variant.
//!
//! ```
//! use dab_json::Json;
//!
//! let mut reply = Json::object().with("status", 200).with("version", "2.0");
//! reply["versions"].push("2.0");
//!
//! let text = reply.serialize();
//! assert_eq!(dab_json::parse(&text).unwrap(), reply);
//! ```

mod error;
mod parse;
mod ser;
mod value;

pub use error::{JsonError, Result};
pub use parse::parse;
pub use ser::SerializeOptions;
pub use value::Json;
