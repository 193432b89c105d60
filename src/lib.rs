//! # replicator
//!
//! Serialize arbitrary in-memory value graphs (cycles, shared sub-objects,
//! dates, patterns, errors, maps, sets, byte buffers, typed arrays and
//! caller-defined types) through a data-only text format such as JSON, and
//! rebuild an equivalent graph on the way back.
//!
//! ## How it works
//!
//! - **Reference table**: encoding produces an array whose slot 0 holds the
//!   root. A value met twice during the walk (a cycle or a shared sub-object)
//!   is stored once in its own slot and referred to by `{"@r": slot}` markers.
//! - **Transforms**: values the base serializer cannot carry are reduced by an
//!   ordered registry of [`Transform`]s and written as `{"@t": tag, "@d": data}`
//!   envelopes. The first transform whose predicate matches wins.
//! - **Escaping**: user keys that look like `@t`, `@d` or `@r` (optionally
//!   preceded by `#`s) gain one more `#` on the way out and lose it on the way in.
//!
//! ## Quick Start
//!
//! ```rust
//! use replicator::{from_str, to_string, Value};
//! use chrono::{TimeZone, Utc};
//!
//! let when = Utc.timestamp_millis_opt(1_600_000_000_000).single().unwrap();
//! let event = Value::object([
//!     ("at", Value::date(when)),
//!     ("ratio", Value::nan()),
//!     ("note", Value::Undefined),
//! ]);
//! event.insert("parent", event.clone());
//!
//! let text = to_string(&event).unwrap();
//! let back = from_str(&text).unwrap();
//!
//! assert_eq!(back, event);
//! assert!(back.get("parent").unwrap().same(&back));
//! ```
//!
//! ### Custom transforms
//!
//! ```rust
//! use replicator::{FnTransform, Kind, Replicator, Value};
//!
//! let mut replicator = Replicator::new();
//! replicator
//!     .add_transform(
//!         FnTransform::new("Point")
//!             .matching(|kind, v| kind == Kind::Object && v.get("x").is_some() && v.get("y").is_some())
//!             .reduce_with(|v| Ok(Value::array(vec![v.get("x").unwrap_or_default(), v.get("y").unwrap_or_default()])))
//!             .reconstruct_with(|d| Ok(Value::object([("x", d.at(0).unwrap_or_default()), ("y", d.at(1).unwrap_or_default())]))),
//!     )
//!     .unwrap();
//!
//! let point = Value::object([("x", Value::from(1)), ("y", Value::from(2))]);
//! let text = replicator.encode(&point).unwrap();
//! assert_eq!(text, r#"[{"@t":"Point","@d":[1,2]}]"#);
//! assert_eq!(replicator.decode(&text).unwrap(), point);
//! ```
//!
//! ## Performance Characteristics
//!
//! - **Encoding**: O(n) in the number of reachable values, one identity lookup each
//! - **Decoding**: O(n), each slot resolved exactly once
//! - **Memory**: the encoded arena and the table are held for the duration of one call
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Malformed tables are reported as errors, never as panics
//! - Tag and kind names in the input are only ever looked up in closed tables

pub mod builtins;
pub mod data;
mod decoder;
mod encoder;
pub mod error;
pub mod escape;
pub mod macros;
pub mod map;
pub mod native;
pub mod options;
pub mod replicator;
pub mod serializer;
pub mod transform;
pub mod value;

pub use builtins::{
    BufferTransform, DateTransform, ErrorTransform, MapTransform, NanTransform, RegExpTransform,
    SetTransform, TypedArrayTransform, UndefinedTransform,
};
pub use data::{Data, Number};
pub use error::{Error, Result};
pub use map::{DataMap, FieldMap, ObjectMap};
pub use native::{ElementKind, ErrorObject, Pattern, PatternFlags, TypedArray, ValueMap, ValueSet};
pub use options::{Capabilities, ReplicatorOptions};
pub use replicator::Replicator;
pub use serializer::{BaseSerializer, JsonSerializer};
pub use transform::{FnTransform, Transform, TransformRegistry};
pub use value::{CustomValue, Kind, Pending, Shared, Value};

use std::io;

/// Encode a value graph to JSON text with the built-in transforms.
///
/// # Examples
///
/// ```rust
/// use replicator::{to_string, Value};
///
/// let list = Value::array(vec![Value::from(1), Value::nan()]);
/// assert_eq!(to_string(&list).unwrap(), r#"[[1,{"@t":"[[NaN]]","@d":""}]]"#);
/// ```
///
/// # Errors
///
/// Returns an error if the graph holds a value no transform can represent.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string(value: &Value) -> Result<String> {
    Replicator::new().encode(value)
}

/// Encode a value graph to indented JSON text.
///
/// # Errors
///
/// Returns an error if the graph holds a value no transform can represent.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string_pretty(value: &Value) -> Result<String> {
    Replicator::new()
        .with_serializer(JsonSerializer::pretty())
        .encode(value)
}

/// Encode a value graph to a writer.
///
/// # Examples
///
/// ```rust
/// use replicator::{to_writer, Value};
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &Value::from("hi")).unwrap();
/// assert_eq!(buffer, br#"["hi"]"#);
/// ```
///
/// # Errors
///
/// Returns an error if encoding fails or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W>(mut writer: W, value: &Value) -> Result<()>
where
    W: io::Write,
{
    let text = to_string(value)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&e.to_string()))?;
    Ok(())
}

/// Decode a value graph from JSON text with the built-in transforms.
///
/// # Examples
///
/// ```rust
/// use replicator::from_str;
///
/// let value = from_str(r#"[{"me":{"@r":0}}]"#).unwrap();
/// assert!(value.get("me").unwrap().same(&value));
/// ```
///
/// # Errors
///
/// Returns an error if the text is not JSON, the reference table is malformed,
/// or it names a transform that is not registered.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str(s: &str) -> Result<Value> {
    Replicator::new().decode(s)
}

/// Decode a value graph from an I/O stream.
///
/// # Errors
///
/// Returns an error if reading fails or decoding fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R>(mut reader: R) -> Result<Value>
where
    R: io::Read,
{
    let mut string = String::new();
    reader
        .read_to_string(&mut string)
        .map_err(|e| Error::io(&e.to_string()))?;
    from_str(&string)
}

/// Decode a value graph from bytes of JSON text.
///
/// # Errors
///
/// Returns an error if the bytes are not valid UTF-8 or decoding fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice(v: &[u8]) -> Result<Value> {
    let s = std::str::from_utf8(v).map_err(|e| Error::custom(e.to_string()))?;
    from_str(s)
}
