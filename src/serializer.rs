//! Base serializers turning plain [`Data`] into text and back.
//!
//! The encoder only ever hands a base serializer acyclic, transform-free data,
//! so any format that can carry null, booleans, numbers, strings, arrays and
//! string-keyed objects will do. [`JsonSerializer`] is the default.

use crate::{Data, Result};
use serde::Deserialize;

/// Text format the reference table is written in.
pub trait BaseSerializer: Send + Sync {
    /// Serializes plain data to text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the data cannot be written.
    fn serialize(&self, data: &Data) -> Result<String>;

    /// Parses text back into plain data.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the text is not valid input.
    fn deserialize(&self, text: &str) -> Result<Data>;
}

/// JSON via `serde_json`.
///
/// Non-finite floats have no JSON spelling and are written as `null`; NaN never
/// reaches the serializer when the built-in transforms are registered.
///
/// Parsing has no nesting limit, so any table the encoder writes reads back.
///
/// # Examples
///
/// ```rust
/// use replicator::{BaseSerializer, Data, JsonSerializer};
///
/// let json = JsonSerializer::default();
/// let data = json.deserialize(r#"[1,"two",null]"#).unwrap();
/// assert_eq!(json.serialize(&data).unwrap(), r#"[1,"two",null]"#);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output.
    #[must_use]
    pub fn pretty() -> Self {
        JsonSerializer { pretty: true }
    }
}

impl BaseSerializer for JsonSerializer {
    fn serialize(&self, data: &Data) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(text)
    }

    fn deserialize(&self, text: &str) -> Result<Data> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        deserializer.disable_recursion_limit();
        let data = Data::deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_pretty_output_is_indented() {
        let data = Data::Array(vec![Data::from(1), Data::from(2)]);
        let text = JsonSerializer::pretty().serialize(&data).unwrap();
        assert!(text.contains('\n'));
        assert_eq!(JsonSerializer::new().deserialize(&text).unwrap(), data);
    }

    #[test]
    fn test_deep_nesting_reads_back() {
        let mut data = Data::Null;
        for _ in 0..300 {
            data = Data::Array(vec![data]);
        }
        let json = JsonSerializer::new();
        let text = json.serialize(&data).unwrap();
        assert_eq!(json.deserialize(&text).unwrap(), data);
    }

    #[test]
    fn test_trailing_text_rejected() {
        let err = JsonSerializer::new().deserialize("[1] [2]").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_invalid_text_is_serialization_error() {
        let err = JsonSerializer::new().deserialize("[1,").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_non_finite_written_as_null() {
        let data = Data::from(f64::INFINITY);
        assert_eq!(JsonSerializer::new().serialize(&data).unwrap(), "null");
    }
}
