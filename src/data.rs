//! Plain, data-only trees exchanged with the base serializer.
//!
//! [`Data`] is what a reference table is made of: null, booleans, numbers,
//! strings, arrays and string-keyed objects. It implements
//! [`serde::Serialize`] and [`serde::Deserialize`], so any serde data format
//! can carry it.
//!
//! ## Core Types
//!
//! - [`Data`]: a JSON-shaped tree with no identity and no cycles
//! - [`Number`]: an integer or a floating-point number, shared with [`crate::Value`]
//!
//! ## Examples
//!
//! ```rust
//! use replicator::{data, Data};
//!
//! let table = data!([{ "name": "Alice", "tags": ["admin"] }]);
//! assert!(table.is_array());
//!
//! let json = serde_json::to_string(&table).unwrap();
//! assert_eq!(json, r#"[{"name":"Alice","tags":["admin"]}]"#);
//! ```

use crate::DataMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A dynamically-typed, data-only value.
///
/// # Examples
///
/// ```rust
/// use replicator::{Data, Number};
///
/// let null = Data::Null;
/// let num = Data::Number(Number::Integer(42));
/// let text = Data::String("hello".to_string());
///
/// assert!(null.is_null());
/// assert!(num.is_number());
/// assert!(text.is_string());
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Data {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Data>),
    Object(DataMap),
}

/// A numeric value: either an integer or a float.
///
/// # Examples
///
/// ```rust
/// use replicator::Number;
///
/// let integer = Number::Integer(42);
/// let float = Number::Float(3.5);
///
/// assert!(integer.is_integer());
/// assert_eq!(integer.as_i64(), Some(42));
/// assert_eq!(float.as_f64(), 3.5);
/// assert!(Number::Float(f64::NAN).is_nan());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Returns `true` if this is an integer value.
    #[inline]
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_))
    }

    /// Returns `true` if this is a floating-point value.
    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Returns `true` if this number is not-a-number.
    #[inline]
    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Number::Float(f) if f.is_nan())
    }

    /// Converts this number to an `i64` if possible.
    ///
    /// Returns `Some(i64)` for integers and floats with no fractional part
    /// that fit in i64 range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::Number;
    ///
    /// assert_eq!(Number::Integer(42).as_i64(), Some(42));
    /// assert_eq!(Number::Float(42.0).as_i64(), Some(42));
    /// assert_eq!(Number::Float(42.5).as_i64(), None);
    /// assert_eq!(Number::Float(f64::INFINITY).as_i64(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Converts this number to an `f64`.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    /// Numeric equality where NaN equals NaN and `0` equals `-0`.
    #[must_use]
    pub fn same_value_zero(&self, other: &Number) -> bool {
        self.same_value_key() == other.same_value_key()
    }

    /// Hashable canonical form: integral floats fold into integers, so `-0.0`
    /// becomes `0`, and every NaN is one key.
    pub(crate) fn same_value_key(&self) -> NumberKey {
        match *self {
            Number::Integer(i) => NumberKey::Integer(i),
            Number::Float(f) if f.is_nan() => NumberKey::Nan,
            Number::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                NumberKey::Integer(f as i64)
            }
            Number::Float(f) => NumberKey::Float(f.to_bits()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NumberKey {
    Integer(i64),
    Float(u64),
    Nan,
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(fl) if fl.is_nan() => write!(f, "NaN"),
            Number::Float(fl) => write!(f, "{}", fl),
        }
    }
}

macro_rules! number_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Number::Integer(value as i64)
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(value as f64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl Data {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Data::Number(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Data::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Data::Array(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Data::Object(_))
    }

    /// If the value is a string, returns a reference to it. Otherwise returns `None`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    /// If the value is an integer or a whole-number float, returns it. Otherwise returns `None`.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// If the value is an array, returns a reference to it. Otherwise returns `None`.
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<Data>> {
        match self {
            Data::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// If the value is an object, returns a reference to it. Otherwise returns `None`.
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&DataMap> {
        match self {
            Data::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl Serialize for Data {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Data::Null => serializer.serialize_unit(),
            Data::Bool(b) => serializer.serialize_bool(*b),
            Data::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            Data::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Data::String(s) => serializer.serialize_str(s),
            Data::Array(arr) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for element in arr {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Data::Object(obj) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct DataVisitor;

        impl<'de> Visitor<'de> for DataVisitor {
            type Value = Data;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any data-only value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(Data::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                Ok(Data::Number(Number::Integer(value)))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                if value <= i64::MAX as u64 {
                    Ok(Data::Number(Number::Integer(value as i64)))
                } else {
                    Ok(Data::Number(Number::Float(value as f64)))
                }
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(Data::Number(Number::Float(value)))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
                Ok(Data::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E> {
                Ok(Data::String(value))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Data::Null)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(Data::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Data::Array(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut values = DataMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    values.insert(key, value);
                }
                Ok(Data::Object(values))
            }
        }

        deserializer.deserialize_any(DataVisitor)
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

macro_rules! data_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Data {
                fn from(value: $ty) -> Self {
                    Data::Number(Number::from(value))
                }
            }
        )*
    };
}

data_from_number!(i8, i16, i32, i64, u8, u16, u32, f32, f64);

impl From<Number> for Data {
    fn from(value: Number) -> Self {
        Data::Number(value)
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::String(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::String(value.to_string())
    }
}

impl From<Vec<Data>> for Data {
    fn from(value: Vec<Data>) -> Self {
        Data::Array(value)
    }
}

impl From<DataMap> for Data {
    fn from(value: DataMap) -> Self {
        Data::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_zero() {
        assert!(Number::Float(f64::NAN).same_value_zero(&Number::Float(f64::NAN)));
        assert!(Number::Float(0.0).same_value_zero(&Number::Float(-0.0)));
        assert!(Number::Integer(1).same_value_zero(&Number::Float(1.0)));
        assert!(!Number::Integer(1).same_value_zero(&Number::Integer(2)));
        assert!(Number::Integer(0).same_value_zero(&Number::Float(-0.0)));
        assert!(!Number::Float(0.5).same_value_zero(&Number::Integer(0)));
        assert_eq!(
            Number::Float(-0.0).same_value_key(),
            Number::Integer(0).same_value_key()
        );
    }

    #[test]
    fn test_json_roundtrip_keeps_field_order() {
        let json = r#"{"z":1,"a":[true,null,"x"],"m":2.5}"#;
        let data: Data = serde_json::from_str(json).unwrap();

        let keys: Vec<_> = data.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(serde_json::to_string(&data).unwrap(), json);
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let data: Data = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(data, Data::Number(Number::Float(_))));
    }

    #[test]
    fn test_from_primitives() {
        assert_eq!(Data::from(true), Data::Bool(true));
        assert_eq!(Data::from(42i32), Data::Number(Number::Integer(42)));
        assert_eq!(Data::from(3.5f64), Data::Number(Number::Float(3.5)));
        assert_eq!(Data::from("test"), Data::String("test".to_string()));
    }
}
