//! Built-in transforms for values a data-only serializer cannot carry.
//!
//! | Tag | Reduced form | Rebuilt as |
//! |-----|--------------|------------|
//! | `[[NaN]]` | `""` | NaN |
//! | `[[undefined]]` | `""` | [`Value::Undefined`] |
//! | `[[Date]]` | epoch milliseconds | [`Value::Date`] |
//! | `[[RegExp]]` | `{source, flags}` | [`Value::RegExp`] |
//! | `[[Error]]` | `{name, message, stack}` | [`Value::Error`] |
//! | `[[ArrayBuffer]]` | byte array | [`Value::Buffer`] or array |
//! | `[[TypedArray]]` | `{kind, values}` | [`Value::TypedArray`] or array |
//! | `[[Map]]` | `[k0, v0, k1, v1, ...]` | [`Value::Map`] or array of pairs |
//! | `[[Set]]` | member array | [`Value::Set`] or array |
//!
//! Transforms for optional native types consult [`Capabilities`] and fall back
//! to plain arrays instead of failing.

use crate::native::{ElementKind, ErrorObject, Pattern, TypedArray, ValueMap, ValueSet};
use crate::{Capabilities, Error, Kind, Result, Transform, Value};
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Tags of the built-in transforms.
pub mod tags {
    pub const NAN: &str = "[[NaN]]";
    pub const UNDEFINED: &str = "[[undefined]]";
    pub const DATE: &str = "[[Date]]";
    pub const REGEXP: &str = "[[RegExp]]";
    pub const ERROR: &str = "[[Error]]";
    pub const ARRAY_BUFFER: &str = "[[ArrayBuffer]]";
    pub const TYPED_ARRAY: &str = "[[TypedArray]]";
    pub const MAP: &str = "[[Map]]";
    pub const SET: &str = "[[Set]]";
}

/// All built-in transforms, in their registration order.
#[must_use]
pub fn builtin_transforms(capabilities: Capabilities) -> Vec<Arc<dyn Transform>> {
    vec![
        Arc::new(NanTransform),
        Arc::new(UndefinedTransform),
        Arc::new(DateTransform),
        Arc::new(RegExpTransform),
        Arc::new(ErrorTransform::standard()),
        Arc::new(BufferTransform::new(capabilities)),
        Arc::new(TypedArrayTransform::new(capabilities)),
        Arc::new(MapTransform::new(capabilities)),
        Arc::new(SetTransform::new(capabilities)),
    ]
}

fn items_of(tag: &str, data: &Value) -> Result<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items.borrow().clone()),
        other => Err(Error::reconstruct(
            tag,
            format!("expected an array, found {}", other.kind()),
        )),
    }
}

fn field_of(tag: &str, data: &Value, key: &str) -> Result<Value> {
    match data {
        Value::Object(fields) => fields
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::reconstruct(tag, format!("missing field \"{}\"", key))),
        other => Err(Error::reconstruct(
            tag,
            format!("expected an object, found {}", other.kind()),
        )),
    }
}

fn string_field(tag: &str, data: &Value, key: &str) -> Result<String> {
    match field_of(tag, data, key)? {
        Value::String(s) => Ok(s),
        other => Err(Error::reconstruct(
            tag,
            format!("field \"{}\" must be a string, found {}", key, other.kind()),
        )),
    }
}

/// Not-a-number, which JSON would otherwise turn into `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanTransform;

impl Transform for NanTransform {
    fn tag(&self) -> &str {
        tags::NAN
    }

    fn matches(&self, kind: Kind, value: &Value) -> bool {
        kind == Kind::Number && value.is_nan()
    }

    fn reduce(&self, _value: &Value) -> Result<Value> {
        Ok(Value::from(""))
    }

    fn reconstruct(&self, _data: Value) -> Result<Value> {
        Ok(Value::nan())
    }
}

/// The absent value, which base serializers drop or turn into `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UndefinedTransform;

impl Transform for UndefinedTransform {
    fn tag(&self) -> &str {
        tags::UNDEFINED
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Undefined
    }

    fn reduce(&self, _value: &Value) -> Result<Value> {
        Ok(Value::from(""))
    }

    fn reconstruct(&self, _data: Value) -> Result<Value> {
        Ok(Value::Undefined)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateTransform;

impl Transform for DateTransform {
    fn tag(&self) -> &str {
        tags::DATE
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Date
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Date(instant) => Ok(Value::from(instant.borrow().timestamp_millis())),
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let millis = data.as_i64().ok_or_else(|| {
            Error::reconstruct(tags::DATE, "expected integer epoch milliseconds")
        })?;
        let instant = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| Error::reconstruct(tags::DATE, format!("{} is out of range", millis)))?;
        Ok(Value::date(instant))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegExpTransform;

impl Transform for RegExpTransform {
    fn tag(&self) -> &str {
        tags::REGEXP
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::RegExp
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::RegExp(pattern) => {
                let pattern = pattern.borrow();
                Ok(Value::object([
                    ("source", Value::from(pattern.source())),
                    ("flags", Value::from(pattern.flags().to_string())),
                ]))
            }
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let source = string_field(tags::REGEXP, &data, "source")?;
        let flags = string_field(tags::REGEXP, &data, "flags")?;
        let pattern = Pattern::parse(&source, &flags)
            .map_err(|e| Error::reconstruct(tags::REGEXP, e))?;
        Ok(Value::regexp(pattern))
    }
}

/// Builds an error object from its message.
pub type ErrorConstructor = Arc<dyn Fn(String) -> ErrorObject + Send + Sync>;

/// Error values, rebuilt through an explicit name → constructor table.
///
/// A name without a registered constructor is rebuilt as a generic `Error`.
///
/// # Examples
///
/// ```rust
/// use replicator::builtins::{tags, ErrorTransform};
/// use replicator::{ErrorObject, Replicator, Value};
///
/// let mut replicator = Replicator::new();
/// replicator.remove_transform(tags::ERROR);
/// replicator
///     .add_transform(ErrorTransform::standard().with_name("ValidationError"))
///     .unwrap();
///
/// let err = Value::error(ErrorObject::named("ValidationError", "bad input"));
/// let back = replicator.decode(&replicator.encode(&err).unwrap()).unwrap();
/// match back {
///     Value::Error(e) => assert_eq!(e.borrow().name, "ValidationError"),
///     _ => panic!("Expected error"),
/// }
/// ```
#[derive(Clone)]
pub struct ErrorTransform {
    constructors: IndexMap<String, ErrorConstructor>,
}

impl ErrorTransform {
    pub const STANDARD_NAMES: [&'static str; 7] = [
        "Error",
        "EvalError",
        "RangeError",
        "ReferenceError",
        "SyntaxError",
        "TypeError",
        "URIError",
    ];

    /// No named constructors: everything rebuilds as a generic `Error`.
    #[must_use]
    pub fn empty() -> Self {
        ErrorTransform {
            constructors: IndexMap::new(),
        }
    }

    /// Constructors for the standard error names.
    #[must_use]
    pub fn standard() -> Self {
        Self::STANDARD_NAMES
            .into_iter()
            .fold(Self::empty(), |transform, name| transform.with_name(name))
    }

    /// Registers a constructor that produces an error carrying `name`.
    #[must_use]
    pub fn with_name(self, name: &str) -> Self {
        let owned = name.to_string();
        self.with_constructor(name, move |message| ErrorObject::named(owned.clone(), message))
    }

    #[must_use]
    pub fn with_constructor<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn(String) -> ErrorObject + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
        self
    }
}

impl Default for ErrorTransform {
    fn default() -> Self {
        Self::standard()
    }
}

impl Transform for ErrorTransform {
    fn tag(&self) -> &str {
        tags::ERROR
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Error
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Error(err) => {
                let err = err.borrow();
                Ok(Value::object([
                    ("name", Value::from(err.name.as_str())),
                    ("message", Value::from(err.message.as_str())),
                    (
                        "stack",
                        err.stack.as_deref().map_or(Value::Null, Value::from),
                    ),
                ]))
            }
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let name = string_field(tags::ERROR, &data, "name")?;
        let message = string_field(tags::ERROR, &data, "message")?;
        let stack = match field_of(tags::ERROR, &data, "stack") {
            Ok(Value::String(s)) => Some(s),
            _ => None,
        };

        let mut err = match self.constructors.get(&name) {
            Some(constructor) => constructor(message),
            None => {
                debug!(name = %name, "no constructor for error name, using generic Error");
                ErrorObject::new(message)
            }
        };
        err.stack = stack;
        Ok(Value::error(err))
    }
}

/// Fixed-length byte buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferTransform {
    capabilities: Capabilities,
}

impl BufferTransform {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        BufferTransform { capabilities }
    }
}

impl Transform for BufferTransform {
    fn tag(&self) -> &str {
        tags::ARRAY_BUFFER
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Buffer
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Buffer(bytes) => Ok(Value::array(
                bytes.borrow().iter().map(|&b| Value::from(b)).collect(),
            )),
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let items = items_of(tags::ARRAY_BUFFER, &data)?;
        if !self.capabilities.buffers {
            debug!("buffers disabled, keeping bytes as a plain array");
            return Ok(data);
        }

        let bytes = items
            .iter()
            .map(|item| match item.as_i64() {
                // signed bytes are accepted as their two's complement
                Some(n @ -128..=255) => Ok(n as u8),
                _ => Err(Error::reconstruct(
                    tags::ARRAY_BUFFER,
                    format!("{:?} is not a byte", item),
                )),
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(Value::buffer(bytes))
    }
}

/// Numeric arrays of a fixed element kind.
///
/// An unknown kind name, or typed arrays being disabled, yields the plain
/// `values` array. Kind names are only ever matched against [`ElementKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedArrayTransform {
    capabilities: Capabilities,
}

impl TypedArrayTransform {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        TypedArrayTransform { capabilities }
    }
}

impl Transform for TypedArrayTransform {
    fn tag(&self) -> &str {
        tags::TYPED_ARRAY
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::TypedArray
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::TypedArray(array) => {
                let array = array.borrow();
                Ok(Value::object([
                    ("kind", Value::from(array.kind().name())),
                    ("values", Value::array(array.to_values())),
                ]))
            }
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let kind_name = string_field(tags::TYPED_ARRAY, &data, "kind")?;
        let values = field_of(tags::TYPED_ARRAY, &data, "values")?;

        let kind = match kind_name.parse::<ElementKind>() {
            Ok(kind) if self.capabilities.typed_arrays => kind,
            _ => {
                debug!(kind = %kind_name, "typed array kind unavailable, keeping plain values");
                return Ok(values);
            }
        };

        let numbers = items_of(tags::TYPED_ARRAY, &values)?
            .iter()
            .map(|item| {
                item.as_f64().ok_or_else(|| {
                    Error::reconstruct(tags::TYPED_ARRAY, format!("{:?} is not a number", item))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Value::typed_array(TypedArray::from_f64s(kind, &numbers)))
    }
}

/// Ordered key → value maps, flattened to `[k0, v0, k1, v1, ...]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapTransform {
    capabilities: Capabilities,
}

impl MapTransform {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        MapTransform { capabilities }
    }
}

impl Transform for MapTransform {
    fn tag(&self) -> &str {
        tags::MAP
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Map
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Map(map) => {
                let map = map.borrow();
                let mut flattened = Vec::with_capacity(map.len() * 2);
                for (k, v) in map.iter() {
                    flattened.push(k.clone());
                    flattened.push(v.clone());
                }
                Ok(Value::array(flattened))
            }
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let items = items_of(tags::MAP, &data)?;
        if items.len() % 2 != 0 {
            return Err(Error::reconstruct(
                tags::MAP,
                format!("odd number of flattened entries ({})", items.len()),
            ));
        }

        let pairs = items.chunks_exact(2).map(|kv| (kv[0].clone(), kv[1].clone()));
        if self.capabilities.maps {
            Ok(Value::map(pairs.collect::<ValueMap>()))
        } else {
            debug!("maps disabled, rebuilding as a list of pairs");
            Ok(Value::array(
                pairs.map(|(k, v)| Value::array(vec![k, v])).collect(),
            ))
        }
    }
}

/// Unique-value sets, reduced to their members in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetTransform {
    capabilities: Capabilities,
}

impl SetTransform {
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        SetTransform { capabilities }
    }
}

impl Transform for SetTransform {
    fn tag(&self) -> &str {
        tags::SET
    }

    fn matches(&self, kind: Kind, _value: &Value) -> bool {
        kind == Kind::Set
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Set(set) => Ok(Value::array(set.borrow().iter().cloned().collect())),
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        let items = items_of(tags::SET, &data)?;
        if self.capabilities.sets {
            Ok(Value::set(items.into_iter().collect::<ValueSet>()))
        } else {
            debug!("sets disabled, keeping members as a plain array");
            Ok(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_and_tags() {
        let registered: Vec<_> = builtin_transforms(Capabilities::all())
            .iter()
            .map(|t| t.tag().to_string())
            .collect();
        assert_eq!(
            registered,
            vec![
                tags::NAN,
                tags::UNDEFINED,
                tags::DATE,
                tags::REGEXP,
                tags::ERROR,
                tags::ARRAY_BUFFER,
                tags::TYPED_ARRAY,
                tags::MAP,
                tags::SET
            ]
        );
    }

    #[test]
    fn test_nan_only_matches_nan() {
        assert!(NanTransform.matches(Kind::Number, &Value::nan()));
        assert!(!NanTransform.matches(Kind::Number, &Value::from(1.5)));
        assert!(!NanTransform.matches(Kind::Null, &Value::Null));
    }

    #[test]
    fn test_date_reduces_to_millis() {
        let instant = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
        let reduced = DateTransform.reduce(&Value::date(instant)).unwrap();
        assert_eq!(reduced.as_i64(), Some(1_700_000_000_123));

        let back = DateTransform.reconstruct(reduced).unwrap();
        assert_eq!(back, Value::date(instant));
    }

    #[test]
    fn test_date_rejects_non_integer() {
        let err = DateTransform.reconstruct(Value::from("soon")).unwrap_err();
        assert!(matches!(err, Error::Reconstruct { .. }));
    }

    #[test]
    fn test_regexp_reduce_shape() {
        let pattern = Pattern::parse("a+", "mi").unwrap();
        let reduced = RegExpTransform.reduce(&Value::regexp(pattern)).unwrap();
        assert_eq!(reduced.get("source"), Some(Value::from("a+")));
        assert_eq!(reduced.get("flags"), Some(Value::from("im")));
    }

    #[test]
    fn test_error_falls_back_to_generic() {
        let data = Value::object([
            ("name", Value::from("WeirdError")),
            ("message", Value::from("boom")),
            ("stack", Value::Null),
        ]);
        match ErrorTransform::standard().reconstruct(data).unwrap() {
            Value::Error(err) => {
                assert_eq!(err.borrow().name, "Error");
                assert_eq!(err.borrow().message, "boom");
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_known_name_and_stack() {
        let data = Value::object([
            ("name", Value::from("TypeError")),
            ("message", Value::from("not a function")),
            ("stack", Value::from("at main")),
        ]);
        match ErrorTransform::standard().reconstruct(data).unwrap() {
            Value::Error(err) => {
                assert_eq!(
                    *err.borrow(),
                    ErrorObject::named("TypeError", "not a function").with_stack("at main")
                );
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_buffer_rejects_non_bytes() {
        let data = Value::array(vec![Value::from(1), Value::from(999)]);
        assert!(BufferTransform::new(Capabilities::all())
            .reconstruct(data)
            .is_err());
    }

    #[test]
    fn test_typed_array_unknown_kind_degrades() {
        let values = Value::array(vec![Value::from(1), Value::from(2)]);
        let data = Value::object([("kind", Value::from("Function")), ("values", values.clone())]);
        let back = TypedArrayTransform::new(Capabilities::all())
            .reconstruct(data)
            .unwrap();
        assert!(back.same(&values));
    }

    #[test]
    fn test_map_odd_length_rejected() {
        let data = Value::array(vec![Value::from("k")]);
        assert!(MapTransform::new(Capabilities::all()).reconstruct(data).is_err());
    }

    #[test]
    fn test_map_degrades_to_pairs() {
        let data = Value::array(vec![Value::from("a"), Value::from(1), Value::from("b"), Value::from(2)]);
        let back = MapTransform::new(Capabilities::none()).reconstruct(data).unwrap();
        let expected = Value::array(vec![
            Value::array(vec![Value::from("a"), Value::from(1)]),
            Value::array(vec![Value::from("b"), Value::from(2)]),
        ]);
        assert_eq!(back, expected);
    }

    #[test]
    fn test_set_degrades_to_array() {
        let data = Value::array(vec![Value::from(1), Value::from(1)]);
        let back = SetTransform::new(Capabilities::none()).reconstruct(data.clone()).unwrap();
        assert!(back.same(&data));

        match SetTransform::new(Capabilities::all()).reconstruct(data).unwrap() {
            Value::Set(set) => assert_eq!(set.borrow().len(), 1),
            other => panic!("Expected set, got {:?}", other),
        }
    }
}
