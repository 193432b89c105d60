//! Native value types the built-in transforms know how to reduce.
//!
//! - [`Pattern`]: a compiled regular expression with its source and flags
//! - [`ErrorObject`]: a named error with message and optional stack
//! - [`TypedArray`]: a fixed-kind numeric array ([`ElementKind`])
//! - [`ValueMap`] / [`ValueSet`]: insertion-ordered collections keyed by
//!   SameValueZero, so object keys compare by identity

use crate::data::NumberKey;
use crate::{Error, Result, Value};
use indexmap::map::Entry;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::mem;
use std::str::FromStr;

/// Flags of a [`Pattern`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternFlags {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

impl PatternFlags {
    /// Parses a flag string such as `"gi"`. Unknown or repeated flags are rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::PatternFlags;
    ///
    /// let flags = PatternFlags::parse("mg").unwrap();
    /// assert!(flags.global && flags.multiline && !flags.ignore_case);
    /// assert_eq!(flags.to_string(), "gm");
    /// assert!(PatternFlags::parse("gg").is_err());
    /// ```
    pub fn parse(flags: &str) -> Result<Self> {
        let mut parsed = PatternFlags::default();
        for flag in flags.chars() {
            let slot = match flag {
                'g' => &mut parsed.global,
                'i' => &mut parsed.ignore_case,
                'm' => &mut parsed.multiline,
                other => {
                    return Err(Error::custom(format!(
                        "invalid regular expression flag '{}'",
                        other
                    )))
                }
            };
            if *slot {
                return Err(Error::custom(format!(
                    "duplicate regular expression flag '{}'",
                    flag
                )));
            }
            *slot = true;
        }
        Ok(parsed)
    }
}

impl fmt::Display for PatternFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, flag) in [
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
        ] {
            if set {
                write!(f, "{}", flag)?;
            }
        }
        Ok(())
    }
}

/// A compiled regular expression that remembers its source and flags.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: PatternFlags,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source` with the given flags.
    ///
    /// `ignore_case` and `multiline` configure the compiled regex; `global` is
    /// carried along for callers that iterate matches.
    pub fn new(source: &str, flags: PatternFlags) -> Result<Self> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multiline)
            .build()
            .map_err(|e| Error::custom(format!("invalid regular expression: {}", e)))?;
        Ok(Pattern {
            source: source.to_string(),
            flags,
            regex,
        })
    }

    /// Compiles `source` with a flag string such as `"gi"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::Pattern;
    ///
    /// let pattern = Pattern::parse("^ab+c$", "i").unwrap();
    /// assert!(pattern.is_match("ABBC"));
    /// assert_eq!(pattern.to_string(), "/^ab+c$/i");
    /// ```
    pub fn parse(source: &str, flags: &str) -> Result<Self> {
        Self::new(source, PatternFlags::parse(flags)?)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn flags(&self) -> PatternFlags {
        self.flags
    }

    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    #[must_use]
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A named error value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorObject {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorObject {
    /// A generic `Error` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorObject {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

/// Element kind of a [`TypedArray`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl ElementKind {
    pub const ALL: [ElementKind; 9] = [
        ElementKind::Int8,
        ElementKind::Uint8,
        ElementKind::Uint8Clamped,
        ElementKind::Int16,
        ElementKind::Uint16,
        ElementKind::Int32,
        ElementKind::Uint32,
        ElementKind::Float32,
        ElementKind::Float64,
    ];

    /// Wire name of the kind, e.g. `"Float32Array"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ElementKind::Int8 => "Int8Array",
            ElementKind::Uint8 => "Uint8Array",
            ElementKind::Uint8Clamped => "Uint8ClampedArray",
            ElementKind::Int16 => "Int16Array",
            ElementKind::Uint16 => "Uint16Array",
            ElementKind::Int32 => "Int32Array",
            ElementKind::Uint32 => "Uint32Array",
            ElementKind::Float32 => "Float32Array",
            ElementKind::Float64 => "Float64Array",
        }
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::custom(format!("unknown typed array kind \"{}\"", name)))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric array with a fixed element kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedArray {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Uint8Clamped(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Truncates toward zero and wraps modulo 2^bits; non-finite input becomes 0.
fn wrap_integer(value: f64, bits: i32) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(2f64.powi(bits)) as i64
}

// Ties go to the even neighbour.
fn clamp_to_u8(n: f64) -> u8 {
    if n.is_nan() {
        return 0;
    }
    let n = n.clamp(0.0, 255.0);
    let floor = n.floor();
    let rounded = match n - floor {
        d if d > 0.5 => floor + 1.0,
        d if d < 0.5 => floor,
        _ if floor % 2.0 == 0.0 => floor,
        _ => floor + 1.0,
    };
    rounded as u8
}

impl TypedArray {
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            TypedArray::Int8(_) => ElementKind::Int8,
            TypedArray::Uint8(_) => ElementKind::Uint8,
            TypedArray::Uint8Clamped(_) => ElementKind::Uint8Clamped,
            TypedArray::Int16(_) => ElementKind::Int16,
            TypedArray::Uint16(_) => ElementKind::Uint16,
            TypedArray::Int32(_) => ElementKind::Int32,
            TypedArray::Uint32(_) => ElementKind::Uint32,
            TypedArray::Float32(_) => ElementKind::Float32,
            TypedArray::Float64(_) => ElementKind::Float64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TypedArray::Int8(v) => v.len(),
            TypedArray::Uint8(v) | TypedArray::Uint8Clamped(v) => v.len(),
            TypedArray::Int16(v) => v.len(),
            TypedArray::Uint16(v) => v.len(),
            TypedArray::Int32(v) => v.len(),
            TypedArray::Uint32(v) => v.len(),
            TypedArray::Float32(v) => v.len(),
            TypedArray::Float64(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to `Value` numbers, integers staying integers.
    #[must_use]
    pub fn to_values(&self) -> Vec<Value> {
        fn ints<T: Copy + Into<i64>>(items: &[T]) -> Vec<Value> {
            items.iter().map(|&n| Value::from(Into::<i64>::into(n))).collect()
        }

        match self {
            TypedArray::Int8(v) => ints(v),
            TypedArray::Uint8(v) | TypedArray::Uint8Clamped(v) => ints(v),
            TypedArray::Int16(v) => ints(v),
            TypedArray::Uint16(v) => ints(v),
            TypedArray::Int32(v) => ints(v),
            TypedArray::Uint32(v) => ints(v),
            TypedArray::Float32(v) => v.iter().map(|&n| Value::from(n as f64)).collect(),
            TypedArray::Float64(v) => v.iter().map(|&n| Value::from(n)).collect(),
        }
    }

    /// Builds an array of `kind` from numbers, converting the way typed array
    /// constructors do: integer kinds truncate and wrap, `Uint8Clamped` clamps
    /// to `0..=255` and rounds half to even, float kinds round to the element
    /// precision.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::{ElementKind, TypedArray};
    ///
    /// let wrapped = TypedArray::from_f64s(ElementKind::Int8, &[127.0, 128.0, -1.5]);
    /// assert_eq!(wrapped, TypedArray::Int8(vec![127, -128, -1]));
    ///
    /// let clamped = TypedArray::from_f64s(ElementKind::Uint8Clamped, &[-5.0, 300.0, 1.4, 2.5]);
    /// assert_eq!(clamped, TypedArray::Uint8Clamped(vec![0, 255, 1, 2]));
    /// ```
    #[must_use]
    pub fn from_f64s(kind: ElementKind, values: &[f64]) -> Self {
        let wrapped = |bits| values.iter().map(move |&n| wrap_integer(n, bits));
        match kind {
            ElementKind::Int8 => TypedArray::Int8(wrapped(8).map(|n| n as u8 as i8).collect()),
            ElementKind::Uint8 => TypedArray::Uint8(wrapped(8).map(|n| n as u8).collect()),
            ElementKind::Uint8Clamped => TypedArray::Uint8Clamped(
                values.iter().map(|&n| clamp_to_u8(n)).collect(),
            ),
            ElementKind::Int16 => {
                TypedArray::Int16(wrapped(16).map(|n| n as u16 as i16).collect())
            }
            ElementKind::Uint16 => TypedArray::Uint16(wrapped(16).map(|n| n as u16).collect()),
            ElementKind::Int32 => {
                TypedArray::Int32(wrapped(32).map(|n| n as u32 as i32).collect())
            }
            ElementKind::Uint32 => TypedArray::Uint32(wrapped(32).map(|n| n as u32).collect()),
            ElementKind::Float32 => {
                TypedArray::Float32(values.iter().map(|&n| n as f32).collect())
            }
            ElementKind::Float64 => TypedArray::Float64(values.to_vec()),
        }
    }

    /// Element-wise equality where NaN equals NaN.
    #[must_use]
    pub fn same_elements(&self, other: &TypedArray) -> bool {
        if self.kind() != other.kind() || self.len() != other.len() {
            return false;
        }
        self.to_values()
            .iter()
            .zip(other.to_values().iter())
            .all(|(a, b)| a.same(b))
    }
}

/// Hashable SameValueZero form of a [`Value`]: object-like values key by
/// identity, numbers by their canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum MemberKey {
    Undefined,
    Null,
    Bool(bool),
    Number(NumberKey),
    String(String),
    Identity(usize),
}

impl MemberKey {
    fn of(value: &Value) -> Self {
        let value = value.resolved();
        if let Some(id) = value.identity() {
            return MemberKey::Identity(id);
        }
        match value {
            Value::Null => MemberKey::Null,
            Value::Bool(b) => MemberKey::Bool(b),
            Value::Number(n) => MemberKey::Number(n.same_value_key()),
            Value::String(s) => MemberKey::String(s),
            Value::Pending(pending) => MemberKey::Identity(pending.id()),
            _ => MemberKey::Undefined,
        }
    }
}

/// An insertion-ordered map with SameValueZero key equality.
///
/// Primitive keys compare by value (NaN matches NaN); object-like keys compare
/// by identity.
///
/// # Examples
///
/// ```rust
/// use replicator::{Value, ValueMap};
///
/// let key = Value::object([("id", Value::from(1))]);
/// let mut map = ValueMap::new();
/// map.insert(key.clone(), Value::from("first"));
/// map.insert(Value::object([("id", Value::from(1))]), Value::from("other"));
///
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get(&key).and_then(|v| v.as_str().map(String::from)), Some("first".into()));
/// ```
#[derive(Clone, Default)]
pub struct ValueMap {
    entries: IndexMap<MemberKey, (Value, Value)>,
}

impl ValueMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        ValueMap {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Inserts or replaces; a replaced key keeps its position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.entries.entry(MemberKey::of(&key)) {
            Entry::Occupied(mut slot) => Some(mem::replace(&mut slot.get_mut().1, value)),
            Entry::Vacant(slot) => {
                slot.insert((key, value));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&MemberKey::of(key)).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&MemberKey::of(key))
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.shift_remove(&MemberKey::of(key)).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(_, v)| v)
    }

    /// Lets `visit` rewrite every key and value, then rehashes in the same order.
    pub(crate) fn rekey_with<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut Value),
    {
        let entries = mem::take(&mut self.entries);
        self.entries.reserve(entries.len());
        for (mut key, mut value) in entries.into_values() {
            visit(&mut key);
            visit(&mut value);
            self.insert(key, value);
        }
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl fmt::Debug for ValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An insertion-ordered set with SameValueZero membership.
#[derive(Clone, Default)]
pub struct ValueSet {
    members: IndexMap<MemberKey, Value>,
}

impl ValueSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an equal member was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        match self.members.entry(MemberKey::of(&value)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.members.contains_key(&MemberKey::of(value))
    }

    pub fn remove(&mut self, value: &Value) -> bool {
        self.members.shift_remove(&MemberKey::of(value)).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.members.values()
    }

    /// Lets `visit` rewrite every member, then rehashes in the same order.
    pub(crate) fn rekey_with<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut Value),
    {
        let members = mem::take(&mut self.members);
        self.members.reserve(members.len());
        for mut member in members.into_values() {
            visit(&mut member);
            self.insert(member);
        }
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
