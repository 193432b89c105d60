//! In-memory value graphs.
//!
//! This module provides [`Value`], the dynamically-typed graph the encoder walks
//! and the decoder rebuilds. Unlike [`crate::Data`], a `Value` can share
//! sub-objects and contain cycles: every object-like variant holds a
//! reference-counted handle, and the handle's allocation is the value's identity.
//!
//! ## Core Types
//!
//! - [`Value`]: any value, primitive or object-like
//! - [`Shared`]: an `Rc<RefCell<T>>` handle with identity helpers
//! - [`Kind`]: the runtime kind a transform predicate is dispatched on
//! - [`CustomValue`]: the trait caller-defined opaque values implement
//! - [`Pending`]: a deferred placeholder the decoder hands to reconstructors
//!
//! ## Usage Patterns
//!
//! ### Building a cycle
//!
//! ```rust
//! use replicator::Value;
//!
//! let node = Value::object([("name", Value::from("root"))]);
//! node.insert("self", node.clone());
//!
//! let inner = node.get("self").unwrap();
//! assert!(inner.same(&node));
//! ```
//!
//! ### Comparing graphs
//!
//! `PartialEq` on `Value` is structural and cycle-aware, and treats NaN as equal
//! to NaN. Use [`Value::same`] for identity.
//!
//! ```rust
//! use replicator::Value;
//!
//! let a = Value::array(vec![Value::from(1), Value::nan()]);
//! let b = Value::array(vec![Value::from(1), Value::nan()]);
//! assert_eq!(a, b);
//! assert!(!a.same(&b));
//! ```

use crate::native::{ErrorObject, Pattern, TypedArray, ValueMap, ValueSet};
use crate::{Number, ObjectMap};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// A shared, interior-mutable handle. Two handles are the same object exactly
/// when they point at the same allocation.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }

    /// Immutably borrows the wrapped value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the wrapped value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation, stable for as long as any handle lives.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.0.try_borrow().ok()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_borrow() {
            Some(inner) => inner.fmt(f),
            None => f.write_str("<borrowed>"),
        }
    }
}

/// A caller-defined opaque value.
///
/// Implementors are reduced and rebuilt by a registered [`crate::Transform`].
/// Values stored inside a custom value should live in a `RefCell` so that
/// [`CustomValue::for_each_child_mut`] can hand them out: the decoder uses it
/// to replace [`Pending`] placeholders once a self-referencing value has been
/// rebuilt.
///
/// # Examples
///
/// ```rust
/// use replicator::{CustomValue, Value};
/// use std::any::Any;
/// use std::cell::RefCell;
///
/// #[derive(Debug)]
/// struct Node {
///     label: String,
///     next: RefCell<Value>,
/// }
///
/// impl CustomValue for Node {
///     fn type_name(&self) -> &str {
///         "Node"
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn for_each_child_mut(&self, visit: &mut dyn FnMut(&mut Value)) {
///         visit(&mut self.next.borrow_mut());
///     }
/// }
///
/// let node = Value::custom(Node { label: "a".into(), next: RefCell::new(Value::Null) });
/// assert_eq!(node.downcast_ref::<Node>().map(|n| n.label.as_str()), Some("a"));
/// ```
pub trait CustomValue: fmt::Debug {
    /// Name used in diagnostics.
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Visits every `Value` stored inside this value.
    fn for_each_child_mut(&self, _visit: &mut dyn FnMut(&mut Value)) {}
}

/// A placeholder for a value whose reconstruction has not finished yet.
///
/// When a transformed value's reduced form refers back to the value itself,
/// the decoder cannot hand the reconstructor the finished object. It hands it a
/// `Pending` instead. The placeholder is filled exactly once, as soon as the
/// reconstructor returns, and the decoder then replaces every placeholder it
/// can reach with the real value.
#[derive(Clone)]
pub struct Pending {
    slot: usize,
    cell: Rc<OnceCell<Value>>,
}

impl Pending {
    pub(crate) fn new(slot: usize) -> Self {
        Pending {
            slot,
            cell: Rc::new(OnceCell::new()),
        }
    }

    /// Reference-table slot this placeholder stands for.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The resolved value, once available.
    #[must_use]
    pub fn get(&self) -> Option<&Value> {
        self.cell.get()
    }

    /// Returns `false` if the placeholder was already filled.
    pub(crate) fn fill(&self, value: Value) -> bool {
        self.cell.set(value).is_ok()
    }

    fn ptr_eq(&self, other: &Pending) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.cell) as usize
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => value.fmt(f),
            None => write!(f, "<pending slot {}>", self.slot),
        }
    }
}

/// Runtime kind of a [`Value`], as seen by transform predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Date,
    RegExp,
    Error,
    Buffer,
    TypedArray,
    Map,
    Set,
    Custom,
    Pending,
}

impl Kind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Kind::Undefined => "undefined",
            Kind::Null => "null",
            Kind::Bool => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Date => "date",
            Kind::RegExp => "regexp",
            Kind::Error => "error",
            Kind::Buffer => "buffer",
            Kind::TypedArray => "typed array",
            Kind::Map => "map",
            Kind::Set => "set",
            Kind::Custom => "custom",
            Kind::Pending => "pending",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any value in an object graph.
///
/// Primitive variants are plain data. Every other variant except
/// [`Value::Pending`] is object-like: cloning it clones the handle, not the
/// contents, so clones share identity.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Shared<Vec<Value>>),
    Object(Shared<ObjectMap>),
    Date(Shared<DateTime<Utc>>),
    RegExp(Shared<Pattern>),
    Error(Shared<ErrorObject>),
    Buffer(Shared<Vec<u8>>),
    TypedArray(Shared<TypedArray>),
    Map(Shared<ValueMap>),
    Set(Shared<ValueSet>),
    Custom(Rc<dyn CustomValue>),
    Pending(Pending),
}

impl Value {
    #[must_use]
    pub fn nan() -> Self {
        Value::Number(Number::Float(f64::NAN))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Shared::new(items))
    }

    /// Builds a plain object from key/value pairs, keeping their order.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Shared::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn date(instant: DateTime<Utc>) -> Self {
        Value::Date(Shared::new(instant))
    }

    pub fn regexp(pattern: Pattern) -> Self {
        Value::RegExp(Shared::new(pattern))
    }

    pub fn error(error: ErrorObject) -> Self {
        Value::Error(Shared::new(error))
    }

    pub fn buffer(bytes: Vec<u8>) -> Self {
        Value::Buffer(Shared::new(bytes))
    }

    pub fn typed_array(array: TypedArray) -> Self {
        Value::TypedArray(Shared::new(array))
    }

    pub fn map(map: ValueMap) -> Self {
        Value::Map(Shared::new(map))
    }

    pub fn set(set: ValueSet) -> Self {
        Value::Set(Shared::new(set))
    }

    pub fn custom<T: CustomValue + 'static>(value: T) -> Self {
        Value::Custom(Rc::new(value))
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Value::Undefined => Kind::Undefined,
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
            Value::Date(_) => Kind::Date,
            Value::RegExp(_) => Kind::RegExp,
            Value::Error(_) => Kind::Error,
            Value::Buffer(_) => Kind::Buffer,
            Value::TypedArray(_) => Kind::TypedArray,
            Value::Map(_) => Kind::Map,
            Value::Set(_) => Kind::Set,
            Value::Custom(_) => Kind::Custom,
            Value::Pending(_) => Kind::Pending,
        }
    }

    /// Identity of an object-like value; `None` for primitives and placeholders.
    #[must_use]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(h) => Some(h.id()),
            Value::Object(h) => Some(h.id()),
            Value::Date(h) => Some(h.id()),
            Value::RegExp(h) => Some(h.id()),
            Value::Error(h) => Some(h.id()),
            Value::Buffer(h) => Some(h.id()),
            Value::TypedArray(h) => Some(h.id()),
            Value::Map(h) => Some(h.id()),
            Value::Set(h) => Some(h.id()),
            Value::Custom(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_object_like(&self) -> bool {
        self.identity().is_some()
    }

    #[inline]
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    /// Sees through a filled [`Value::Pending`]; any other value is returned as a cheap clone.
    #[must_use]
    pub fn resolved(&self) -> Value {
        match self {
            Value::Pending(pending) => match pending.get() {
                Some(value) => value.resolved(),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.as_i64())
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(|n| n.as_f64())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Shared<Vec<Value>>> {
        match self {
            Value::Array(h) => Some(h),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Shared<ObjectMap>> {
        match self {
            Value::Object(h) => Some(h),
            _ => None,
        }
    }

    /// Downcasts a [`Value::Custom`] to its concrete type.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Custom(rc) => rc.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Field of a plain object, cloned out of the handle.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|h| h.borrow().get(key).cloned())
    }

    /// Element of an array, cloned out of the handle.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Value> {
        self.as_array().and_then(|h| h.borrow().get(index).cloned())
    }

    /// Sets a field on a plain object. Returns `false` if this is not an object.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(h) => {
                h.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Appends to an array. Returns `false` if this is not an array.
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(h) => {
                h.borrow_mut().push(value);
                true
            }
            _ => false,
        }
    }

    /// Identity for object-like values, SameValueZero for primitives.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::Value;
    ///
    /// let obj = Value::object([("a", Value::from(1))]);
    /// assert!(obj.same(&obj.clone()));
    /// assert!(!obj.same(&Value::object([("a", Value::from(1))])));
    /// assert!(Value::nan().same(&Value::nan()));
    /// ```
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        let (a, b) = (self.resolved(), other.resolved());
        match (&a, &b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x.same_value_zero(y),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Pending(x), Value::Pending(y)) => x.ptr_eq(y),
            _ => match (a.identity(), b.identity()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Structural, cycle-aware equality. NaN equals NaN; custom values compare by identity.
    #[must_use]
    pub fn deep_eq(&self, other: &Value) -> bool {
        DeepEq::default().eq(self, other)
    }
}

#[derive(Default)]
struct DeepEq {
    assumed: HashSet<(usize, usize)>,
}

impl DeepEq {
    fn eq(&mut self, left: &Value, right: &Value) -> bool {
        let (left, right) = (left.resolved(), right.resolved());
        if let (Some(a), Some(b)) = (left.identity(), right.identity()) {
            // Pairs already under comparison are assumed equal; a mismatch shows up elsewhere.
            if a == b || !self.assumed.insert((a, b)) {
                return true;
            }
        }

        match (&left, &right) {
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.eq(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, x)| b.get(k).is_some_and(|y| self.eq(x, y)))
            }
            (Value::Date(a), Value::Date(b)) => *a.borrow() == *b.borrow(),
            (Value::RegExp(a), Value::RegExp(b)) => *a.borrow() == *b.borrow(),
            (Value::Error(a), Value::Error(b)) => *a.borrow() == *b.borrow(),
            (Value::Buffer(a), Value::Buffer(b)) => *a.borrow() == *b.borrow(),
            (Value::TypedArray(a), Value::TypedArray(b)) => a.borrow().same_elements(&b.borrow()),
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| self.eq(ka, kb) && self.eq(va, vb))
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.eq(x, y))
            }
            (Value::Custom(_), Value::Custom(_)) => false,
            _ => left.same(&right),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.deep_eq(other)
    }
}

thread_local! {
    static PRINTING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Prints object-like values at most once per nesting path; a revisit prints `[Circular]`.
fn fmt_guarded(
    id: usize,
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let entered = PRINTING.with(|p| p.borrow_mut().insert(id));
    if !entered {
        return f.write_str("[Circular]");
    }
    let result = body(f);
    PRINTING.with(|p| p.borrow_mut().remove(&id));
    result
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(h) => fmt_guarded(h.id(), f, |f| match h.try_borrow() {
                Some(items) => f.debug_list().entries(items.iter()).finish(),
                None => f.write_str("[<borrowed>]"),
            }),
            Value::Object(h) => fmt_guarded(h.id(), f, |f| match h.try_borrow() {
                Some(fields) => f.debug_map().entries(fields.iter()).finish(),
                None => f.write_str("{<borrowed>}"),
            }),
            Value::Date(h) => write!(f, "Date({:?})", h),
            Value::RegExp(h) => write!(f, "{:?}", h),
            Value::Error(h) => write!(f, "{:?}", h),
            Value::Buffer(h) => write!(f, "Buffer({:?})", h),
            Value::TypedArray(h) => write!(f, "{:?}", h),
            Value::Map(h) => fmt_guarded(h.id(), f, |f| write!(f, "Map{:?}", h)),
            Value::Set(h) => fmt_guarded(h.id(), f, |f| write!(f, "Set{:?}", h)),
            Value::Custom(rc) => {
                let id = Rc::as_ptr(rc) as *const () as usize;
                fmt_guarded(id, f, |f| rc.fmt(f))
            }
            Value::Pending(p) => p.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )*
    };
}

value_from_number!(i8, i16, i32, i64, u8, u16, u32, f32, f64);

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::array(value)
    }
}

impl From<ObjectMap> for Value {
    fn from(value: ObjectMap) -> Self {
        Value::Object(Shared::new(value))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::date(value)
    }
}

impl From<Pattern> for Value {
    fn from(value: Pattern) -> Self {
        Value::regexp(value)
    }
}

impl From<ErrorObject> for Value {
    fn from(value: ErrorObject) -> Self {
        Value::error(value)
    }
}

impl From<TypedArray> for Value {
    fn from(value: TypedArray) -> Self {
        Value::typed_array(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::map(value)
    }
}

impl From<ValueSet> for Value {
    fn from(value: ValueSet) -> Self {
        Value::set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_identity() {
        let obj = Value::object([("a", Value::from(1))]);
        let copy = obj.clone();
        assert!(obj.same(&copy));
        assert_eq!(obj.identity(), copy.identity());

        copy.insert("b", Value::from(2));
        assert_eq!(obj.get("b"), Some(Value::from(2)));
    }

    #[test]
    fn test_primitives_have_no_identity() {
        assert!(Value::from(1).identity().is_none());
        assert!(Value::from("x").identity().is_none());
        assert!(Value::Undefined.identity().is_none());
        assert!(!Value::Null.is_object_like());
    }

    #[test]
    fn test_deep_eq_handles_cycles() {
        let a = Value::object([("name", Value::from("n"))]);
        a.insert("self", a.clone());
        let b = Value::object([("name", Value::from("n"))]);
        b.insert("self", b.clone());

        assert!(a.deep_eq(&b));

        b.insert("name", Value::from("m"));
        assert!(!a.deep_eq(&b));
    }

    #[test]
    fn test_deep_eq_nan() {
        assert_eq!(Value::nan(), Value::nan());
        assert_ne!(Value::nan(), Value::Null);
        assert_ne!(Value::Undefined, Value::Null);
    }

    #[test]
    fn test_debug_prints_circular_marker() {
        let list = Value::array(vec![Value::from(1)]);
        list.push(list.clone());
        assert_eq!(format!("{:?}", list), "[1, [Circular]]");
    }

    #[test]
    fn test_pending_resolves_once() {
        let pending = Pending::new(3);
        assert!(pending.get().is_none());
        assert!(pending.fill(Value::from(1)));
        assert!(!pending.fill(Value::from(2)));

        let value = Value::Pending(pending);
        assert_eq!(value.resolved().as_i64(), Some(1));
        assert!(value.same(&Value::from(1)));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Kind::TypedArray.to_string(), "typed array");
        assert_eq!(Value::from(true).kind(), Kind::Bool);
        assert_eq!(Value::nan().kind(), Kind::Number);
    }
}
