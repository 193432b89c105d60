//! Transforms and the registry that orders them.
//!
//! A [`Transform`] reduces a value the base serializer cannot represent to one
//! it can, and rebuilds the original from that reduced form. The
//! [`TransformRegistry`] keeps transforms in registration order (the first
//! transform whose predicate matches wins during encoding) and indexes them by
//! tag (used during decoding).
//!
//! ## Examples
//!
//! ```rust
//! use replicator::{FnTransform, Kind, TransformRegistry, Value};
//!
//! let upper = FnTransform::new("upper")
//!     .matching(|kind, value| kind == Kind::String && value.as_str() == Some("HELLO"))
//!     .reduce_with(|_| Ok(Value::from("hello")))
//!     .reconstruct_with(|data| Ok(Value::from(data.as_str().unwrap_or("").to_uppercase())));
//!
//! let mut registry = TransformRegistry::new();
//! registry.add(upper).unwrap();
//! assert!(registry.add(FnTransform::new("upper")).is_err());
//! assert_eq!(registry.len(), 1);
//! ```

use crate::{Error, Kind, Result, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A rule reducing one family of values to serializable data and back.
///
/// `reduce` may return object-like values, including the original value
/// itself; the encoder walks the reduced form like any other part of the
/// graph, so shared references and cycles inside it are preserved. The data
/// handed to `reconstruct` is the fully decoded reduced form. When the reduced
/// form referred back to the value being rebuilt, that position holds a
/// [`Value::Pending`] which the decoder replaces once `reconstruct` returns.
///
/// A new primitive or a fresh container in the reduced form is matched against
/// the registry again. If it matches the same transform, encoding recurses
/// without bound and overflows the stack instead of returning an error, so a
/// predicate must reject its own reduced forms.
pub trait Transform: Send + Sync {
    /// Unique type tag written into envelopes.
    fn tag(&self) -> &str;

    fn matches(&self, kind: Kind, value: &Value) -> bool;

    fn reduce(&self, value: &Value) -> Result<Value>;

    fn reconstruct(&self, data: Value) -> Result<Value>;
}

type Predicate = dyn Fn(Kind, &Value) -> bool + Send + Sync;
type Reducer = dyn Fn(&Value) -> Result<Value> + Send + Sync;
type Reconstructor = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// A transform assembled from closures.
///
/// Without [`FnTransform::matching`] the transform never matches; without
/// [`FnTransform::reconstruct_with`] the reduced data is returned unchanged.
pub struct FnTransform {
    tag: String,
    predicate: Option<Box<Predicate>>,
    reducer: Option<Box<Reducer>>,
    reconstructor: Option<Box<Reconstructor>>,
}

impl FnTransform {
    pub fn new(tag: impl Into<String>) -> Self {
        FnTransform {
            tag: tag.into(),
            predicate: None,
            reducer: None,
            reconstructor: None,
        }
    }

    #[must_use]
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Kind, &Value) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn reduce_with<F>(mut self, reducer: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.reducer = Some(Box::new(reducer));
        self
    }

    #[must_use]
    pub fn reconstruct_with<F>(mut self, reconstructor: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.reconstructor = Some(Box::new(reconstructor));
        self
    }
}

impl Transform for FnTransform {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn matches(&self, kind: Kind, value: &Value) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(kind, value))
    }

    fn reduce(&self, value: &Value) -> Result<Value> {
        match &self.reducer {
            Some(reducer) => reducer(value),
            None => Err(Error::custom(format!(
                "transform \"{}\" has no reducer",
                self.tag
            ))),
        }
    }

    fn reconstruct(&self, data: Value) -> Result<Value> {
        match &self.reconstructor {
            Some(reconstructor) => reconstructor(data),
            None => Ok(data),
        }
    }
}

impl fmt::Debug for FnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").field("tag", &self.tag).finish()
    }
}

/// Ordered, tag-unique collection of transforms.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: IndexMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTransformType`] if the tag is already registered.
    pub fn add<T: Transform + 'static>(&mut self, transform: T) -> Result<&mut Self> {
        self.add_shared(Arc::new(transform))
    }

    /// Appends an already shared transform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTransformType`] if the tag is already registered.
    pub fn add_shared(&mut self, transform: Arc<dyn Transform>) -> Result<&mut Self> {
        let tag = transform.tag().to_string();
        if self.transforms.contains_key(&tag) {
            return Err(Error::DuplicateTransformType(tag));
        }
        debug!(tag = %tag, position = self.transforms.len(), "registered transform");
        self.transforms.insert(tag, transform);
        Ok(self)
    }

    /// Appends transforms in order, stopping at the first duplicate tag.
    ///
    /// Transforms registered before the duplicate stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTransformType`] for the first tag already present.
    pub fn add_all<I>(&mut self, transforms: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Transform>>,
    {
        for transform in transforms {
            self.add_shared(transform)?;
        }
        Ok(self)
    }

    /// Removes the transform registered under `tag`, keeping the order of the rest.
    pub fn remove(&mut self, tag: &str) -> Option<Arc<dyn Transform>> {
        let removed = self.transforms.shift_remove(tag);
        if removed.is_some() {
            debug!(tag, "removed transform");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&dyn Transform> {
        self.transforms.get(tag).map(|t| t.as_ref())
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.transforms.contains_key(tag)
    }

    /// Transforms in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Transform> {
        self.transforms.values().map(|t| t.as_ref())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// The earliest-registered transform whose predicate accepts `value`.
    pub(crate) fn find_match(&self, value: &Value) -> Option<&dyn Transform> {
        let kind = value.kind();
        self.iter().find(|t| t.matches(kind, value))
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}
