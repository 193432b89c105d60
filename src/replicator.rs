//! The [`Replicator`] front end: a transform registry plus a base serializer.

use crate::builtins::builtin_transforms;
use crate::serializer::{BaseSerializer, JsonSerializer};
use crate::transform::{Transform, TransformRegistry};
use crate::{decoder, encoder, Data, ReplicatorOptions, Result, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Encodes value graphs to text and decodes them back.
///
/// A `Replicator` owns an ordered [`TransformRegistry`] and a
/// [`BaseSerializer`]. Encoding walks the graph into a reference table (slot 0
/// holds the root; every shared or cyclic sub-object gets its own slot) and
/// hands that table to the serializer. Decoding reverses both steps.
///
/// # Examples
///
/// ```rust
/// use replicator::{Replicator, Value};
///
/// let replicator = Replicator::new();
///
/// let obj = Value::object([("a", Value::nan())]);
/// obj.insert("self", obj.clone());
///
/// let text = replicator.encode(&obj).unwrap();
/// assert_eq!(text, r#"[{"a":{"@t":"[[NaN]]","@d":""},"self":{"@r":0}}]"#);
///
/// let back = replicator.decode(&text).unwrap();
/// assert!(back.get("a").unwrap().is_nan());
/// assert!(back.get("self").unwrap().same(&back));
/// ```
pub struct Replicator {
    registry: TransformRegistry,
    serializer: Box<dyn BaseSerializer>,
    options: ReplicatorOptions,
}

impl Replicator {
    /// Built-in transforms, every capability, JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ReplicatorOptions::default())
    }

    #[must_use]
    pub fn with_options(options: ReplicatorOptions) -> Self {
        let mut registry = TransformRegistry::new();
        if options.builtins {
            for transform in builtin_transforms(options.capabilities) {
                if let Err(err) = registry.add_shared(transform) {
                    debug!(error = %err, "skipped built-in transform");
                }
            }
        }

        Replicator {
            registry,
            serializer: Box::new(JsonSerializer::default()),
            options,
        }
    }

    /// Replaces the base serializer.
    #[must_use]
    pub fn with_serializer<S: BaseSerializer + 'static>(mut self, serializer: S) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ReplicatorOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TransformRegistry {
        &mut self.registry
    }

    /// Registers a transform after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateTransformType`] if the tag is taken.
    pub fn add_transform<T: Transform + 'static>(&mut self, transform: T) -> Result<&mut Self> {
        self.registry.add(transform)?;
        Ok(self)
    }

    /// Registers several transforms in order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateTransformType`] at the first taken tag;
    /// transforms before it stay registered.
    pub fn add_transforms<I>(&mut self, transforms: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Transform>>,
    {
        self.registry.add_all(transforms)?;
        Ok(self)
    }

    /// Unregisters the transform with `tag`. Does nothing if there is none.
    pub fn remove_transform(&mut self, tag: &str) -> &mut Self {
        self.registry.remove(tag);
        self
    }

    /// Encodes a value graph to text.
    ///
    /// The input graph is never modified.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnsupportedRuntimeType`] for an object-like value no
    ///   transform matches and that is not an array or plain object
    /// - any error a transform's `reduce` returns
    /// - [`crate::Error::Serialization`] if the base serializer fails
    pub fn encode(&self, value: &Value) -> Result<String> {
        let table = self.encode_to_data(value)?;
        self.serializer.serialize(&table)
    }

    /// Encodes a value graph to its reference table without serializing it.
    ///
    /// # Errors
    ///
    /// See [`Replicator::encode`].
    pub fn encode_to_data(&self, value: &Value) -> Result<Data> {
        encoder::encode(value, &self.registry)
    }

    /// Decodes text produced by [`Replicator::encode`].
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Serialization`] if the text cannot be parsed
    /// - [`crate::Error::UnknownTransformType`] for an unregistered tag
    /// - [`crate::Error::MalformedReferenceTable`] for a structurally invalid table
    /// - any error a transform's `reconstruct` returns
    pub fn decode(&self, text: &str) -> Result<Value> {
        let table = self.serializer.deserialize(text)?;
        self.decode_data(table)
    }

    /// Decodes an already parsed reference table.
    ///
    /// # Errors
    ///
    /// See [`Replicator::decode`].
    pub fn decode_data(&self, table: Data) -> Result<Value> {
        decoder::decode(table, &self.registry)
    }
}

impl Default for Replicator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Replicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicator")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
