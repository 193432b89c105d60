//! Error types for graph encoding and decoding.
//!
//! Every fallible operation in this crate returns [`Result`]. A failure aborts
//! the whole `encode`/`decode` call; no partially built table or graph is ever
//! handed back.
//!
//! ## Error Categories
//!
//! - **Registry errors**: a transform tag registered twice
//! - **Decode errors**: a tag with no registered transform, or a reference table
//!   whose structure cannot have been produced by the encoder
//! - **Transform errors**: a reconstructor received data of the wrong shape
//! - **Serializer errors**: the base serializer rejected its input
//!
//! ## Examples
//!
//! ```rust
//! use replicator::{Error, Replicator};
//!
//! let replicator = Replicator::new();
//! let result = replicator.decode(r#"[{"@t":"[[Nope]]","@d":""}]"#);
//!
//! assert!(matches!(result, Err(Error::UnknownTransformType(tag)) if tag == "[[Nope]]"));
//! ```

use crate::value::Kind;
use std::fmt;
use thiserror::Error;

/// Represents all possible errors that can occur while encoding or decoding a graph.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A transform with this tag is already registered.
    #[error("transform with type \"{0}\" was already added")]
    DuplicateTransformType(String),

    /// The encoded data names a transform tag the registry does not know.
    #[error("can't find transform for \"{0}\" type")]
    UnknownTransformType(String),

    /// An object-like value that neither a transform nor plain traversal can represent.
    #[error("unsupported runtime type: {0}")]
    UnsupportedRuntimeType(Kind),

    /// The reference table is structurally invalid.
    #[error("malformed reference table: {0}")]
    MalformedReferenceTable(String),

    /// A reconstructor was handed data it cannot rebuild a value from.
    #[error("transform \"{tag}\" cannot reconstruct value: {message}")]
    Reconstruct { tag: String, message: String },

    /// The base serializer failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a [`Error::MalformedReferenceTable`] error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::Error;
    ///
    /// let err = Error::malformed("slot 3 does not exist");
    /// assert!(err.to_string().contains("slot 3"));
    /// ```
    pub fn malformed<T: fmt::Display>(msg: T) -> Self {
        Error::MalformedReferenceTable(msg.to_string())
    }

    /// Creates a [`Error::Reconstruct`] error for the transform registered under `tag`.
    pub fn reconstruct<T: fmt::Display>(tag: &str, msg: T) -> Self {
        Error::Reconstruct {
            tag: tag.to_string(),
            message: msg.to_string(),
        }
    }

    /// Creates a serializer error.
    pub fn serialization<T: fmt::Display>(msg: T) -> Self {
        Error::Serialization(msg.to_string())
    }

    /// Creates a custom error with a display message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use replicator::Error;
    ///
    /// let err = Error::custom("something went wrong");
    /// assert!(err.to_string().contains("something went wrong"));
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for reader/writer failures.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
