//! Configuration for a [`crate::Replicator`].
//!
//! - [`ReplicatorOptions`]: whether built-in transforms are registered, and with
//!   which capabilities
//! - [`Capabilities`]: which native collection types decoding may produce
//!
//! When a capability is switched off, the matching built-in transform still
//! decodes its data but degrades to a plain array (or list of pairs for maps)
//! instead of building the native type.
//!
//! ## Examples
//!
//! ```rust
//! use replicator::{Capabilities, Replicator, ReplicatorOptions};
//!
//! let options = ReplicatorOptions::new()
//!     .with_capabilities(Capabilities::all().with_maps(false));
//! let replicator = Replicator::with_options(options);
//!
//! let value = replicator.decode(r#"[{"@t":"[[Map]]","@d":["k","v"]}]"#).unwrap();
//! assert!(value.as_array().is_some());
//! ```

/// Native types a decoder is allowed to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub buffers: bool,
    pub typed_arrays: bool,
    pub maps: bool,
    pub sets: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl Capabilities {
    #[must_use]
    pub const fn all() -> Self {
        Capabilities {
            buffers: true,
            typed_arrays: true,
            maps: true,
            sets: true,
        }
    }

    /// Plain arrays only.
    #[must_use]
    pub const fn none() -> Self {
        Capabilities {
            buffers: false,
            typed_arrays: false,
            maps: false,
            sets: false,
        }
    }

    #[must_use]
    pub fn with_buffers(mut self, enabled: bool) -> Self {
        self.buffers = enabled;
        self
    }

    #[must_use]
    pub fn with_typed_arrays(mut self, enabled: bool) -> Self {
        self.typed_arrays = enabled;
        self
    }

    #[must_use]
    pub fn with_maps(mut self, enabled: bool) -> Self {
        self.maps = enabled;
        self
    }

    #[must_use]
    pub fn with_sets(mut self, enabled: bool) -> Self {
        self.sets = enabled;
        self
    }
}

/// Configuration options for a [`crate::Replicator`].
///
/// # Examples
///
/// ```rust
/// use replicator::{Replicator, ReplicatorOptions};
///
/// let bare = Replicator::with_options(ReplicatorOptions::new().without_builtins());
/// assert!(bare.registry().is_empty());
///
/// let full = Replicator::new();
/// assert_eq!(full.registry().len(), 9);
/// ```
#[derive(Clone, Debug)]
pub struct ReplicatorOptions {
    pub capabilities: Capabilities,
    pub builtins: bool,
}

impl Default for ReplicatorOptions {
    fn default() -> Self {
        ReplicatorOptions {
            capabilities: Capabilities::default(),
            builtins: true,
        }
    }
}

impl ReplicatorOptions {
    /// Creates default options (built-in transforms on, every capability on).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Starts from an empty registry.
    #[must_use]
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }
}
