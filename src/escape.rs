//! Reserved wire keys and the escaping rule that keeps user keys apart from them.
//!
//! Envelopes are objects carrying [`TYPE_KEY`] and [`DATA_KEY`]; reference
//! markers are objects carrying [`REF_KEY`]. A user object may legitimately have
//! a field spelled like one of those keys, so on the way out every key made of
//! zero or more [`STRIP_MARKER`]s followed by a reserved key gets one more
//! marker prepended, and on the way in exactly one is removed.
//!
//! ```rust
//! use replicator::escape::{escape_key, unescape_key};
//!
//! assert_eq!(escape_key("@t"), "#@t");
//! assert_eq!(escape_key("##@r"), "###@r");
//! assert_eq!(escape_key("name"), "name");
//! assert_eq!(unescape_key("#@d"), "@d");
//! ```

use std::borrow::Cow;

/// Key holding a transform tag inside an envelope.
pub const TYPE_KEY: &str = "@t";

/// Key holding the reduced data inside an envelope.
pub const DATA_KEY: &str = "@d";

/// Key holding a slot index inside a reference marker.
pub const REF_KEY: &str = "@r";

/// Prefix character used for escaping.
pub const STRIP_MARKER: char = '#';

const RESERVED_KEYS: [&str; 3] = [TYPE_KEY, DATA_KEY, REF_KEY];

/// Returns `true` if `key` is a reserved key preceded by zero or more strip markers.
#[must_use]
pub fn requires_escaping(key: &str) -> bool {
    RESERVED_KEYS.contains(&key.trim_start_matches(STRIP_MARKER))
}

/// Escapes a user key for writing into encoded data.
#[must_use]
pub fn escape_key(key: &str) -> Cow<'_, str> {
    if requires_escaping(key) {
        let mut escaped = String::with_capacity(key.len() + 1);
        escaped.push(STRIP_MARKER);
        escaped.push_str(key);
        Cow::Owned(escaped)
    } else {
        Cow::Borrowed(key)
    }
}

/// Reverses [`escape_key`].
#[must_use]
pub fn unescape_key(key: &str) -> Cow<'_, str> {
    if requires_escaping(key) {
        if let Some(stripped) = key.strip_prefix(STRIP_MARKER) {
            return Cow::Borrowed(stripped);
        }
    }
    Cow::Borrowed(key)
}
