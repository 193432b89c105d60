/// Builds a [`Value`](crate::Value) graph from JSON-like syntax.
///
/// Arrays and objects become fresh shared handles; anything else goes through
/// `Value::from`. A bare identifier is cloned first, so an existing `Value`
/// spliced in by name keeps its identity.
///
/// # Examples
///
/// ```rust
/// use replicator::{value, Value};
///
/// let tags = value!(["a", "b"]);
/// let user = value!({
///     "name": "Alice",
///     "age": 30,
///     "nickname": undefined,
///     "tags": tags
/// });
///
/// assert_eq!(user.get("name"), Some(Value::from("Alice")));
/// assert!(user.get("tags").unwrap().same(&tags));
/// ```
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Null
    };

    (undefined) => {
        $crate::Value::Undefined
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::array(::std::vec::Vec::new())
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::array(vec![$($crate::value!($elem)),*])
    };

    ({}) => {
        $crate::Value::from($crate::ObjectMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut object = $crate::ObjectMap::new();
        $(
            object.insert($key.to_string(), $crate::value!($value));
        )*
        $crate::Value::from(object)
    }};

    ($name:ident) => {
        $crate::Value::from(::std::clone::Clone::clone(&$name))
    };

    ($other:expr) => {
        $crate::Value::from($other)
    };
}

/// Builds a plain [`Data`](crate::Data) tree from JSON-like syntax.
///
/// Useful for writing reference tables by hand.
///
/// # Examples
///
/// ```rust
/// use replicator::{data, Replicator};
///
/// let table = data!([{ "me": { "@r": 0 } }]);
/// let value = Replicator::new().decode_data(table).unwrap();
/// assert!(value.get("me").unwrap().same(&value));
/// ```
#[macro_export]
macro_rules! data {
    (null) => {
        $crate::Data::Null
    };

    (true) => {
        $crate::Data::Bool(true)
    };

    (false) => {
        $crate::Data::Bool(false)
    };

    ([]) => {
        $crate::Data::Array(::std::vec::Vec::new())
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Data::Array(vec![$($crate::data!($elem)),*])
    };

    ({}) => {
        $crate::Data::Object($crate::DataMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut object = $crate::DataMap::new();
        $(
            object.insert($key.to_string(), $crate::data!($value));
        )*
        $crate::Data::Object(object)
    }};

    ($other:expr) => {
        $crate::Data::from($other)
    };
}
