use crate::common::Value;
use indexmap::IndexMap;

/// An insertion-ordered option map attached to field and group edits.
///
/// # Purpose
/// Carries the per-field options of a subcommand (validation keywords such as
/// `min_length` or `comment`, the `null` nullability flag, and reverser
/// metadata such as `from`). The schema compiler consumes the keys its type
/// family recognizes and ignores the rest.
///
/// # Characteristics
/// - **Ordered**: Keys keep their insertion order
/// - **Uninterpreted**: Values are plain [`Value`]s; predicates run at compile time
/// - **Cloneable**: Cheap to clone and compare in tests
///
/// # Usage
/// Build literals with the [`opts!`] macro:
/// ```text
/// let o = opts! { min_length: 2, comment: "display name" };
/// let strict = opts! { null: false };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldOptions {
    entries: IndexMap<String, Value>,
}

impl FieldOptions {
    /// Creates an empty option map.
    pub fn new() -> Self {
        FieldOptions::default()
    }

    /// Returns true if no options are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of options set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts an option, replacing any previous value for the key.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    /// Builder-style insert for chaining.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value for a key, if set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns true if the key is set.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Returns a copy with the given keys removed.
    pub fn without(&self, keys: &[&str]) -> FieldOptions {
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        FieldOptions { entries }
    }

    /// Whether the compiled node should accept null.
    ///
    /// Every node defaults to nullable unless `null: false` is set.
    pub fn nullable(&self) -> bool {
        !matches!(self.get("null"), Some(Value::Bool(false)))
    }

    /// Returns the `comment` option, if set to a string.
    pub fn comment(&self) -> Option<&str> {
        self.get("comment").and_then(|v| v.as_str())
    }
}

/// Creates a [`FieldOptions`] literal.
///
/// Keys are written bare, values can be literals, arrays, nested objects or
/// parenthesized expressions, mirroring the document-literal macro style of
/// the underlying value model.
///
/// # Usage
///
/// ```ignore
/// use strata::opts;
///
/// let o = opts! {
///     min_length: 2,
///     max_length: 120,
///     comment: "display name",
/// };
/// let e = opts! { values: ["pending", "active", "done"] };
/// ```
#[macro_export]
macro_rules! opts {
    () => {
        $crate::migration::FieldOptions::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::opts_value;

            let mut options = $crate::migration::FieldOptions::new();
            $(
                options.insert(stringify!($key), $crate::opts_value!($value));
            )*
            options
        }
    };
}

/// Helper macro to convert values for the `opts!` macro.
/// Handles nested objects, arrays, and expressions.
#[macro_export]
macro_rules! opts_value {
    // match a nested object
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            let mut object = $crate::common::Value::Object(Default::default());
            if let $crate::common::Value::Object(ref mut map) = object {
                $(
                    map.insert(
                        stringify!($key).to_string(),
                        $crate::opts_value!($value),
                    );
                )*
            }
            object
        }
    };

    // match an array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::opts_value!($value)),*])
    };

    // match an expression (variable, function call, literal, etc.)
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
