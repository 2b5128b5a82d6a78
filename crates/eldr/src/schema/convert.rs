//! # Value Conversion — Any Field Type to Text and Back
//!
//! [`SchemaValue`] is the capability a type needs to appear as a schema
//! field. The impl set mirrors a precedence ladder:
//!
//! 1. A type with its own `SchemaValue` impl uses it verbatim — the escape
//!    hatch taken by [`schema_enum!`](crate::schema_enum), the reference
//!    types, and anything exotic.
//! 2. Integers, floats and `bool` convert through native JSON scalars. A
//!    numeric string is also accepted on the way in, which is what lets map
//!    keys round-trip through object keys.
//! 3. Enums declared with [`schema_enum!`](crate::schema_enum) convert
//!    through their underlying integer.
//! 4. `String` is assigned verbatim — never split on whitespace.
//! 5. `Vec<T>` serializes as an array and re-parses element-wise; when the
//!    source array is shorter than the destination, the destination is
//!    **truncated** (documented policy, not an error).
//! 6. Key/value maps serialize as objects in the same grammar as the main
//!    persisted format and re-insert pair by pair.
//!
//! Color, rectangle and vector value types get dedicated `"(…)"` forms in
//! [`math`](crate::math) and below.
//!
//! Conversion failures are best-effort: the failing field logs a warning and
//! keeps its previous value, so one malformed field never aborts loading an
//! enclosing component or scene.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde_json::Value;

use super::refs::RefResolver;

/// Conversion between a field value and its textual-tree form.
///
/// `from_value` reports failure with `false` and must leave the value in a
/// usable state. `resolve_refs` is a no-op for everything except reference
/// types and the containers that may hold them.
pub trait SchemaValue {
    fn to_value(&self) -> Value;

    fn from_value(&mut self, value: &Value) -> bool;

    fn resolve_refs(&mut self, _resolver: &mut RefResolver<'_>) {}
}

macro_rules! impl_schema_value_int {
    ($($t:ty),* $(,)?) => {$(
        impl SchemaValue for $t {
            fn to_value(&self) -> Value {
                Value::from(*self)
            }

            fn from_value(&mut self, value: &Value) -> bool {
                match value {
                    Value::Number(n) => {
                        if let Some(v) = n.as_i64() {
                            *self = v as $t;
                            true
                        } else if let Some(v) = n.as_u64() {
                            *self = v as $t;
                            true
                        } else if let Some(v) = n.as_f64() {
                            *self = v as $t;
                            true
                        } else {
                            false
                        }
                    }
                    Value::String(s) => match s.trim().parse::<$t>() {
                        Ok(v) => {
                            *self = v;
                            true
                        }
                        Err(_) => {
                            log::warn!(
                                "Cannot parse '{s}' as {}.",
                                stringify!($t)
                            );
                            false
                        }
                    },
                    _ => false,
                }
            }
        }
    )*};
}

impl_schema_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

macro_rules! impl_schema_value_float {
    ($($t:ty),* $(,)?) => {$(
        impl SchemaValue for $t {
            fn to_value(&self) -> Value {
                Value::from(*self as f64)
            }

            fn from_value(&mut self, value: &Value) -> bool {
                match value {
                    Value::Number(n) => match n.as_f64() {
                        Some(v) => {
                            *self = v as $t;
                            true
                        }
                        None => false,
                    },
                    Value::String(s) => match s.trim().parse::<$t>() {
                        Ok(v) => {
                            *self = v;
                            true
                        }
                        Err(_) => {
                            log::warn!("Cannot parse '{s}' as {}.", stringify!($t));
                            false
                        }
                    },
                    _ => false,
                }
            }
        }
    )*};
}

impl_schema_value_float!(f32, f64);

impl SchemaValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(&mut self, value: &Value) -> bool {
        match value {
            Value::Bool(b) => {
                *self = *b;
                true
            }
            // The stream form of a bool is 0/1; accept both spellings.
            Value::Number(n) => match n.as_i64() {
                Some(v) => {
                    *self = v != 0;
                    true
                }
                None => false,
            },
            Value::String(s) => match s.trim() {
                "true" | "1" => {
                    *self = true;
                    true
                }
                "false" | "0" => {
                    *self = false;
                    true
                }
                other => {
                    log::warn!("Cannot parse '{other}' as bool.");
                    false
                }
            },
            _ => false,
        }
    }
}

impl SchemaValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(&mut self, value: &Value) -> bool {
        match value {
            Value::String(s) => {
                *self = s.clone();
                true
            }
            _ => false,
        }
    }
}

impl<T: SchemaValue + Default> SchemaValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(SchemaValue::to_value).collect())
    }

    fn from_value(&mut self, value: &Value) -> bool {
        let Value::Array(items) = value else {
            log::warn!("Array data expected for a sequence field, got: {value}");
            self.clear();
            return false;
        };
        for (i, item) in items.iter().enumerate() {
            if i < self.len() {
                if !self[i].from_value(item) {
                    log::warn!("Skipping unreadable sequence element [{i}].");
                }
            } else {
                let mut element = T::default();
                if !element.from_value(item) {
                    log::warn!("Skipping unreadable sequence element [{i}].");
                }
                self.push(element);
            }
        }
        // Shorter source truncates the destination.
        if items.len() < self.len() {
            self.truncate(items.len());
        }
        true
    }

    fn resolve_refs(&mut self, resolver: &mut RefResolver<'_>) {
        for element in self.iter_mut() {
            element.resolve_refs(resolver);
        }
    }
}

/// Object keys are strings; non-string key values fall back to their compact
/// JSON rendering (`42` for numbers), which the scalar impls re-parse.
fn key_to_string<K: SchemaValue>(key: &K) -> String {
    match key.to_value() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn key_from_string<K: SchemaValue + Default>(text: &str) -> Option<K> {
    let mut key = K::default();
    if key.from_value(&Value::String(text.to_string())) {
        Some(key)
    } else {
        log::warn!("Cannot parse map key '{text}'.");
        None
    }
}

macro_rules! impl_schema_value_map {
    ($map:ident, $($bound:tt)+) => {
        impl<K, V> SchemaValue for $map<K, V>
        where
            K: SchemaValue + Default + $($bound)+,
            V: SchemaValue + Default,
        {
            fn to_value(&self) -> Value {
                let mut object = serde_json::Map::new();
                for (key, value) in self.iter() {
                    object.insert(key_to_string(key), value.to_value());
                }
                Value::Object(object)
            }

            fn from_value(&mut self, value: &Value) -> bool {
                let Value::Object(object) = value else {
                    log::warn!("Object data expected for a map field, got: {value}");
                    return false;
                };
                for (key_text, entry) in object.iter() {
                    let Some(key) = key_from_string::<K>(key_text) else {
                        continue;
                    };
                    let mut parsed = V::default();
                    if parsed.from_value(entry) {
                        self.insert(key, parsed);
                    } else {
                        log::warn!("Skipping unreadable map entry '{key_text}'.");
                    }
                }
                true
            }

            fn resolve_refs(&mut self, resolver: &mut RefResolver<'_>) {
                for value in self.values_mut() {
                    value.resolve_refs(resolver);
                }
            }
        }
    };
}

impl_schema_value_map!(HashMap, Eq + Hash);
impl_schema_value_map!(BTreeMap, Ord);

impl SchemaValue for glam::Vec2 {
    fn to_value(&self) -> Value {
        Value::String(format!("({}, {})", self.x, self.y))
    }

    fn from_value(&mut self, value: &Value) -> bool {
        let Value::String(text) = value else {
            return false;
        };
        match parse_parenthesized::<2>(text) {
            Some([x, y]) => {
                self.x = x;
                self.y = y;
                true
            }
            None => {
                log::warn!("Cannot parse '{text}' as Vec2.");
                false
            }
        }
    }
}

/// Parse `"(a, b, …)"` into N floats.
pub(crate) fn parse_parenthesized<const N: usize>(text: &str) -> Option<[f32; N]> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut out = [0.0f32; N];
    let mut parts = inner.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Declare a C-like enum convertible through its underlying integer.
///
/// ```ignore
/// schema_enum! {
///     pub enum BlendMode {
///         Opaque = 0,
///         Additive = 1,
///         Multiply = 2,
///     }
/// }
/// ```
///
/// An out-of-range integer on the way in logs a warning and leaves the value
/// unchanged.
#[macro_export]
macro_rules! schema_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl $crate::schema::SchemaValue for $name {
            fn to_value(&self) -> $crate::schema::Value {
                $crate::schema::Value::from(*self as i64)
            }

            fn from_value(&mut self, value: &$crate::schema::Value) -> bool {
                let mut raw: i64 = 0;
                if !$crate::schema::SchemaValue::from_value(&mut raw, value) {
                    return false;
                }
                $(
                    if raw == $value {
                        *self = Self::$variant;
                        return true;
                    }
                )+
                ::log::warn!(
                    "Value {raw} is not a variant of {}.",
                    stringify!($name)
                );
                false
            }
        }
    };
}
