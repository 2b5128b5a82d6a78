//! # Schema — Declare Fields Once, Reflect Forever
//!
//! A schema type lists its typed, named, ordered fields in a single
//! [`schema!`] invocation and gets, for free: a flat index-based enumeration
//! of all fields (own + inherited layers), each field's name and type name,
//! per-field value conversion, and whole-object serialization to a JSON tree.
//!
//! ## Layers
//!
//! A schema is built from *layers*. Each struct declares its own fields and
//! names the layer it extends (or nothing, which means the empty
//! [`SchemaRoot`] layer). The composed object exposes one global field index
//! space: base layers first, then local fields.
//!
//! ```text
//! ComponentData { enabled }            layer 0   index 0
//! Sprite : ComponentData { tint }      layer 1   index 1
//! FancySprite : Sprite { glow }        layer 2   index 2
//!
//! FancySprite::member_count() == 3
//! member_name(0) == "enabled", member_name(2) == "glow"
//! ```
//!
//! Index `i` resolves by delegation: if `i` falls below the inherited count
//! it is answered by the base layer, otherwise looked up locally at
//! `i - inherited`. Composition depth is unbounded — each layer simply embeds
//! the previous one as its `base` field.
//!
//! ## No offsets, no unsafe
//!
//! Engines in the C++ tradition implement this pattern with per-member byte
//! offsets and pointer casts. Here each field instead gets accessor code
//! generated at declaration time; the external contract (count / name /
//! type / get) is identical, with zero pointer arithmetic.
//!
//! ## Defaults
//!
//! Every field declaration carries a default (`name: Type = expr`). The
//! generated `Default` impl applies all of them, so a freshly built object —
//! including one built by the component factory during scene loading — is
//! always complete and valid.

pub mod convert;
pub mod refs;

pub use convert::SchemaValue;
pub use refs::{ComponentId, ComponentRef, EntityRef, RefResolver};

/// Re-exported so macro expansions can name the JSON tree type.
pub use serde_json::Value;

/// Hard cap on *own* fields per schema layer. Exceeding it is a programming
/// error, caught at compile time by the `schema!` macro.
pub const MAX_LAYER_FIELDS: usize = 20;

/// The uniform "bag of typed fields" view over a schema object.
///
/// Implemented by the [`schema!`] / [`component!`](crate::component) macros,
/// never by hand. All `member_*` accessors are defined for every
/// `0 <= index < member_count()` and return `None` / `false` outside that
/// range.
pub trait Schematic {
    /// Name of the most-derived layer.
    fn schema_name(&self) -> &'static str;

    /// Total fields across every layer in the composition chain.
    fn member_count(&self) -> usize;

    /// Field name at a global index.
    fn member_name(&self, index: usize) -> Option<&'static str>;

    /// Field type name at a global index, as written in the declaration.
    fn member_type(&self, index: usize) -> Option<&'static str>;

    /// Convert the field at `index` to its textual-tree form.
    fn member_to_value(&self, index: usize) -> Option<Value>;

    /// Set the field at `index` from its textual-tree form. Returns `false`
    /// on conversion failure (logged by the conversion layer); the field
    /// keeps its previous value.
    fn member_from_value(&mut self, index: usize, value: &Value) -> bool;

    /// Second deserialization pass: resolve reference-valued fields recorded
    /// during [`member_from_value`](Schematic::member_from_value) against the
    /// now-complete object graph.
    fn resolve_refs(&mut self, resolver: &mut RefResolver<'_>);
}

/// The empty terminal layer every schema chain bottoms out at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchemaRoot;

impl Schematic for SchemaRoot {
    fn schema_name(&self) -> &'static str {
        ""
    }
    fn member_count(&self) -> usize {
        0
    }
    fn member_name(&self, _index: usize) -> Option<&'static str> {
        None
    }
    fn member_type(&self, _index: usize) -> Option<&'static str> {
        None
    }
    fn member_to_value(&self, _index: usize) -> Option<Value> {
        None
    }
    fn member_from_value(&mut self, _index: usize, _value: &Value) -> bool {
        false
    }
    fn resolve_refs(&mut self, _resolver: &mut RefResolver<'_>) {}
}

impl SchemaValue for SchemaRoot {
    fn to_value(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }
    fn from_value(&mut self, _value: &Value) -> bool {
        true
    }
}

/// Serialize a schema object as a JSON object mapping member names to
/// converted values.
pub fn schematic_to_value<S: Schematic + ?Sized>(obj: &S) -> Value {
    let mut map = serde_json::Map::new();
    for index in 0..obj.member_count() {
        match (obj.member_name(index), obj.member_to_value(index)) {
            (Some(name), Some(value)) => {
                map.insert(name.to_string(), value);
            }
            _ => {
                log::error!(
                    "Could not read member [{index}] of schema \"{}\".",
                    obj.schema_name()
                );
            }
        }
    }
    Value::Object(map)
}

/// Populate a schema object from a JSON object, member by member.
///
/// Best-effort: a member missing from the data is left at its current value
/// (logged at debug level); a member that fails to convert is left at its
/// current value (logged as a warning). Only a non-object input fails the
/// whole call.
pub fn schematic_from_value<S: Schematic + ?Sized>(obj: &mut S, value: &Value) -> bool {
    let Value::Object(map) = value else {
        log::warn!(
            "Schema \"{}\" expected an object, got: {value}",
            obj.schema_name()
        );
        return false;
    };
    for index in 0..obj.member_count() {
        let Some(name) = obj.member_name(index) else {
            continue;
        };
        match map.get(name) {
            Some(field_value) => {
                if !obj.member_from_value(index, field_value) {
                    log::warn!(
                        "Failed to read member '{name}' of type '{}' in schema \"{}\".",
                        obj.member_type(index).unwrap_or("?"),
                        obj.schema_name()
                    );
                }
            }
            None => {
                log::debug!(
                    "Member '{name}' not present in data for schema \"{}\".",
                    obj.schema_name()
                );
            }
        }
    }
    true
}

/// Counts identifiers; used by `schema!` for field counts.
#[doc(hidden)]
#[macro_export]
macro_rules! count_fields {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + $crate::count_fields!($($tail)*) };
}

/// Declare a schema struct: fields listed once as `name: Type = default`,
/// optionally extending a base layer.
///
/// ```ignore
/// schema! {
///     /// Window placement, saved with the editor layout.
///     pub struct Placement {
///         pub region: Rect = Rect::new(0.0, 0.0, 640.0, 480.0),
///         pub docked: bool = true,
///     }
/// }
///
/// schema! {
///     pub struct PinnedPlacement : Placement {
///         pub pin_order: u32 = 0,
///     }
/// }
/// ```
///
/// Generates the struct (base layer embedded as `base`), a `Default` impl
/// applying every declared default, the [`Schematic`] impl with
/// base-to-derived index delegation, and a [`SchemaValue`] impl so the type
/// nests as a field of other schemas. Each layer may declare at most
/// [`MAX_LAYER_FIELDS`] own fields; exceeding the cap fails the build.
#[macro_export]
macro_rules! schema {
    // Layer extending a base schema.
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $base:path {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $name {
            /// Inherited schema layer.
            pub base: $base,
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    base: <$base as Default>::default(),
                    $($field: $default,)*
                }
            }
        }

        impl $crate::schema::Schematic for $name {
            fn schema_name(&self) -> &'static str {
                stringify!($name)
            }

            fn member_count(&self) -> usize {
                $crate::schema::Schematic::member_count(&self.base)
                    + $crate::count_fields!($($field)*)
            }

            fn member_name(&self, index: usize) -> Option<&'static str> {
                let inherited = $crate::schema::Schematic::member_count(&self.base);
                if index < inherited {
                    return $crate::schema::Schematic::member_name(&self.base, index);
                }
                const NAMES: &[&str] = &[$(stringify!($field)),*];
                NAMES.get(index - inherited).copied()
            }

            fn member_type(&self, index: usize) -> Option<&'static str> {
                let inherited = $crate::schema::Schematic::member_count(&self.base);
                if index < inherited {
                    return $crate::schema::Schematic::member_type(&self.base, index);
                }
                const TYPES: &[&str] = &[$(stringify!($fty)),*];
                TYPES.get(index - inherited).copied()
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn member_to_value(&self, index: usize) -> Option<$crate::schema::Value> {
                let inherited = $crate::schema::Schematic::member_count(&self.base);
                if index < inherited {
                    return $crate::schema::Schematic::member_to_value(&self.base, index);
                }
                let mut slot = index - inherited;
                $(
                    if slot == 0 {
                        return Some($crate::schema::SchemaValue::to_value(&self.$field));
                    }
                    slot -= 1;
                )*
                None
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn member_from_value(
                &mut self,
                index: usize,
                value: &$crate::schema::Value,
            ) -> bool {
                let inherited = $crate::schema::Schematic::member_count(&self.base);
                if index < inherited {
                    return $crate::schema::Schematic::member_from_value(
                        &mut self.base,
                        index,
                        value,
                    );
                }
                let mut slot = index - inherited;
                $(
                    if slot == 0 {
                        return $crate::schema::SchemaValue::from_value(&mut self.$field, value);
                    }
                    slot -= 1;
                )*
                false
            }

            fn resolve_refs(&mut self, resolver: &mut $crate::schema::RefResolver<'_>) {
                $crate::schema::Schematic::resolve_refs(&mut self.base, resolver);
                $(
                    $crate::schema::SchemaValue::resolve_refs(&mut self.$field, resolver);
                )*
            }
        }

        impl $crate::schema::SchemaValue for $name {
            fn to_value(&self) -> $crate::schema::Value {
                $crate::schema::schematic_to_value(self)
            }

            fn from_value(&mut self, value: &$crate::schema::Value) -> bool {
                $crate::schema::schematic_from_value(self, value)
            }

            fn resolve_refs(&mut self, resolver: &mut $crate::schema::RefResolver<'_>) {
                $crate::schema::Schematic::resolve_refs(self, resolver);
            }
        }

        const _: () = assert!(
            $crate::count_fields!($($field)*) <= $crate::schema::MAX_LAYER_FIELDS,
            concat!(
                "schema layer `",
                stringify!($name),
                "` declares more own fields than MAX_LAYER_FIELDS allows"
            )
        );
    };

    // Root layer: no base named, bottoms out at `SchemaRoot`.
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $crate::schema! {
            $(#[$meta])*
            $vis struct $name : $crate::schema::SchemaRoot {
                $(
                    $(#[$fmeta])*
                    $fvis $field : $fty = $default,
                )*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    schema! {
        struct Inner {
            width: f32 = 2.5,
            label: String = String::new(),
        }
    }

    schema! {
        struct Middle : Inner {
            count: u32 = 7,
        }
    }

    schema! {
        struct Outer : Middle {
            tag: String = String::from("outer"),
            extra: i32 = -1,
        }
    }

    #[test]
    fn member_count_sums_all_layers() {
        let inner = Inner::default();
        let middle = Middle::default();
        let outer = Outer::default();
        assert_eq!(inner.member_count(), 2);
        assert_eq!(middle.member_count(), 3);
        assert_eq!(outer.member_count(), 5);
    }

    #[test]
    fn member_index_space_is_base_to_derived() {
        let outer = Outer::default();
        let names: Vec<_> = (0..outer.member_count())
            .map(|i| outer.member_name(i).unwrap())
            .collect();
        assert_eq!(names, ["width", "label", "count", "tag", "extra"]);

        assert_eq!(outer.member_type(0), Some("f32"));
        assert_eq!(outer.member_type(2), Some("u32"));
        assert_eq!(outer.member_type(4), Some("i32"));
    }

    #[test]
    fn members_undefined_outside_range() {
        let mut outer = Outer::default();
        let count = outer.member_count();
        assert!(outer.member_name(count).is_none());
        assert!(outer.member_type(count).is_none());
        assert!(outer.member_to_value(count).is_none());
        assert!(!outer.member_from_value(count, &Value::Null));
    }

    #[test]
    fn defaults_apply_across_layers() {
        let outer = Outer::default();
        assert_eq!(outer.base.base.width, 2.5);
        assert_eq!(outer.base.count, 7);
        assert_eq!(outer.tag, "outer");
        assert_eq!(outer.extra, -1);
    }

    #[test]
    fn member_access_reads_and_writes_through_layers() {
        let mut outer = Outer::default();
        assert_eq!(outer.member_to_value(2), Some(Value::from(7u32)));

        assert!(outer.member_from_value(2, &Value::from(99u32)));
        assert_eq!(outer.base.count, 99);

        assert!(outer.member_from_value(0, &Value::from(0.5f64)));
        assert_eq!(outer.base.base.width, 0.5);
    }

    #[test]
    fn whole_object_round_trip() {
        let mut original = Outer::default();
        original.base.base.width = 10.0;
        original.base.base.label = String::from("two words kept");
        original.base.count = 3;
        original.tag = String::from("changed");
        original.extra = 5;

        let value = schematic_to_value(&original);
        let mut restored = Outer::default();
        assert!(schematic_from_value(&mut restored, &value));

        assert_eq!(restored.base.base.width, 10.0);
        assert_eq!(restored.base.base.label, "two words kept");
        assert_eq!(restored.base.count, 3);
        assert_eq!(restored.tag, "changed");
        assert_eq!(restored.extra, 5);
    }

    #[test]
    fn missing_members_keep_current_values() {
        let mut outer = Outer::default();
        outer.extra = 123;
        // An object that only mentions `count` updates that member alone.
        let partial = serde_json::json!({ "count": 1 });
        assert!(schematic_from_value(&mut outer, &partial));
        assert_eq!(outer.base.count, 1);
        assert_eq!(outer.extra, 123);
    }

    #[test]
    fn schema_root_is_empty() {
        let root = SchemaRoot;
        assert_eq!(root.member_count(), 0);
        assert!(root.member_name(0).is_none());
    }
}
