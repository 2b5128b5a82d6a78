//! # Component — Behavior and Data Attached to Entities
//!
//! A component is a schema struct plus lifecycle hooks. Declaring one takes
//! two steps:
//!
//! ```ignore
//! component! {
//!     /// Follows a target entity at a fixed offset.
//!     pub struct Follower {
//!         pub target: EntityRef = EntityRef::none(),
//!         pub offset: Vec2 = Vec2::ZERO,
//!     }
//! }
//!
//! impl Component for Follower {
//!     fn update(&mut self, scene: &mut Scene, entity: EntityId) {
//!         // per-frame behavior
//!     }
//! }
//! ```
//!
//! The macro generates the schema plumbing (see [`schema!`](crate::schema))
//! and the object-level glue ([`ComponentObject`]); the `impl Component`
//! block overrides whichever hooks the type needs — all of them default to
//! doing nothing.
//!
//! ## The `ComponentData` layer
//!
//! Every component's schema chain bottoms out at [`ComponentData`], which
//! contributes the `enabled` flag as member 0. A component only runs its
//! `update` while it is enabled *and* its entity is effectively active.
//! Components may also layer on each other:
//! `component! { pub struct Turret : Follower { … } }` composes
//! `ComponentData` + `Follower` + `Turret` into one field index space.
//!
//! ## Hooks
//!
//! | hook              | fired                                                |
//! |-------------------|------------------------------------------------------|
//! | `on_create`       | when the component is attached                       |
//! | `on_destroy`      | when the component is removed or its entity dies     |
//! | `on_load_start`   | before the component's fields are deserialized       |
//! | `on_load_finish`  | once the whole scene graph has been deserialized     |
//! | `on_clone`        | on the copy, right after cloning                     |
//! | `on_set_active`   | when the entity's *effective* active state flips     |
//! | `on_set_enabled`  | when the component's enabled flag flips              |
//! | `update`          | every frame, from `Scene::update_components`         |
//!
//! Hooks that need context receive `&mut Scene` and the owning [`EntityId`];
//! while a hook runs, the component is checked out of the scene, so looking
//! itself up through the scene yields nothing.

use std::any::Any;

use crate::schema::Schematic;

use super::entity::EntityId;
use super::scene::Scene;

crate::schema! {
    /// Schema layer carried by every component.
    pub struct ComponentData {
        pub enabled: bool = true,
    }
}

/// Access to the shared [`ComponentData`] layer, however deep it is buried
/// in a component's schema chain. Generated by [`component!`](crate::component).
pub trait AsComponentData {
    fn component_data(&self) -> &ComponentData;
    fn component_data_mut(&mut self) -> &mut ComponentData;
}

impl AsComponentData for ComponentData {
    fn component_data(&self) -> &ComponentData {
        self
    }
    fn component_data_mut(&mut self) -> &mut ComponentData {
        self
    }
}

/// Object-level glue every concrete component needs: downcasting and
/// polymorphic cloning. Generated by [`component!`](crate::component), never
/// written by hand.
pub trait ComponentObject: AsComponentData {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_boxed(&self) -> Box<dyn Component>;
}

/// A component: reflected data plus lifecycle hooks.
///
/// Implement this (overriding any subset of the hooks) for a struct declared
/// with [`component!`](crate::component), then register the type with a
/// [`ComponentRegistry`](crate::registry::ComponentRegistry) so scenes can
/// attach and deserialize it.
pub trait Component: Schematic + ComponentObject + Send + Sync + 'static {
    /// The component has just been attached to `entity`.
    fn on_create(&mut self, _scene: &mut Scene, _entity: EntityId) {}

    /// The component is about to be dropped.
    fn on_destroy(&mut self, _scene: &mut Scene, _entity: EntityId) {}

    /// Fields are about to be deserialized into this component.
    fn on_load_start(&mut self) {}

    /// The entire scene graph has been deserialized and all references are
    /// resolved.
    fn on_load_finish(&mut self, _scene: &mut Scene, _entity: EntityId) {}

    /// `self` is a fresh copy of `source` made by entity cloning.
    fn on_clone(&mut self, _source: &dyn Component) {}

    /// The owning entity's effective active state flipped.
    fn on_set_active(&mut self, _active: bool) {}

    /// The enabled flag flipped.
    fn on_set_enabled(&mut self, _enabled: bool) {}

    /// Per-frame step. Only called while enabled and effectively active.
    fn update(&mut self, _scene: &mut Scene, _entity: EntityId) {}
}

impl dyn Component {
    /// Enabled flag shorthand.
    pub fn is_enabled(&self) -> bool {
        self.component_data().enabled
    }
}

/// Declare a component struct: schema fields plus generated object glue.
///
/// Same field grammar as [`schema!`](crate::schema). The base layer defaults
/// to [`ComponentData`]; naming another component's schema instead stacks a
/// further layer on top of it. Follow the declaration with an
/// `impl Component for …` block (empty is fine).
#[macro_export]
macro_rules! component {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $base:path {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $crate::schema! {
            $(#[$meta])*
            $vis struct $name : $base {
                $(
                    $(#[$fmeta])*
                    $fvis $field : $fty = $default,
                )*
            }
        }

        impl $crate::ecs::AsComponentData for $name {
            fn component_data(&self) -> &$crate::ecs::ComponentData {
                $crate::ecs::AsComponentData::component_data(&self.base)
            }
            fn component_data_mut(&mut self) -> &mut $crate::ecs::ComponentData {
                $crate::ecs::AsComponentData::component_data_mut(&mut self.base)
            }
        }

        impl $crate::ecs::ComponentObject for $name {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
            fn clone_boxed(&self) -> Box<dyn $crate::ecs::Component> {
                Box::new(self.clone())
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($rest:tt)* }
    ) => {
        $crate::component! {
            $(#[$meta])*
            $vis struct $name : $crate::ecs::ComponentData { $($rest)* }
        }
    };
}
