//! # Reference Fields — Cross-Links Between Entities and Components
//!
//! A schema field may point at another entity or component in the same
//! scene. [`EntityRef`] and [`ComponentRef`] are nullable typed handles that
//! serialize as stable string identifiers rather than addresses:
//!
//! - entity: `"12"` (the entity id)
//! - component: `"12:Sprite:0"` (owner id, registered type name, index in
//!   the owner's bucket for that type)
//!
//! ## Two-pass resolution
//!
//! Deserializing a reference cannot look its target up immediately — the
//! target may not exist yet (forward reference) or may itself point back
//! (cycle). So `from_value` only *records* the wanted identifier inside the
//! handle and nulls it. After the entire graph has been created, the scene
//! runs a second pass: every component's schema is walked with a
//! [`RefResolver`], which parses each recorded identifier, validates it
//! against the live graph, and installs the resolved handle. Unresolvable
//! identifiers warn and stay null. Containers forward the pass to their
//! elements, so references held inside `Vec`s and maps resolve too.

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::ecs::{Component, EntityId, Scene};

use super::convert::SchemaValue;

/// Nullable handle to an entity, usable as a schema field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityRef {
    target: Option<EntityId>,
    /// Identifier recorded during load, consumed by the resolve pass.
    pending: Option<String>,
}

impl EntityRef {
    /// A null reference.
    pub fn none() -> Self {
        Self::default()
    }

    /// A reference to `entity`.
    pub fn to(entity: EntityId) -> Self {
        Self {
            target: Some(entity),
            pending: None,
        }
    }

    pub fn get(&self) -> Option<EntityId> {
        self.target
    }

    pub fn is_none(&self) -> bool {
        self.target.is_none()
    }

    pub fn set(&mut self, entity: Option<EntityId>) {
        self.target = entity;
        self.pending = None;
    }
}

impl SchemaValue for EntityRef {
    fn to_value(&self) -> Value {
        match self.target {
            Some(id) => Value::String(id.to_string()),
            None => Value::Null,
        }
    }

    fn from_value(&mut self, value: &Value) -> bool {
        self.target = None;
        self.pending = None;
        match value {
            Value::Null => true,
            Value::String(s) if s.is_empty() || s == "null" => true,
            Value::String(s) => {
                self.pending = Some(s.clone());
                true
            }
            _ => {
                log::warn!("Entity reference expected a string identifier, got: {value}");
                false
            }
        }
    }

    fn resolve_refs(&mut self, resolver: &mut RefResolver<'_>) {
        if let Some(ident) = self.pending.take() {
            self.target = resolver.resolve_entity(&ident);
        }
    }
}

/// Identifies one component in a scene: owning entity, registered type name,
/// and position within the owner's per-type bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentId {
    pub entity: EntityId,
    pub type_name: &'static str,
    pub index: usize,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.entity, self.type_name, self.index)
    }
}

/// Nullable handle to a component of type `T`, usable as a schema field.
///
/// Built with [`Scene::component_ref`](crate::ecs::Scene::component_ref) and
/// dereferenced with [`Scene::get_ref`](crate::ecs::Scene::get_ref).
pub struct ComponentRef<T> {
    target: Option<ComponentId>,
    pending: Option<String>,
    marker: PhantomData<fn() -> T>,
}

impl<T> ComponentRef<T> {
    pub fn none() -> Self {
        Self {
            target: None,
            pending: None,
            marker: PhantomData,
        }
    }

    pub fn to(id: ComponentId) -> Self {
        Self {
            target: Some(id),
            pending: None,
            marker: PhantomData,
        }
    }

    pub fn get(&self) -> Option<ComponentId> {
        self.target
    }

    pub fn is_none(&self) -> bool {
        self.target.is_none()
    }

    pub fn set(&mut self, id: Option<ComponentId>) {
        self.target = id;
        self.pending = None;
    }
}

impl<T> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            pending: self.pending.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> Default for ComponentRef<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(id) => write!(f, "ComponentRef({id})"),
            None => write!(f, "ComponentRef(null)"),
        }
    }
}

impl<T> PartialEq for ComponentRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: Component> SchemaValue for ComponentRef<T> {
    fn to_value(&self) -> Value {
        match &self.target {
            Some(id) => Value::String(id.to_string()),
            None => Value::Null,
        }
    }

    fn from_value(&mut self, value: &Value) -> bool {
        self.target = None;
        self.pending = None;
        match value {
            Value::Null => true,
            Value::String(s) if s.is_empty() || s == "null" => true,
            Value::String(s) => {
                self.pending = Some(s.clone());
                true
            }
            _ => {
                log::warn!("Component reference expected a string identifier, got: {value}");
                false
            }
        }
    }

    fn resolve_refs(&mut self, resolver: &mut RefResolver<'_>) {
        if let Some(ident) = self.pending.take() {
            self.target = resolver.resolve_component(&ident);
        }
    }
}

/// Resolves recorded reference identifiers against a fully loaded scene.
pub struct RefResolver<'a> {
    scene: &'a Scene,
}

impl<'a> RefResolver<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    /// `"12"` → the entity with id 12, if it exists.
    pub fn resolve_entity(&mut self, ident: &str) -> Option<EntityId> {
        let Ok(raw) = ident.trim().parse::<u32>() else {
            log::warn!("Failed to extract an entity id from '{ident}'.");
            return None;
        };
        let id = EntityId(raw);
        if self.scene.entity_exists(id) {
            Some(id)
        } else {
            log::warn!("Could not find entity with id '{raw}'.");
            None
        }
    }

    /// `"12:Sprite:0"` → the matching component location, if it exists.
    pub fn resolve_component(&mut self, ident: &str) -> Option<ComponentId> {
        let Some((entity_part, rest)) = ident.split_once(':') else {
            log::warn!("Malformed component identifier '{ident}'.");
            return None;
        };
        let Some((name_part, index_part)) = rest.rsplit_once(':') else {
            log::warn!("Malformed component identifier '{ident}'.");
            return None;
        };

        let entity = self.resolve_entity(entity_part)?;
        let registry = self.scene.registry();
        let Some(type_id) = registry.id_by_name(name_part) else {
            log::warn!("Could not resolve component reference: unknown type '{name_part}'.");
            return None;
        };
        let Ok(index) = index_part.trim().parse::<usize>() else {
            log::warn!("Malformed component index in '{ident}'.");
            return None;
        };
        if index >= self.scene.component_bucket_len(entity, type_id) {
            log::warn!("Could not find component '{ident}'.");
            return None;
        }
        // The name handed out lives in the registry for the process lifetime.
        let type_name = registry.name_of(type_id)?;
        Some(ComponentId {
            entity,
            type_name,
            index,
        })
    }
}
