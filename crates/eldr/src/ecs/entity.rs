//! # Entity — Identity Plus a Place in the Tree
//!
//! An [`EntityId`] is a plain number, unique within one
//! [`Scene`](super::scene::Scene). Ids are handed out monotonically and never
//! reused — clearing a scene does not reset the counter, and loading a saved
//! scene preserves the serialized ids and bumps the counter past them. That
//! makes a bare `u32` an honest handle: a stale id simply misses.
//!
//! The per-entity bookkeeping ([`EntityRecord`]) lives inside the scene; the
//! id is the only thing that crosses the API boundary.

use std::collections::BTreeMap;
use std::fmt;

use crate::registry::ComponentTypeId;

use super::arena::ComponentKey;

/// Identifier for an entity, unique within its scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    /// The raw integer id. This is also the entity's stable reference
    /// identifier in serialized form.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene-internal state for one entity.
pub(crate) struct EntityRecord {
    /// Mutable display name, used by name lookup. Defaults to `Entity[<id>]`.
    pub name: String,
    pub parent: Option<EntityId>,
    /// Ordered children.
    pub children: Vec<EntityId>,
    /// Local active flag. Effective activity also requires every ancestor to
    /// be locally active.
    pub active: bool,
    /// Attached components, grouped by type id, insertion-ordered within a
    /// type. Keys here mirror the scene-wide per-type buckets exactly.
    pub components: BTreeMap<ComponentTypeId, Vec<ComponentKey>>,
}

impl EntityRecord {
    pub fn new(id: EntityId, parent: Option<EntityId>) -> Self {
        Self {
            name: format!("Entity[{id}]"),
            parent,
            children: Vec::new(),
            active: true,
            components: BTreeMap::new(),
        }
    }
}
