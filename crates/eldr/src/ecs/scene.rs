//! # Scene — The Live Entity/Component Graph
//!
//! A [`Scene`] owns every entity and component in one simulation. It is the
//! single-threaded, frame-stepped heart of the crate:
//!
//! ```text
//! loop {
//!     scene.update_components();   // hooks run, may queue destruction
//!     // … render, external systems …
//!     scene.destroy_pending();     // the one flush point per frame
//! }
//! ```
//!
//! ## Storage shape
//!
//! ```text
//! Scene
//! ├─ entities: BTreeMap<EntityId, EntityRecord>     id → name/tree/buckets
//! ├─ roots: Vec<EntityId>                           ordered tree roots
//! ├─ arena: ComponentArena                          owns every Box<dyn Component>
//! └─ by_type: Vec<Vec<ComponentKey>>                scene-wide bucket per type id
//! ```
//!
//! A component's key is stored in exactly two places — its owner's per-type
//! list and the scene-wide per-type bucket — and the two are inserted and
//! erased together. That gives O(1) access to "all components of type T"
//! without scanning entities, while the entity side keeps attachment
//! ordering.
//!
//! ## Deferred destruction
//!
//! `destroy_entity` only queues by default. While `update_components` walks
//! a bucket, other components may hold keys into it; freeing mid-frame would
//! invalidate them. All destruction is flushed at `destroy_pending`, after
//! update and before the next frame. `immediate = true` bypasses the queue
//! and is only safe outside the update loop.
//!
//! ## Active state
//!
//! Each entity has a local `active` flag; it is *effectively* active iff the
//! flag is set on it and on every ancestor. Effective state is recomputed on
//! demand rather than cached, so toggling an ancestor instantly affects the
//! whole subtree.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::registry::{ComponentRegistry, ComponentTypeId};
use crate::schema::{ComponentId, ComponentRef};
use crate::services::ServiceProvider;

use super::arena::{ComponentArena, ComponentEntry, ComponentKey};
use super::component::Component;
use super::entity::{EntityId, EntityRecord};

/// The entity/component graph. See the module docs for the storage shape and
/// frame discipline.
pub struct Scene {
    registry: Arc<ComponentRegistry>,
    services: ServiceProvider,
    name: String,
    pub(crate) entities: BTreeMap<EntityId, EntityRecord>,
    pub(crate) roots: Vec<EntityId>,
    /// Next entity id. Monotonic; never reset, even by `clear`.
    next_id: u32,
    arena: ComponentArena,
    /// Scene-wide bucket per component type id, insertion-ordered.
    by_type: Vec<Vec<ComponentKey>>,
    pending_entities: Vec<EntityId>,
    pending_components: Vec<ComponentKey>,
}

impl Scene {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            services: ServiceProvider::new(),
            name: String::from("New Scene"),
            entities: BTreeMap::new(),
            roots: Vec::new(),
            next_id: 0,
            arena: ComponentArena::new(),
            by_type: Vec::new(),
            pending_entities: Vec::new(),
            pending_components: Vec::new(),
        }
    }

    /// The component registry this scene instantiates types from. Scenes
    /// sharing one registry share one stable type-id space.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ── Services ─────────────────────────────────────────────────────

    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut ServiceProvider {
        &mut self.services
    }

    /// Shorthand for `services().service::<T>()`.
    ///
    /// # Panics
    ///
    /// Panics if the service has not been inserted.
    pub fn service<T: 'static>(&self) -> &T {
        self.services.service::<T>()
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Create a root entity. The only creation paths are this,
    /// [`create_entity_in`](Scene::create_entity_in), cloning, and loading —
    /// every entity is registered in the tree and the id table atomically
    /// with its construction.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.allocate_id();
        self.entities.insert(id, EntityRecord::new(id, None));
        self.roots.push(id);
        id
    }

    /// Create an entity as a child of `parent`. Falls back to the root with
    /// a warning if the parent does not exist.
    pub fn create_entity_in(&mut self, parent: EntityId) -> EntityId {
        if !self.entities.contains_key(&parent) {
            log::warn!("Parent entity {parent} does not exist; creating a root entity instead.");
            return self.create_entity();
        }
        let id = self.allocate_id();
        self.entities.insert(id, EntityRecord::new(id, Some(parent)));
        if let Some(record) = self.entities.get_mut(&parent) {
            record.children.push(id);
        }
        id
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create an entity carrying a specific id, used when loading a saved
    /// scene. Bumps the id counter past it so later ids never collide.
    pub(crate) fn create_entity_with_id(&mut self, raw: u32) -> EntityId {
        self.next_id = self.next_id.max(raw + 1);
        let id = EntityId(raw);
        self.entities.insert(id, EntityRecord::new(id, None));
        self.roots.push(id);
        id
    }

    /// Deep-copy an entity: name (suffixed `" (copy)"`), local components
    /// (via `clone_boxed` + `on_clone`), but not children. `parent = None`
    /// places the clone under the source's parent.
    pub fn clone_entity(&mut self, source: EntityId, parent: Option<EntityId>) -> Option<EntityId> {
        let Some(record) = self.entities.get(&source) else {
            log::warn!("Cannot clone entity {source}: it does not exist.");
            return None;
        };
        let target_parent = parent.or(record.parent);
        let copy_name = format!("{} (copy)", record.name);
        let sources: Vec<(ComponentTypeId, ComponentKey)> = record
            .components
            .iter()
            .flat_map(|(&type_id, keys)| keys.iter().map(move |&k| (type_id, k)))
            .collect();

        let clone = match target_parent {
            Some(p) => self.create_entity_in(p),
            None => self.create_entity(),
        };
        if let Some(clone_record) = self.entities.get_mut(&clone) {
            clone_record.name = copy_name;
        }

        for (type_id, source_key) in sources {
            let copied = self.arena.get(source_key).and_then(|entry| {
                entry.boxed.as_ref().map(|original| {
                    let mut copy = original.clone_boxed();
                    copy.on_clone(&**original);
                    copy
                })
            });
            if let Some(copy) = copied {
                self.attach_boxed(clone, type_id, copy, false);
            }
        }
        Some(clone)
    }

    /// Queue an entity (and, at flush time, its whole subtree) for
    /// destruction. With `immediate = true` the subtree is destroyed right
    /// now — only safe outside the update loop.
    ///
    /// Call at most once per entity; a second call warns and does nothing.
    pub fn destroy_entity(&mut self, entity: EntityId, immediate: bool) {
        if !self.entities.contains_key(&entity) {
            log::warn!("Attempted to destroy entity {entity} but it is not managed by this scene.");
            return;
        }
        if immediate {
            self.destroy_entity_now(entity);
            return;
        }
        if self.pending_entities.contains(&entity) {
            log::warn!("Attempted to destroy entity {entity} but it was already destroyed.");
            return;
        }
        self.pending_entities.push(entity);
    }

    /// Queue a single component for destruction, or destroy it immediately.
    pub fn destroy_component(&mut self, key: ComponentKey, immediate: bool) {
        if !self.arena.contains(key) {
            log::warn!("Attempted to destroy a component that no longer exists.");
            return;
        }
        if immediate {
            self.remove_component_by_key(key);
            return;
        }
        if self.pending_components.contains(&key) {
            log::warn!("Attempted to destroy a component that was already destroyed.");
            return;
        }
        self.pending_components.push(key);
    }

    /// The single flush point per frame: destroys every queued component,
    /// then every queued entity subtree. Call after update/render and before
    /// the next frame's update.
    pub fn destroy_pending(&mut self) {
        let components = std::mem::take(&mut self.pending_components);
        for key in components {
            // Stale keys (owner already destroyed) just miss.
            self.remove_component_by_key(key);
        }
        let entities = std::mem::take(&mut self.pending_entities);
        for entity in entities {
            if self.entities.contains_key(&entity) {
                self.destroy_entity_now(entity);
            }
        }
    }

    /// True if the entity is queued for destruction at the next flush.
    pub fn will_be_destroyed(&self, entity: EntityId) -> bool {
        self.pending_entities.contains(&entity)
    }

    /// Destroy every entity immediately, firing `on_destroy` hooks. The id
    /// space is not reset.
    pub fn clear(&mut self) {
        for root in self.roots.clone() {
            self.destroy_entity_now(root);
        }
        self.pending_entities.clear();
        self.pending_components.clear();
    }

    fn destroy_entity_now(&mut self, entity: EntityId) {
        self.detach(entity);

        // Subtree in parent-first order.
        let subtree = self.collect_subtree(entity);

        // Children first, so hooks always observe a live ancestor chain.
        for &id in subtree.iter().rev() {
            let keys: Vec<ComponentKey> = self
                .entities
                .get(&id)
                .map(|record| record.components.values().flatten().copied().collect())
                .unwrap_or_default();
            for key in keys {
                self.remove_component_by_key(key);
            }
            self.entities.remove(&id);
            self.pending_entities.retain(|p| *p != id);
        }
    }

    /// Unlink an entity from its parent's child list (or the root list).
    fn detach(&mut self, entity: EntityId) {
        let parent = self.entities.get(&entity).and_then(|r| r.parent);
        match parent {
            Some(p) => {
                if let Some(record) = self.entities.get_mut(&p) {
                    record.children.retain(|c| *c != entity);
                }
            }
            None => self.roots.retain(|r| *r != entity),
        }
    }

    fn collect_subtree(&self, entity: EntityId) -> Vec<EntityId> {
        let mut order = vec![entity];
        let mut cursor = 0;
        while cursor < order.len() {
            if let Some(record) = self.entities.get(&order[cursor]) {
                order.extend(record.children.iter().copied());
            }
            cursor += 1;
        }
        order
    }

    // ── Entity queries ───────────────────────────────────────────────

    pub fn total_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_exists(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// All root entities, in creation/insertion order.
    pub fn root_entities(&self) -> Vec<EntityId> {
        self.roots.clone()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn entity_name(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(&entity).map(|r| r.name.as_str())
    }

    pub fn set_entity_name(&mut self, entity: EntityId, name: impl Into<String>) {
        match self.entities.get_mut(&entity) {
            Some(record) => record.name = name.into(),
            None => log::warn!("Cannot rename entity {entity}: it does not exist."),
        }
    }

    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.entities.get(&entity).and_then(|r| r.parent)
    }

    pub fn children_of(&self, entity: EntityId) -> Vec<EntityId> {
        self.entities
            .get(&entity)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    /// Depth in the tree; roots are at 0.
    pub fn depth_of(&self, entity: EntityId) -> usize {
        let mut depth = 0;
        let mut current = self.parent_of(entity);
        while let Some(p) = current {
            depth += 1;
            current = self.parent_of(p);
        }
        depth
    }

    /// Breadth-first walk over every entity, roots first.
    pub fn walk_entities(&self, mut visit: impl FnMut(EntityId)) {
        let mut queue: VecDeque<EntityId> = self.roots.iter().copied().collect();
        while let Some(entity) = queue.pop_front() {
            visit(entity);
            if let Some(record) = self.entities.get(&entity) {
                queue.extend(record.children.iter().copied());
            }
        }
    }

    /// First entity with the given name, breadth-first from the roots.
    /// Prefer reference fields over name lookups where possible.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        let mut found = None;
        self.walk_entities(|entity| {
            if found.is_none() && self.entity_name(entity) == Some(name) {
                found = Some(entity);
            }
        });
        found
    }

    /// First entity with the given name among the descendants of `parent`.
    pub fn find_in(&self, name: &str, parent: EntityId) -> Option<EntityId> {
        let mut queue: VecDeque<EntityId> = self.children_of(parent).into();
        while let Some(entity) = queue.pop_front() {
            if self.entity_name(entity) == Some(name) {
                return Some(entity);
            }
            if let Some(record) = self.entities.get(&entity) {
                queue.extend(record.children.iter().copied());
            }
        }
        None
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Re-parent an entity (`None` moves it to the root). Re-parenting under
    /// the entity itself or one of its descendants is refused with a
    /// warning. Components of entities whose effective active state flips
    /// receive `on_set_active`.
    pub fn set_parent(&mut self, entity: EntityId, parent: Option<EntityId>) {
        let before = self.prepare_reparent(entity, parent);
        let Some(before) = before else { return };
        self.fire_active_transitions(before);
    }

    /// The re-linking half of `set_parent`; returns the subtree's prior
    /// effective states, or `None` if the request was refused.
    fn prepare_reparent(
        &mut self,
        entity: EntityId,
        parent: Option<EntityId>,
    ) -> Option<Vec<(EntityId, bool)>> {
        if !self.entities.contains_key(&entity) {
            log::warn!("Cannot re-parent entity {entity}: it does not exist.");
            return None;
        }
        if let Some(p) = parent {
            if !self.entities.contains_key(&p) {
                log::warn!("Cannot re-parent entity {entity}: parent {p} does not exist.");
                return None;
            }
            let mut current = Some(p);
            while let Some(id) = current {
                if id == entity {
                    log::warn!("Cannot re-parent entity {entity} under its own subtree.");
                    return None;
                }
                current = self.parent_of(id);
            }
        }
        if self.parent_of(entity) == parent {
            return Some(Vec::new());
        }

        let before = self.snapshot_effective(entity);
        self.detach(entity);
        match parent {
            Some(p) => {
                if let Some(record) = self.entities.get_mut(&p) {
                    record.children.push(entity);
                }
            }
            None => self.roots.push(entity),
        }
        if let Some(record) = self.entities.get_mut(&entity) {
            record.parent = parent;
        }
        Some(before)
    }

    /// Re-link without firing active-state hooks; used during loading, where
    /// the hook sync happens once at the end.
    pub(crate) fn set_parent_raw(&mut self, entity: EntityId, parent: Option<EntityId>) {
        self.prepare_reparent(entity, parent);
    }

    // ── Active state ─────────────────────────────────────────────────

    /// Effective activity: the local flag ANDed down the ancestor chain,
    /// recomputed on demand. A missing entity reports inactive.
    pub fn is_active(&self, entity: EntityId) -> bool {
        let mut current = Some(entity);
        while let Some(id) = current {
            let Some(record) = self.entities.get(&id) else {
                return false;
            };
            if !record.active {
                return false;
            }
            current = record.parent;
        }
        true
    }

    /// The local flag alone, ignoring ancestors.
    pub fn is_active_locally(&self, entity: EntityId) -> bool {
        self.entities.get(&entity).is_some_and(|r| r.active)
    }

    /// Set the local flag. Components of every entity in the subtree whose
    /// *effective* state flips receive `on_set_active` — including none at
    /// all, when an inactive ancestor already masks the change.
    pub fn set_active(&mut self, entity: EntityId, active: bool) {
        let Some(record) = self.entities.get(&entity) else {
            log::warn!("Cannot set active state of entity {entity}: it does not exist.");
            return;
        };
        if record.active == active {
            return;
        }
        let before = self.snapshot_effective(entity);
        if let Some(record) = self.entities.get_mut(&entity) {
            record.active = active;
        }
        self.fire_active_transitions(before);
    }

    /// Set the local flag without hooks; used during loading.
    pub(crate) fn set_active_raw(&mut self, entity: EntityId, active: bool) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.active = active;
        }
    }

    fn snapshot_effective(&self, entity: EntityId) -> Vec<(EntityId, bool)> {
        self.collect_subtree(entity)
            .into_iter()
            .map(|id| (id, self.is_active(id)))
            .collect()
    }

    fn fire_active_transitions(&mut self, before: Vec<(EntityId, bool)>) {
        for (entity, was) in before {
            let now = self.is_active(entity);
            if was != now {
                self.fire_set_active_hooks(entity, now);
            }
        }
    }

    pub(crate) fn fire_set_active_hooks(&mut self, entity: EntityId, active: bool) {
        let keys: Vec<ComponentKey> = self
            .entities
            .get(&entity)
            .map(|record| record.components.values().flatten().copied().collect())
            .unwrap_or_default();
        for key in keys {
            if let Some(mut boxed) = self.arena.take_boxed(key) {
                boxed.on_set_active(active);
                self.arena.restore_boxed(key, boxed);
            }
        }
    }

    // ── Components: attach / detach ──────────────────────────────────

    /// Attach a new `T` (built from its schema defaults) to an entity.
    /// Refused with a warning if the type is unregistered, the entity is
    /// missing, or the entity is pending destruction.
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Option<ComponentKey> {
        let Some(type_id) = self.registry.type_id_of::<T>() else {
            log::warn!(
                "Failed to add component: type `{}` is not registered.",
                std::any::type_name::<T>()
            );
            return None;
        };
        let boxed = self.registry.create(type_id)?;
        self.attach_boxed(entity, type_id, boxed, true)
    }

    /// Attach a `T` only if the entity has none yet; returns the existing or
    /// new key.
    pub fn add_component_once<T: Component>(&mut self, entity: EntityId) -> Option<ComponentKey> {
        if let Some(key) = self.first_component_key::<T>(entity) {
            return Some(key);
        }
        self.add_component::<T>(entity)
    }

    /// Attach a component by its registered name — the factory path taken by
    /// deserialization.
    pub fn add_component_by_name(&mut self, entity: EntityId, name: &str) -> Option<ComponentKey> {
        let type_id = self.registry.id_by_name(name)?;
        let boxed = self.registry.create(type_id)?;
        self.attach_boxed(entity, type_id, boxed, true)
    }

    /// Shared attach path: fires `on_create` (unless cloning), then inserts
    /// the key into the owner's per-type list and the scene-wide bucket
    /// together.
    pub(crate) fn attach_boxed(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        mut boxed: Box<dyn Component>,
        fire_create: bool,
    ) -> Option<ComponentKey> {
        if !self.entities.contains_key(&entity) {
            log::warn!("Failed to add component: entity {entity} does not exist.");
            return None;
        }
        if self.will_be_destroyed(entity) {
            log::warn!(
                "Failed to add component! You cannot add a component to an entity that is being destroyed."
            );
            return None;
        }
        if fire_create {
            boxed.on_create(self, entity);
        }
        let key = self.arena.insert(ComponentEntry {
            entity,
            type_id,
            boxed: Some(boxed),
        });
        self.bucket_mut(type_id).push(key);
        match self.entities.get_mut(&entity) {
            Some(record) => {
                record.components.entry(type_id).or_default().push(key);
                Some(key)
            }
            None => {
                // The creation hook destroyed its own entity; undo.
                log::warn!("Entity {entity} vanished while attaching a component.");
                self.bucket_mut(type_id).retain(|k| *k != key);
                self.arena.remove(key);
                None
            }
        }
    }

    /// Remove the first `T` on the entity, firing `on_destroy` and dropping
    /// it. Warns only when there is genuinely nothing to remove.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> bool {
        match self.first_component_key::<T>(entity) {
            Some(key) => {
                self.remove_component_by_key(key);
                true
            }
            None => {
                log::warn!(
                    "Failed to remove component: entity {entity} has no `{}`.",
                    std::any::type_name::<T>()
                );
                false
            }
        }
    }

    /// Erase a component from both buckets (together), fire `on_destroy`,
    /// and drop it. Stale keys miss silently.
    pub(crate) fn remove_component_by_key(&mut self, key: ComponentKey) -> bool {
        let Some((entity, type_id)) = self.arena.get(key).map(|e| (e.entity, e.type_id)) else {
            return false;
        };
        if let Some(bucket) = self.by_type.get_mut(type_id as usize) {
            bucket.retain(|k| *k != key);
        }
        if let Some(record) = self.entities.get_mut(&entity) {
            if let Some(list) = record.components.get_mut(&type_id) {
                list.retain(|k| *k != key);
                if list.is_empty() {
                    record.components.remove(&type_id);
                }
            }
        }
        if let Some(entry) = self.arena.remove(key) {
            if let Some(mut boxed) = entry.boxed {
                boxed.on_destroy(self, entity);
            }
        }
        true
    }

    fn bucket_mut(&mut self, type_id: ComponentTypeId) -> &mut Vec<ComponentKey> {
        let index = type_id as usize;
        if self.by_type.len() <= index {
            self.by_type.resize_with(index + 1, Vec::new);
        }
        &mut self.by_type[index]
    }

    // ── Components: queries ──────────────────────────────────────────

    fn first_component_key<T: Component>(&self, entity: EntityId) -> Option<ComponentKey> {
        let type_id = self.registry.type_id_of::<T>()?;
        self.entities
            .get(&entity)?
            .components
            .get(&type_id)?
            .first()
            .copied()
    }

    /// First `T` attached to the entity.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let key = self.first_component_key::<T>(entity)?;
        self.component_by_key::<T>(key)
    }

    /// First `T` attached to the entity, mutably.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let key = self.first_component_key::<T>(entity)?;
        self.arena
            .get_mut(key)?
            .boxed
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// All `T`s attached to the entity, in attachment order.
    pub fn get_components<T: Component>(&self, entity: EntityId) -> Vec<&T> {
        let Some(type_id) = self.registry.type_id_of::<T>() else {
            return Vec::new();
        };
        self.entities
            .get(&entity)
            .and_then(|record| record.components.get(&type_id))
            .map(|keys| {
                keys.iter()
                    .filter_map(|&key| self.component_by_key::<T>(key))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.first_component_key::<T>(entity).is_some()
    }

    /// First `T` among the entity's **direct** children. The scan is a
    /// single level deep on purpose; walk the tree yourself for more.
    pub fn get_component_in_children<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.entities
            .get(&entity)?
            .children
            .iter()
            .find_map(|&child| self.get_component::<T>(child))
    }

    /// All `T`s among the entity's **direct** children.
    pub fn get_components_in_children<T: Component>(&self, entity: EntityId) -> Vec<&T> {
        self.entities
            .get(&entity)
            .map(|record| {
                record
                    .children
                    .iter()
                    .flat_map(|&child| self.get_components::<T>(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nearest `T` strictly above the entity in the tree.
    pub fn get_ancestor<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let mut current = self.parent_of(entity);
        while let Some(ancestor) = current {
            if let Some(component) = self.get_component::<T>(ancestor) {
                return Some(component);
            }
            current = self.parent_of(ancestor);
        }
        None
    }

    /// Typed access through an arena key.
    pub fn component_by_key<T: Component>(&self, key: ComponentKey) -> Option<&T> {
        self.arena
            .get(key)?
            .boxed
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Visit every `T` in the scene, in bucket (insertion) order.
    pub fn for_each_component<T: Component>(&mut self, mut visit: impl FnMut(EntityId, &mut T)) {
        let Some(type_id) = self.registry.type_id_of::<T>() else {
            log::warn!(
                "Cannot iterate components: type `{}` is not registered.",
                std::any::type_name::<T>()
            );
            return;
        };
        let keys: Vec<ComponentKey> = self
            .by_type
            .get(type_id as usize)
            .cloned()
            .unwrap_or_default();
        for key in keys {
            if let Some(entry) = self.arena.get_mut(key) {
                let entity = entry.entity;
                if let Some(boxed) = entry.boxed.as_mut() {
                    if let Some(component) = boxed.as_any_mut().downcast_mut::<T>() {
                        visit(entity, component);
                    }
                }
            }
        }
    }

    /// Number of components of one type attached to an entity.
    pub(crate) fn component_bucket_len(&self, entity: EntityId, type_id: ComponentTypeId) -> usize {
        self.entities
            .get(&entity)
            .and_then(|record| record.components.get(&type_id))
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    /// Total live components across the scene.
    pub fn total_components(&self) -> usize {
        self.arena.alive_count()
    }

    // ── Component enabled flag ───────────────────────────────────────

    /// Toggle the enabled flag of the first `T` on the entity, firing
    /// `on_set_enabled` on a change.
    pub fn set_component_enabled<T: Component>(&mut self, entity: EntityId, enabled: bool) {
        let Some(key) = self.first_component_key::<T>(entity) else {
            log::warn!(
                "Cannot set enabled state: entity {entity} has no `{}`.",
                std::any::type_name::<T>()
            );
            return;
        };
        if let Some(mut boxed) = self.arena.take_boxed(key) {
            if boxed.component_data().enabled != enabled {
                boxed.component_data_mut().enabled = enabled;
                boxed.on_set_enabled(enabled);
            }
            self.arena.restore_boxed(key, boxed);
        }
    }

    // ── References ───────────────────────────────────────────────────

    /// A reference to the first `T` on `entity`, for storing in a schema
    /// field. Null (with a warning) if there is no such component.
    pub fn component_ref<T: Component>(&self, entity: EntityId) -> ComponentRef<T> {
        self.component_ref_at::<T>(entity, 0)
    }

    /// A reference to the `index`-th `T` on `entity`.
    pub fn component_ref_at<T: Component>(&self, entity: EntityId, index: usize) -> ComponentRef<T> {
        let Some(type_id) = self.registry.type_id_of::<T>() else {
            log::warn!(
                "Cannot reference `{}`: the type is not registered.",
                std::any::type_name::<T>()
            );
            return ComponentRef::none();
        };
        if index >= self.component_bucket_len(entity, type_id) {
            log::warn!(
                "Cannot reference component [{index}] of `{}` on entity {entity}: not found.",
                std::any::type_name::<T>()
            );
            return ComponentRef::none();
        }
        match self.registry.name_of(type_id) {
            Some(type_name) => ComponentRef::to(ComponentId {
                entity,
                type_name,
                index,
            }),
            None => ComponentRef::none(),
        }
    }

    /// Dereference a component reference. Null refs, vanished targets and
    /// type mismatches all yield `None`.
    pub fn get_ref<T: Component>(&self, reference: &ComponentRef<T>) -> Option<&T> {
        let id = reference.get()?;
        let type_id = self.registry.id_by_name(id.type_name)?;
        let key = self
            .entities
            .get(&id.entity)?
            .components
            .get(&type_id)?
            .get(id.index)
            .copied()?;
        self.component_by_key::<T>(key)
    }

    // ── Frame step ───────────────────────────────────────────────────

    /// Run `update` on every enabled component of every effectively active
    /// entity. Buckets are walked in type-id order (first-used-type-first)
    /// and insertion order within a bucket; neither ordering is a semantic
    /// guarantee.
    pub fn update_components(&mut self) {
        for type_index in 0..self.by_type.len() {
            let keys: Vec<ComponentKey> = self.by_type[type_index].clone();
            for key in keys {
                let gate = self.arena.get(key).and_then(|entry| {
                    entry
                        .boxed
                        .as_ref()
                        .map(|b| (entry.entity, b.component_data().enabled))
                });
                let Some((entity, enabled)) = gate else {
                    continue;
                };
                if !enabled || !self.is_active(entity) {
                    continue;
                }
                let Some(mut boxed) = self.arena.take_boxed(key) else {
                    continue;
                };
                boxed.update(self, entity);
                self.arena.restore_boxed(key, boxed);
            }
        }
    }

    // ── Serialization plumbing (see `serialize`) ─────────────────────

    pub(crate) fn take_boxed(&mut self, key: ComponentKey) -> Option<Box<dyn Component>> {
        self.arena.take_boxed(key)
    }

    pub(crate) fn restore_boxed(&mut self, key: ComponentKey, boxed: Box<dyn Component>) {
        self.arena.restore_boxed(key, boxed);
    }

    pub(crate) fn boxed_ref(&self, key: ComponentKey) -> Option<&dyn Component> {
        self.arena.get(key)?.boxed.as_deref()
    }

    /// Every component key in the scene, ordered by entity id, then type id,
    /// then attachment order — the deterministic walk the serializer uses.
    pub(crate) fn all_component_keys(&self) -> Vec<(EntityId, ComponentKey)> {
        let mut keys = Vec::new();
        for (&entity, record) in self.entities.iter() {
            for bucket in record.components.values() {
                keys.extend(bucket.iter().map(|&key| (entity, key)));
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;
    use crate::registry::ComponentRegistry;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    component! {
        struct Counter {
            ticks: u32 = 0,
        }
    }
    impl Component for Counter {
        fn update(&mut self, _scene: &mut Scene, _entity: EntityId) {
            self.ticks += 1;
        }
    }

    component! {
        struct Tag {
            label: String = String::new(),
        }
    }
    impl Component for Tag {}

    component! {
        struct ActiveProbe {
            activations: i32 = 0,
        }
    }
    impl Component for ActiveProbe {
        fn on_set_active(&mut self, active: bool) {
            self.activations += if active { 1 } else { -1 };
        }
    }

    fn test_scene() -> Scene {
        let mut registry = ComponentRegistry::new();
        registry.register::<Counter>("Counter");
        registry.register::<Tag>("Tag");
        registry.register::<ActiveProbe>("ActiveProbe");
        Scene::new(Arc::new(registry))
    }

    #[test]
    fn create_entities_in_a_tree() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        let grandchild = scene.create_entity_in(child);

        assert_eq!(scene.total_entities(), 3);
        assert_eq!(scene.root_entities(), vec![root]);
        assert_eq!(scene.parent_of(child), Some(root));
        assert_eq!(scene.children_of(root), vec![child]);
        assert_eq!(scene.depth_of(grandchild), 2);
        assert_eq!(scene.entity_name(root), Some("Entity[0]"));
    }

    #[test]
    fn entity_ids_are_never_reused() {
        let mut scene = test_scene();
        let first = scene.create_entity();
        scene.destroy_entity(first, true);
        let second = scene.create_entity();
        assert_ne!(first, second);

        scene.clear();
        let third = scene.create_entity();
        assert!(third.raw() > second.raw());
    }

    #[test]
    fn add_and_get_components() {
        let mut scene = test_scene();
        let entity = scene.create_entity();

        assert!(!scene.has_component::<Counter>(entity));
        scene.add_component::<Counter>(entity).unwrap();
        scene.add_component::<Tag>(entity).unwrap();

        assert!(scene.has_component::<Counter>(entity));
        assert_eq!(scene.get_component::<Counter>(entity).unwrap().ticks, 0);

        scene.get_component_mut::<Tag>(entity).unwrap().label = "hero".into();
        assert_eq!(scene.get_component::<Tag>(entity).unwrap().label, "hero");

        // Multiple instances of one type keep attachment order.
        scene.add_component::<Tag>(entity).unwrap();
        assert_eq!(scene.get_components::<Tag>(entity).len(), 2);
        assert_eq!(scene.get_components::<Tag>(entity)[0].label, "hero");
    }

    #[test]
    fn add_component_once_reuses_the_first() {
        let mut scene = test_scene();
        let entity = scene.create_entity();
        let first = scene.add_component_once::<Tag>(entity).unwrap();
        let second = scene.add_component_once::<Tag>(entity).unwrap();
        assert_eq!(first, second);
        assert_eq!(scene.get_components::<Tag>(entity).len(), 1);
    }

    #[test]
    fn remove_component_fires_hooks_and_unlinks() {
        static CREATED: AtomicU32 = AtomicU32::new(0);
        static DESTROYED: AtomicU32 = AtomicU32::new(0);

        component! {
            struct RemovalProbe {
                unused: i32 = 0,
            }
        }
        impl Component for RemovalProbe {
            fn on_create(&mut self, _scene: &mut Scene, _entity: EntityId) {
                CREATED.fetch_add(1, Ordering::SeqCst);
            }
            fn on_destroy(&mut self, _scene: &mut Scene, _entity: EntityId) {
                DESTROYED.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut registry = ComponentRegistry::new();
        registry.register::<RemovalProbe>("RemovalProbe");
        let mut scene = Scene::new(Arc::new(registry));

        let entity = scene.create_entity();
        scene.add_component::<RemovalProbe>(entity).unwrap();
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);

        assert!(scene.remove_component::<RemovalProbe>(entity));
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
        assert!(!scene.has_component::<RemovalProbe>(entity));
        assert_eq!(scene.total_components(), 0);

        // Genuinely missing: reports false, no second hook.
        assert!(!scene.remove_component::<RemovalProbe>(entity));
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_walks_buckets_in_insertion_order() {
        let mut scene = test_scene();
        let a = scene.create_entity();
        let b = scene.create_entity();
        scene.add_component::<Counter>(a).unwrap();
        scene.add_component::<Counter>(b).unwrap();

        scene.update_components();
        scene.update_components();

        assert_eq!(scene.get_component::<Counter>(a).unwrap().ticks, 2);
        assert_eq!(scene.get_component::<Counter>(b).unwrap().ticks, 2);
    }

    #[test]
    fn disabled_or_inactive_components_do_not_update() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        scene.add_component::<Counter>(child).unwrap();

        // Disabled component skips.
        scene.set_component_enabled::<Counter>(child, false);
        scene.update_components();
        assert_eq!(scene.get_component::<Counter>(child).unwrap().ticks, 0);
        scene.set_component_enabled::<Counter>(child, true);

        // Inactive ancestor masks the whole subtree.
        scene.set_active(root, false);
        scene.update_components();
        assert_eq!(scene.get_component::<Counter>(child).unwrap().ticks, 0);

        scene.set_active(root, true);
        scene.update_components();
        assert_eq!(scene.get_component::<Counter>(child).unwrap().ticks, 1);
    }

    #[test]
    fn effective_activity_is_the_and_over_ancestors() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        let grandchild = scene.create_entity_in(child);

        scene.set_active(root, false);
        // Local flags untouched, effective state masked.
        assert!(scene.is_active_locally(grandchild));
        assert!(!scene.is_active(grandchild));
        assert!(!scene.is_active(child));

        // Toggling the ancestor restores the subtree with no other calls.
        scene.set_active(root, true);
        assert!(scene.is_active(grandchild));
    }

    #[test]
    fn set_active_hooks_fire_only_on_effective_flips() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        scene.add_component::<ActiveProbe>(child).unwrap();

        scene.set_active(root, false);
        assert_eq!(
            scene.get_component::<ActiveProbe>(child).unwrap().activations,
            -1
        );

        // The child was already masked; its local toggle is invisible.
        scene.set_active(child, false);
        assert_eq!(
            scene.get_component::<ActiveProbe>(child).unwrap().activations,
            -1
        );

        // Un-masking the root does not help while the child is locally off.
        scene.set_active(root, true);
        assert_eq!(
            scene.get_component::<ActiveProbe>(child).unwrap().activations,
            -1
        );

        scene.set_active(child, true);
        assert_eq!(
            scene.get_component::<ActiveProbe>(child).unwrap().activations,
            0
        );
    }

    #[test]
    fn deferred_destruction_waits_for_the_flush() {
        static DESTROYED: AtomicU32 = AtomicU32::new(0);

        component! {
            struct DeferProbe {
                unused: i32 = 0,
            }
        }
        impl Component for DeferProbe {
            fn on_destroy(&mut self, _scene: &mut Scene, _entity: EntityId) {
                DESTROYED.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut registry = ComponentRegistry::new();
        registry.register::<DeferProbe>("DeferProbe");
        let mut scene = Scene::new(Arc::new(registry));

        let entity = scene.create_entity();
        scene.add_component::<DeferProbe>(entity).unwrap();

        scene.destroy_entity(entity, false);
        // Nothing freed yet.
        assert!(scene.entity_exists(entity));
        assert!(scene.will_be_destroyed(entity));
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 0);

        scene.destroy_pending();
        assert!(!scene.entity_exists(entity));
        assert_eq!(scene.total_entities(), 0);
        assert_eq!(scene.total_components(), 0);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroying_a_parent_takes_the_subtree() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        let grandchild = scene.create_entity_in(child);
        scene.add_component::<Tag>(grandchild).unwrap();

        scene.destroy_entity(root, false);
        scene.destroy_pending();

        assert_eq!(scene.total_entities(), 0);
        assert_eq!(scene.total_components(), 0);
        assert!(scene.root_entities().is_empty());
    }

    #[test]
    fn destroy_during_update_is_safe() {
        component! {
            struct SelfDestruct {
                armed: bool = true,
            }
        }
        impl Component for SelfDestruct {
            fn update(&mut self, scene: &mut Scene, entity: EntityId) {
                if self.armed {
                    scene.destroy_entity(entity, false);
                }
            }
        }

        let mut registry = ComponentRegistry::new();
        registry.register::<SelfDestruct>("SelfDestruct");
        let mut scene = Scene::new(Arc::new(registry));

        let a = scene.create_entity();
        let b = scene.create_entity();
        scene.add_component::<SelfDestruct>(a).unwrap();
        scene.add_component::<SelfDestruct>(b).unwrap();

        scene.update_components();
        // Both still present until the flush.
        assert_eq!(scene.total_entities(), 2);
        scene.destroy_pending();
        assert_eq!(scene.total_entities(), 0);
    }

    #[test]
    fn adding_to_a_dying_entity_is_refused() {
        let mut scene = test_scene();
        let entity = scene.create_entity();
        scene.destroy_entity(entity, false);
        assert!(scene.add_component::<Tag>(entity).is_none());
        scene.destroy_pending();
    }

    #[test]
    fn destroy_component_defers_too() {
        let mut scene = test_scene();
        let entity = scene.create_entity();
        let key = scene.add_component::<Counter>(entity).unwrap();

        scene.destroy_component(key, false);
        assert!(scene.has_component::<Counter>(entity));

        scene.destroy_pending();
        assert!(!scene.has_component::<Counter>(entity));
        assert!(scene.entity_exists(entity));
        assert_eq!(scene.total_components(), 0);
    }

    #[test]
    fn children_queries_are_single_level() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        let grandchild = scene.create_entity_in(child);
        scene.add_component::<Tag>(grandchild).unwrap();

        // The tag sits two levels down; the single-level scan misses it.
        assert!(scene.get_component_in_children::<Tag>(root).is_none());
        assert!(scene.get_component_in_children::<Tag>(child).is_some());

        scene.add_component::<Tag>(child).unwrap();
        assert_eq!(scene.get_components_in_children::<Tag>(root).len(), 1);
    }

    #[test]
    fn ancestor_lookup_walks_all_the_way_up() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        let grandchild = scene.create_entity_in(child);
        scene.add_component::<Tag>(root).unwrap();

        assert!(scene.get_ancestor::<Tag>(grandchild).is_some());
        assert!(scene.get_ancestor::<Tag>(root).is_none());
    }

    #[test]
    fn clone_copies_components_not_children() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let source = scene.create_entity_in(root);
        let _source_child = scene.create_entity_in(source);
        scene.set_entity_name(source, "original");
        scene.add_component::<Tag>(source).unwrap();
        scene.get_component_mut::<Tag>(source).unwrap().label = "copied".into();

        let clone = scene.clone_entity(source, None).unwrap();
        assert_eq!(scene.entity_name(clone), Some("original (copy)"));
        assert_eq!(scene.parent_of(clone), Some(root));
        assert!(scene.children_of(clone).is_empty());
        assert_eq!(scene.get_component::<Tag>(clone).unwrap().label, "copied");
    }

    #[test]
    fn reparenting_rejects_cycles() {
        let mut scene = test_scene();
        let a = scene.create_entity();
        let b = scene.create_entity_in(a);
        let c = scene.create_entity_in(b);

        scene.set_parent(a, Some(c));
        // Unchanged.
        assert_eq!(scene.parent_of(a), None);

        scene.set_parent(c, None);
        assert_eq!(scene.parent_of(c), None);
        assert!(scene.root_entities().contains(&c));
    }

    #[test]
    fn find_by_name() {
        let mut scene = test_scene();
        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        scene.set_entity_name(child, "the needle");

        assert_eq!(scene.find("the needle"), Some(child));
        assert_eq!(scene.find("missing"), None);
        assert_eq!(scene.find_in("the needle", root), Some(child));
        assert_eq!(scene.find_in("the needle", child), None);
    }

    #[test]
    fn for_each_component_visits_every_instance() {
        let mut scene = test_scene();
        let a = scene.create_entity();
        let b = scene.create_entity();
        scene.add_component::<Counter>(a).unwrap();
        scene.add_component::<Counter>(b).unwrap();

        let mut seen = Vec::new();
        scene.for_each_component::<Counter>(|entity, counter| {
            counter.ticks += 10;
            seen.push(entity);
        });
        assert_eq!(seen, vec![a, b]);
        assert_eq!(scene.get_component::<Counter>(a).unwrap().ticks, 10);
    }

    #[test]
    fn component_refs_point_and_deref() {
        let mut scene = test_scene();
        let a = scene.create_entity();
        let b = scene.create_entity();
        scene.add_component::<Tag>(b).unwrap();
        scene.get_component_mut::<Tag>(b).unwrap().label = "target".into();

        let reference = scene.component_ref::<Tag>(b);
        assert!(!reference.is_none());
        assert_eq!(scene.get_ref(&reference).unwrap().label, "target");

        // Referencing something absent yields a null ref.
        let missing = scene.component_ref::<Tag>(a);
        assert!(missing.is_none());
        assert!(scene.get_ref(&missing).is_none());
    }
}
