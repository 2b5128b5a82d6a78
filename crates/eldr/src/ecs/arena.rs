//! # Component Arena — Stable Keys for Boxed Components
//!
//! Every live component is owned by exactly one arena slot; the scene's
//! per-type buckets and each entity's per-type lists store [`ComponentKey`]s
//! into it. A key is the safe stand-in for pointer identity: two keys are the
//! same component iff they are equal.
//!
//! Slots are recycled, so each key carries a generation counter — the same
//! scheme as generational entity ids in archetype ECS designs. A stale key
//! (slot freed or recycled) misses instead of aliasing.
//!
//! During a lifecycle hook the component's box is *checked out* of its slot
//! so the hook can borrow the scene mutably; the slot itself stays put. If
//! the slot was freed while the box was out, restoring simply drops the box.

use crate::registry::ComponentTypeId;

use super::component::Component;
use super::entity::EntityId;

/// Stable identity of a component within one scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComponentKey {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// One live component: owner, type, and the boxed value.
pub(crate) struct ComponentEntry {
    pub entity: EntityId,
    pub type_id: ComponentTypeId,
    /// `None` only while checked out for a hook call.
    pub boxed: Option<Box<dyn Component>>,
}

struct Slot {
    generation: u32,
    entry: Option<ComponentEntry>,
}

#[derive(Default)]
pub(crate) struct ComponentArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

impl ComponentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ComponentEntry) -> ComponentKey {
        self.alive += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            ComponentKey {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            ComponentKey {
                index,
                generation: 0,
            }
        }
    }

    fn slot(&self, key: ComponentKey) -> Option<&Slot> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.entry.is_some())
    }

    pub fn get(&self, key: ComponentKey) -> Option<&ComponentEntry> {
        self.slot(key)?.entry.as_ref()
    }

    pub fn get_mut(&mut self, key: ComponentKey) -> Option<&mut ComponentEntry> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        slot.entry.as_mut()
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.slot(key).is_some()
    }

    /// Free the slot, returning the entry. The key (and any copy of it)
    /// becomes stale.
    pub fn remove(&mut self, key: ComponentKey) -> Option<ComponentEntry> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let entry = slot.entry.take()?;
        slot.generation += 1;
        self.free.push(key.index);
        self.alive -= 1;
        Some(entry)
    }

    /// Check the boxed component out of its slot for a hook call.
    pub fn take_boxed(&mut self, key: ComponentKey) -> Option<Box<dyn Component>> {
        self.get_mut(key)?.boxed.take()
    }

    /// Return a checked-out component. Drops it if the slot was freed in the
    /// meantime.
    pub fn restore_boxed(&mut self, key: ComponentKey, boxed: Box<dyn Component>) {
        match self.get_mut(key) {
            Some(entry) => entry.boxed = Some(boxed),
            None => {
                log::warn!("Component slot was freed while its value was checked out; dropping.");
            }
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }
}
