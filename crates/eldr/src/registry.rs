//! # Type Registry & Component Factory
//!
//! Components are instantiated from *runtime names* when a scene is loaded
//! from text — there is no switch statement enumerating every concrete type.
//! This module provides the two pieces that make that possible:
//!
//! - [`TypeRegistry`] — a monotonic allocator of small integer type ids.
//! - [`ComponentRegistry`] — the factory: maps each registered component type
//!   to `(name, id, constructor)`, supports construction by id or name, and
//!   answers id ↔ name lookups.
//!
//! ## Registration
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Transform>("Transform");
//! registry.register::<Sprite>("Sprite");
//! let registry = Arc::new(registry);   // frozen; shared by every scene
//! ```
//!
//! Ids are assigned in registration order, strictly increasing from 0, and
//! never reused. Every [`Scene`](crate::ecs::Scene) holding the same `Arc`
//! shares one id space, so ids are stable across scenes and save files built
//! in the same session. Tests construct their own registry — there is no
//! hidden process-wide table.

use std::any::TypeId;
use std::collections::HashMap;

use crate::ecs::Component;

/// Small integer identity for a registered component type.
///
/// Invariant: `0 <= id < total_types()` for every assigned id.
pub type ComponentTypeId = u32;

/// Monotonic type-id allocator. Ids count up from 0 and are never reused.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    next: ComponentTypeId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> ComponentTypeId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of distinct types allocated so far.
    pub fn total(&self) -> u32 {
        self.next
    }

    /// An id is valid iff it has actually been allocated.
    pub fn is_valid(&self, id: ComponentTypeId) -> bool {
        id < self.next
    }
}

type ConstructFn = fn() -> Box<dyn Component>;

/// Everything the factory knows about one registered component type.
pub struct ComponentInfo {
    pub name: &'static str,
    pub type_id: ComponentTypeId,
    construct: ConstructFn,
}

/// The component factory: name → id → constructor.
///
/// Construction through [`create`](ComponentRegistry::create) /
/// [`create_by_name`](ComponentRegistry::create_by_name) is the only way to
/// instantiate a component from data that names its type at runtime, which is
/// what generic scene deserialization is built on.
pub struct ComponentRegistry {
    ids: TypeRegistry,
    /// Indexed by type id.
    infos: Vec<ComponentInfo>,
    by_name: HashMap<&'static str, ComponentTypeId>,
    by_rust_type: HashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            ids: TypeRegistry::new(),
            infos: Vec::new(),
            by_name: HashMap::new(),
            by_rust_type: HashMap::new(),
        }
    }

    /// Register a component type under a stable name.
    ///
    /// The constructor stored for the type is `T::default()`, so every
    /// instance built by the factory starts with all of its schema defaults
    /// applied. Registering the same type (or the same name) twice logs a
    /// warning and returns the id from the first registration.
    pub fn register<T: Component + Default>(&mut self, name: &'static str) -> ComponentTypeId {
        if let Some(&existing) = self.by_rust_type.get(&TypeId::of::<T>()) {
            log::warn!("Component type \"{name}\" is already registered [{existing}]; ignoring.");
            return existing;
        }
        if let Some(&existing) = self.by_name.get(name) {
            log::warn!(
                "Component name \"{name}\" is already taken by type id [{existing}]; ignoring."
            );
            return existing;
        }

        let type_id = self.ids.allocate();
        log::info!("Registered component type \"{name}\" [{type_id}].");
        self.infos.push(ComponentInfo {
            name,
            type_id,
            construct: || Box::new(T::default()),
        });
        self.by_name.insert(name, type_id);
        self.by_rust_type.insert(TypeId::of::<T>(), type_id);
        type_id
    }

    /// Construct a component by type id, or `None` (logged) if unknown.
    pub fn create(&self, type_id: ComponentTypeId) -> Option<Box<dyn Component>> {
        match self.infos.get(type_id as usize) {
            Some(info) => Some((info.construct)()),
            None => {
                log::error!("Failed to create component: invalid type id [{type_id}].");
                None
            }
        }
    }

    /// Construct a component by registered name, or `None` (logged) if unknown.
    pub fn create_by_name(&self, name: &str) -> Option<Box<dyn Component>> {
        match self.by_name.get(name) {
            Some(&id) => self.create(id),
            None => {
                log::error!("Failed to create component: unknown type name \"{name}\".");
                None
            }
        }
    }

    /// The registered name for an id.
    pub fn name_of(&self, type_id: ComponentTypeId) -> Option<&'static str> {
        self.infos.get(type_id as usize).map(|info| info.name)
    }

    /// The id registered under a name.
    pub fn id_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// The id registered for the concrete Rust type `T`.
    pub fn type_id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_rust_type.get(&TypeId::of::<T>()).copied()
    }

    /// Number of registered types. Valid ids are `0..total_types()`.
    pub fn total_types(&self) -> u32 {
        self.ids.total()
    }

    pub fn is_valid(&self, type_id: ComponentTypeId) -> bool {
        self.ids.is_valid(type_id)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;
    use crate::ecs::Component;

    component! {
        struct Probe {
            value: i32 = 42,
        }
    }
    impl Component for Probe {}

    component! {
        struct Other {
            flag: bool = false,
        }
    }
    impl Component for Other {}

    #[test]
    fn ids_count_up_from_zero() {
        let mut reg = TypeRegistry::new();
        assert_eq!(reg.allocate(), 0);
        assert_eq!(reg.allocate(), 1);
        assert_eq!(reg.total(), 2);
        assert!(reg.is_valid(1));
        assert!(!reg.is_valid(2));
    }

    #[test]
    fn register_and_look_up() {
        let mut reg = ComponentRegistry::new();
        let probe = reg.register::<Probe>("Probe");
        let other = reg.register::<Other>("Other");

        assert_eq!(probe, 0);
        assert_eq!(other, 1);
        assert_eq!(reg.total_types(), 2);

        assert_eq!(reg.name_of(probe), Some("Probe"));
        assert_eq!(reg.id_by_name("Other"), Some(other));
        assert_eq!(reg.type_id_of::<Probe>(), Some(probe));

        // Unknown lookups miss without panicking.
        assert_eq!(reg.id_by_name("Nope"), None);
        assert_eq!(reg.name_of(99), None);
    }

    #[test]
    fn id_is_stable_across_calls() {
        let mut reg = ComponentRegistry::new();
        let first = reg.register::<Probe>("Probe");
        for _ in 0..3 {
            assert_eq!(reg.type_id_of::<Probe>(), Some(first));
        }
        assert!(first < reg.total_types());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut reg = ComponentRegistry::new();
        let first = reg.register::<Probe>("Probe");
        let second = reg.register::<Probe>("ProbeAgain");
        assert_eq!(first, second);
        assert_eq!(reg.total_types(), 1);
        // The original name stays attached to the id.
        assert_eq!(reg.name_of(first), Some("Probe"));
    }

    #[test]
    fn construct_by_name_applies_defaults() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Probe>("Probe");

        let boxed = reg.create_by_name("Probe").unwrap();
        let probe = boxed.as_any().downcast_ref::<Probe>().unwrap();
        assert_eq!(probe.value, 42);

        assert!(reg.create_by_name("Missing").is_none());
        assert!(reg.create(7).is_none());
    }
}
