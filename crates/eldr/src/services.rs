//! # Services — By-Type Singleton Lookup
//!
//! The simulation core does not draw, mix audio, or read input; it only
//! hands components a way to *find* those collaborators. A
//! [`ServiceProvider`] stores one value per type, keyed by type token, and
//! every [`Scene`](crate::ecs::Scene) owns one.
//!
//! ```ignore
//! scene.services_mut().insert(Renderer::new(...));
//! // later, inside a component hook:
//! let renderer = scene.service::<Renderer>();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Type-keyed singleton storage for engine services.
#[derive(Default)]
pub struct ServiceProvider {
    services: HashMap<TypeId, Box<dyn Any>>,
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Insert a service, replacing any existing one of the same type.
    pub fn insert<T: 'static>(&mut self, service: T) {
        self.services.insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Get a service.
    ///
    /// # Panics
    ///
    /// Panics if no service of this type has been inserted.
    pub fn service<T: 'static>(&self) -> &T {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "Service `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// Try to get a service. Returns `None` if not present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| s.downcast_ref::<T>())
    }

    /// Try to get a service mutably. Returns `None` if not present.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.services
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.downcast_mut::<T>())
    }

    pub fn has<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Remove a service, taking ownership. Returns `None` if not present.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.services
            .remove(&TypeId::of::<T>())
            .and_then(|s| s.downcast::<T>().ok())
            .map(|b| *b)
    }
}
