//! # Eldr — A Reflective Entity/Component Simulation Kernel
//!
//! Eldr is the runtime object model for a component-based simulation:
//! heterogeneous component types are created by runtime name through a
//! factory, carry self-describing field schemas, serialize to and from a
//! JSON document (cross-references included), and live on entities organized
//! in a parent/child tree with deferred destruction.
//!
//! Start with `use eldr::prelude::*`, declare components with
//! [`component!`], register them in a
//! [`ComponentRegistry`](registry::ComponentRegistry), and drive a
//! [`Scene`](ecs::Scene).
//!
//! The kernel is single-threaded and frame-stepped; rendering, physics,
//! audio and input are external collaborators reached through the scene's
//! service provider.

pub mod ecs;
pub mod math;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod services;
pub mod transform;
