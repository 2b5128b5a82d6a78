//! # The Entity/Component Runtime
//!
//! - [`entity`] — plain integer entity ids and the per-entity record
//! - [`arena`] — generational arena owning every boxed component
//! - [`component`] — the [`Component`] trait, hooks, and the
//!   [`component!`](crate::component) macro
//! - [`scene`] — the live graph: tree, buckets, frame stepping
//! - [`serialize`] — whole-graph save/load with two-pass reference fix-up

pub(crate) mod arena;
pub mod component;
pub mod entity;
pub mod scene;
pub mod serialize;

pub use arena::ComponentKey;
pub use component::{AsComponentData, Component, ComponentData, ComponentObject};
pub use entity::EntityId;
pub use scene::Scene;
pub use serialize::{EntityData, SceneData};
