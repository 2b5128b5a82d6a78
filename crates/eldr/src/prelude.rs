//! Convenience re-exports — `use eldr::prelude::*` for the common items.

pub use crate::ecs::{
    AsComponentData, Component, ComponentData, ComponentKey, ComponentObject, EntityData,
    EntityId, Scene, SceneData,
};
pub use crate::math::{Color, Rect};
pub use crate::registry::{ComponentRegistry, ComponentTypeId, TypeRegistry};
pub use crate::schema::{
    ComponentId, ComponentRef, EntityRef, RefResolver, SchemaRoot, SchemaValue, Schematic, Value,
};
pub use crate::services::ServiceProvider;
pub use crate::transform::Transform;

pub use crate::{component, schema, schema_enum};
