//! The built-in spatial component: position, rotation, scale.

use glam::Vec2;

use crate::component;
use crate::ecs::Component;

component! {
    /// Where an entity sits in 2D space. Purely data — systems that draw or
    /// simulate read it through the scene.
    pub struct Transform {
        pub position: Vec2 = Vec2::ZERO,
        /// Radians, counter-clockwise.
        pub rotation: f32 = 0.0,
        pub scale: Vec2 = Vec2::ONE,
    }
}

impl Component for Transform {}

impl Transform {
    pub fn from_xy(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Default::default()
        }
    }

    /// Position composed with every ancestor's position, the cheap
    /// translation-only form of world placement.
    pub fn world_position(scene: &crate::ecs::Scene, entity: crate::ecs::EntityId) -> Vec2 {
        let mut total = scene
            .get_component::<Transform>(entity)
            .map(|t| t.position)
            .unwrap_or(Vec2::ZERO);
        let mut current = scene.parent_of(entity);
        while let Some(ancestor) = current {
            if let Some(t) = scene.get_component::<Transform>(ancestor) {
                total += t.position;
            }
            current = scene.parent_of(ancestor);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentRegistry;
    use crate::schema::{Schematic, schematic_from_value, schematic_to_value};
    use std::sync::Arc;

    #[test]
    fn members_include_the_shared_layer() {
        let transform = Transform::default();
        assert_eq!(transform.member_count(), 4);
        let names: Vec<_> = (0..transform.member_count())
            .map(|i| transform.member_name(i).unwrap())
            .collect();
        assert_eq!(names, ["enabled", "position", "rotation", "scale"]);
        assert_eq!(transform.member_type(1), Some("Vec2"));
    }

    #[test]
    fn transform_round_trips() {
        let mut original = Transform::from_xy(3.0, -4.5);
        original.rotation = 1.25;
        original.scale = Vec2::new(2.0, 2.0);

        let value = schematic_to_value(&original);
        let mut restored = Transform::default();
        assert!(schematic_from_value(&mut restored, &value));

        assert_eq!(restored.position, original.position);
        assert_eq!(restored.rotation, original.rotation);
        assert_eq!(restored.scale, original.scale);
    }

    #[test]
    fn world_position_sums_the_ancestor_chain() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Transform>("Transform");
        let mut scene = crate::ecs::Scene::new(Arc::new(registry));

        let root = scene.create_entity();
        let child = scene.create_entity_in(root);
        scene.add_component::<Transform>(root).unwrap();
        scene.add_component::<Transform>(child).unwrap();
        scene.get_component_mut::<Transform>(root).unwrap().position = Vec2::new(100.0, 0.0);
        scene.get_component_mut::<Transform>(child).unwrap().position = Vec2::new(10.0, 5.0);

        assert_eq!(
            Transform::world_position(&scene, child),
            Vec2::new(110.0, 5.0)
        );
    }
}
