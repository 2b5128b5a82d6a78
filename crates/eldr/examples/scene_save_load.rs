//! Scene Save/Load — build a small graph, round-trip it through JSON.
//!
//! Creates a parent/child pair with components (including a cross-reference
//! cycle), saves the scene to `/tmp/eldr_scene.json`, reloads it into a
//! fresh scene, and prints what came back.
//!
//! Run with: `cargo run -p eldr --example scene_save_load`

use std::sync::Arc;

use eldr::prelude::*;
use glam::Vec2;

const SAVE_PATH: &str = "/tmp/eldr_scene.json";

// ── Components ───────────────────────────────────────────────────────────

component! {
    /// A colored marker with a few field shapes to exercise serialization.
    struct Marker {
        tint: Color = Color::WHITE,
        bounds: Rect = Rect::new(0.0, 0.0, 32.0, 32.0),
        tags: Vec<String> = Vec::new(),
    }
}
impl Component for Marker {}

component! {
    /// Points at another Pal, forming reference cycles on purpose.
    struct Pal {
        friend: ComponentRef<Pal> = ComponentRef::none(),
    }
}
impl Component for Pal {}

fn main() {
    env_logger::init();

    let mut registry = ComponentRegistry::new();
    registry.register::<Transform>("Transform");
    registry.register::<Marker>("Marker");
    registry.register::<Pal>("Pal");
    let registry = Arc::new(registry);

    // Build: a root with one child; the two Pals reference each other.
    let mut scene = Scene::new(registry.clone());
    scene.set_name("save-load demo");

    let root = scene.create_entity();
    scene.set_entity_name(root, "Root");
    scene.add_component::<Transform>(root).unwrap();
    scene.add_component::<Pal>(root).unwrap();

    let child = scene.create_entity_in(root);
    scene.set_entity_name(child, "Child");
    scene.add_component::<Transform>(child).unwrap();
    scene.add_component::<Marker>(child).unwrap();
    scene.add_component::<Pal>(child).unwrap();

    if let Some(t) = scene.get_component_mut::<Transform>(child) {
        t.position = Vec2::new(10.0, -4.0);
    }
    if let Some(marker) = scene.get_component_mut::<Marker>(child) {
        marker.tint = Color::rgb(255, 128, 0);
        marker.tags = vec!["demo".into(), "child".into()];
    }

    let root_pal = scene.component_ref::<Pal>(root);
    let child_pal = scene.component_ref::<Pal>(child);
    if let Some(pal) = scene.get_component_mut::<Pal>(root) {
        pal.friend = child_pal;
    }
    if let Some(pal) = scene.get_component_mut::<Pal>(child) {
        pal.friend = root_pal;
    }

    // Save.
    scene.save_to_file(SAVE_PATH).expect("write scene file");
    println!("saved {} entities to {SAVE_PATH}", scene.total_entities());
    println!("--- document ---\n{}", scene.save_to_string());

    // Reload into a fresh scene sharing the same registry.
    let mut restored = Scene::new(registry);
    restored.load_from_file(SAVE_PATH).expect("read scene file");

    println!("--- restored ---");
    restored.walk_entities(|entity| {
        let name = restored.entity_name(entity).unwrap_or("?");
        let depth = restored.depth_of(entity);
        println!("{}{name} [{entity}]", "  ".repeat(depth));
    });

    let child = restored.find("Child").expect("child survived the trip");
    let marker = restored.get_component::<Marker>(child).expect("marker too");
    println!("child tags: {:?}, tint: {:?}", marker.tags, marker.tint);

    // The cycle came back: follow Root → Child → Root.
    let root = restored.find("Root").unwrap();
    let first_hop = restored.get_component::<Pal>(root).unwrap().friend.clone();
    let second_hop = restored.get_ref(&first_hop).unwrap().friend.clone();
    let back = restored.get_ref(&second_hop).map(|_| "resolved");
    println!("cycle round trip: {}", back.unwrap_or("broken"));
}
