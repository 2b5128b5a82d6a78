//! Scene Hierarchy — active-state propagation and the frame loop.
//!
//! Builds a three-level tree of ticking components, steps a few frames, and
//! shows how toggling an ancestor's active flag gates the whole subtree and
//! how destruction defers to the end of the frame.
//!
//! Run with: `cargo run -p eldr --example scene_hierarchy`

use std::sync::Arc;

use eldr::prelude::*;

component! {
    /// Counts the frames in which it actually ran.
    struct Ticker {
        ticks: u32 = 0,
    }
}
impl Component for Ticker {
    fn update(&mut self, _scene: &mut Scene, _entity: EntityId) {
        self.ticks += 1;
    }

    fn on_set_active(&mut self, active: bool) {
        log::info!("ticker {} active", if active { "became" } else { "is no longer" });
    }
}

fn main() {
    env_logger::init();

    let mut registry = ComponentRegistry::new();
    registry.register::<Ticker>("Ticker");
    let mut scene = Scene::new(Arc::new(registry));

    let root = scene.create_entity();
    let branch = scene.create_entity_in(root);
    let leaf = scene.create_entity_in(branch);
    for entity in [root, branch, leaf] {
        scene.add_component::<Ticker>(entity).unwrap();
    }

    let ticks = |scene: &Scene, e: EntityId| scene.get_component::<Ticker>(e).unwrap().ticks;

    // Two ordinary frames.
    for _ in 0..2 {
        scene.update_components();
        scene.destroy_pending();
    }
    println!(
        "after 2 frames: root={} branch={} leaf={}",
        ticks(&scene, root),
        ticks(&scene, branch),
        ticks(&scene, leaf)
    );

    // Deactivate the middle of the tree: the leaf is masked along with it,
    // even though its own flag is still set.
    scene.set_active(branch, false);
    println!(
        "branch off: leaf locally active = {}, effectively active = {}",
        scene.is_active_locally(leaf),
        scene.is_active(leaf)
    );

    scene.update_components();
    scene.destroy_pending();
    println!(
        "after masked frame: root={} branch={} leaf={}",
        ticks(&scene, root),
        ticks(&scene, branch),
        ticks(&scene, leaf)
    );

    // Reactivate and queue the branch for destruction mid-frame: nothing is
    // freed until the flush.
    scene.set_active(branch, true);
    scene.destroy_entity(branch, false);
    println!(
        "queued for destruction; entities before flush = {}",
        scene.total_entities()
    );
    scene.destroy_pending();
    println!("entities after flush = {}", scene.total_entities());
    println!("leaf still exists: {}", scene.entity_exists(leaf));
}
