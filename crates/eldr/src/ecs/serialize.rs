//! # Scene Serialization — Whole-Graph Save and Load
//!
//! The persisted form is a JSON document keyed by entity id:
//!
//! ```json
//! {
//!   "0": {
//!     "Name": "Root",
//!     "Active": true,
//!     "Parent": -1,
//!     "Components": {
//!       "Sprite": [ { "enabled": true, "tint": "(255, 255, 255, 255)" } ]
//!     }
//!   },
//!   "1": { "Name": "Child", "Active": true, "Parent": 0, "Components": {} }
//! }
//! ```
//!
//! Component records carry the factory-registered type name, which is how the
//! loader instantiates them without enumerating concrete types. Reference
//! fields serialize as stable identifiers (`"0"`, `"0:Sprite:0"`), never as
//! anything address-like.
//!
//! ## Two-pass loading
//!
//! Pass 1 creates every entity (preserving its serialized id), re-links the
//! tree, instantiates every component by name, and populates non-reference
//! fields; reference fields record the identifier they want. Pass 2 runs
//! only after the whole graph exists and resolves every recorded want — which
//! is what lets entities and components reference each other regardless of
//! creation order, forward references and cycles included.
//!
//! All maps in the document model are `BTreeMap`s, so serializing an
//! unmodified scene twice yields byte-identical text.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{RefResolver, schematic_from_value, schematic_to_value};

use super::entity::EntityId;
use super::scene::Scene;

fn default_active() -> bool {
    true
}

fn default_parent() -> i64 {
    -1
}

/// One serialized entity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityData {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Active", default = "default_active")]
    pub active: bool,
    /// Parent entity id, or -1 for a root.
    #[serde(rename = "Parent", default = "default_parent")]
    pub parent: i64,
    /// Registered type name → one object per attached instance.
    #[serde(rename = "Components", default)]
    pub components: BTreeMap<String, Vec<Value>>,
}

/// A serialized scene: entity id (as text) → record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneData(pub BTreeMap<String, EntityData>);

impl Scene {
    /// Serialize every entity and component into a [`SceneData`].
    pub fn save(&self) -> SceneData {
        let mut document = BTreeMap::new();
        for (&entity, record) in self.entities.iter() {
            let mut components: BTreeMap<String, Vec<Value>> = BTreeMap::new();
            for (&type_id, keys) in record.components.iter() {
                let Some(type_name) = self.registry().name_of(type_id) else {
                    log::error!("Cannot save components of unregistered type id [{type_id}].");
                    continue;
                };
                let mut serialized = Vec::with_capacity(keys.len());
                for &key in keys {
                    match self.boxed_ref(key) {
                        Some(component) => serialized.push(schematic_to_value(component)),
                        None => {
                            log::error!(
                                "Component of type \"{type_name}\" was missing during save."
                            );
                        }
                    }
                }
                components.insert(type_name.to_string(), serialized);
            }
            document.insert(
                entity.to_string(),
                EntityData {
                    name: record.name.clone(),
                    active: record.active,
                    parent: record.parent.map(|p| i64::from(p.raw())).unwrap_or(-1),
                    components,
                },
            );
        }
        SceneData(document)
    }

    /// Serialize to pretty-printed JSON text. Deterministic: an unmodified
    /// scene produces identical text every time.
    pub fn save_to_string(&self) -> String {
        serde_json::to_string_pretty(&self.save())
            .expect("a scene document always serializes to JSON")
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.save_to_string())
    }

    /// Rebuild the scene from a [`SceneData`]. The current contents are
    /// cleared first. Unknown component types and malformed records are
    /// skipped with a log entry; the rest of the document still loads.
    pub fn load(&mut self, data: &SceneData) {
        self.clear();

        // Pass 1: every entity, then its components, by registered name.
        let mut parent_links: Vec<(EntityId, u32)> = Vec::new();
        for (id_text, entity_data) in data.0.iter() {
            let Ok(raw) = id_text.parse::<u32>() else {
                log::error!("Failed to load entity: invalid id '{id_text}'.");
                continue;
            };
            let entity = self.create_entity_with_id(raw);
            if !entity_data.name.is_empty() {
                self.set_entity_name(entity, entity_data.name.clone());
            }
            self.set_active_raw(entity, entity_data.active);
            if entity_data.parent >= 0 {
                parent_links.push((entity, entity_data.parent as u32));
            }

            for (type_name, items) in entity_data.components.iter() {
                let Some(type_id) = self.registry().id_by_name(type_name) else {
                    log::error!(
                        "Failed to add component of type \"{type_name}\" due to invalid type!"
                    );
                    continue;
                };
                for item in items {
                    let Some(boxed) = self.registry().create(type_id) else {
                        continue;
                    };
                    let Some(key) = self.attach_boxed(entity, type_id, boxed, true) else {
                        continue;
                    };
                    let Some(mut checked_out) = self.take_boxed(key) else {
                        continue;
                    };
                    checked_out.on_load_start();
                    schematic_from_value(&mut *checked_out, item);
                    self.restore_boxed(key, checked_out);
                }
            }
        }

        // Tree links once every entity exists.
        for (entity, parent_raw) in parent_links {
            let parent = EntityId(parent_raw);
            if self.entity_exists(parent) {
                self.set_parent_raw(entity, Some(parent));
            } else {
                log::warn!("Entity with id '{parent_raw}' does not exist in this scene.");
            }
        }

        // Pass 2: resolve recorded references against the complete graph.
        for (_, key) in self.all_component_keys() {
            let Some(mut checked_out) = self.take_boxed(key) else {
                continue;
            };
            {
                let mut resolver = RefResolver::new(&*self);
                checked_out.resolve_refs(&mut resolver);
            }
            self.restore_boxed(key, checked_out);
        }

        // Every component learns that loading is finished.
        for (entity, key) in self.all_component_keys() {
            let Some(mut checked_out) = self.take_boxed(key) else {
                continue;
            };
            checked_out.on_load_finish(self, entity);
            self.restore_boxed(key, checked_out);
        }

        // Sync active-state hooks for anything loaded inactive.
        for entity in self.entity_ids() {
            if !self.is_active(entity) {
                self.fire_set_active_hooks(entity, false);
            }
        }

        if self.total_entities() != data.0.len() {
            log::warn!(
                "Loaded {} of {} serialized entities.",
                self.total_entities(),
                data.0.len()
            );
        }
    }

    pub fn load_from_string(&mut self, text: &str) -> Result<(), serde_json::Error> {
        let data: SceneData = serde_json::from_str(text)?;
        self.load(&data);
        Ok(())
    }

    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_from_string(&text).map_err(std::io::Error::other)
    }
}
