//! Scene Persistence
//!
//! A [`SceneDocument`] is a flat list of node records keyed by persistent
//! id. Only authored state is stored: names, parents, transform components,
//! persistent flags, kind data and the dependencies that are not implied by
//! the hierarchy or by a node's kind. Classification, dirty state, visited
//! ids and every cached matrix or bound are rebuilt on load.
//!
//! # Encodings
//!
//! - MessagePack with named fields (`rmp-serde`)
//! - JSON (`serde_json`)
//!
//! # Loading
//!
//! Nodes are created first, then parented in record order (records are
//! written parents first, so child order survives), then kind references
//! and the remaining dependencies are reconnected. References to ids that
//! are not in the document are dropped and logged.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::SceneConfig;
use crate::error::PersistError;
use crate::graph::{NodeId, SceneNode};
use crate::scene::{
    Aabb, Entity, EntitySet, Influence, Layer, Light, Locator, LocatorShape, Mesh, NodeEntry,
    NodeKind, NodeType, Scene, Skin, Transform, TransformComponents, TraversalAction,
};

/// Serialized form of a whole scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Persistent id of the root transform.
    pub root: Uuid,
    pub nodes: Vec<NodeRecord>,
}

/// One node. The root has no record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uid: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformComponents>,
    /// Dependencies other than the parent and the ones implied by `kind`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Uuid>,
    pub kind: KindRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindRecord {
    Transform,
    Light {
        color: Vec3,
    },
    Locator {
        shape: LocatorShape,
    },
    Mesh {
        /// `None` for an empty box.
        bounds: Option<Aabb>,
    },
    Entity {
        set: Option<Uuid>,
    },
    EntitySet {
        class_path: String,
        class_bounds: Option<Aabb>,
    },
    Layer {
        visible: bool,
        selectable: bool,
        color: Vec3,
        members: Vec<Uuid>,
    },
    Skin {
        mesh: Option<Uuid>,
        influence_objects: Vec<Uuid>,
        influences: Vec<Influence>,
    },
}

impl SceneDocument {
    pub fn to_msgpack(&self) -> Result<Vec<u8>, PersistError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, PersistError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Scene {
    /// Capture the scene's authored state.
    pub fn to_document(&self) -> SceneDocument {
        let root = self.root();
        let mut order = Vec::with_capacity(self.node_count());
        let push_subtree = |scene: &Scene, start: NodeId, order: &mut Vec<NodeId>| {
            scene.traverse_hierarchy(start, |id, _| {
                if id != root {
                    order.push(id);
                }
                TraversalAction::Continue
            });
        };

        push_subtree(self, root, &mut order);
        // Nodes outside the hierarchy, and subtrees detached from it
        let detached: Vec<NodeId> = self
            .node_ids()
            .filter(|&id| id != root && self.parent(id).is_none())
            .collect();
        for id in detached {
            if !order.contains(&id) {
                push_subtree(self, id, &mut order);
            }
        }

        SceneDocument {
            root: self.uid(root).unwrap_or_default(),
            nodes: order.into_iter().filter_map(|id| self.record(id)).collect(),
        }
    }

    fn record(&self, id: NodeId) -> Option<NodeRecord> {
        let entry = self.node(id)?;
        let uid_of = |node: NodeId| self.uid(node);
        let parent = self.parent(id);

        let dependencies = match entry.node_type() {
            // Skin inputs are rebuilt from the skin's references
            NodeType::Skin => Vec::new(),
            _ => entry
                .scene_node()
                .ancestors()
                .iter()
                .copied()
                .filter(|&a| Some(a) != parent)
                .filter(|&a| {
                    !matches!(
                        self.node_type(a),
                        Some(NodeType::Layer | NodeType::EntitySet | NodeType::Skin)
                    )
                })
                .filter_map(uid_of)
                .collect(),
        };

        let kind = match entry.kind() {
            NodeKind::Transform => KindRecord::Transform,
            NodeKind::Light(light) => KindRecord::Light {
                color: light.color(),
            },
            NodeKind::Locator(locator) => KindRecord::Locator {
                shape: locator.shape(),
            },
            NodeKind::Mesh(mesh) => KindRecord::Mesh {
                bounds: (!mesh.bounds().is_empty()).then_some(mesh.bounds()),
            },
            NodeKind::Entity(entity) => KindRecord::Entity {
                set: entity.set().and_then(uid_of),
            },
            NodeKind::EntitySet(set) => KindRecord::EntitySet {
                class_path: set.class_path().to_string(),
                class_bounds: set.class_bounds(),
            },
            NodeKind::Layer(layer) => KindRecord::Layer {
                visible: layer.is_visible(),
                selectable: layer.is_selectable(),
                color: layer.color(),
                members: entry
                    .scene_node()
                    .descendants()
                    .iter()
                    .copied()
                    .filter_map(uid_of)
                    .collect(),
            },
            NodeKind::Skin(skin) => KindRecord::Skin {
                mesh: skin.mesh().and_then(uid_of),
                influence_objects: skin
                    .influence_objects()
                    .iter()
                    .copied()
                    .filter_map(uid_of)
                    .collect(),
                influences: skin.influences().to_vec(),
            },
        };

        Some(NodeRecord {
            uid: entry.scene_node().uid(),
            name: entry.scene_node().name().to_string(),
            parent: parent.and_then(uid_of),
            hidden: entry.hierarchy().is_some_and(|h| h.is_hidden()),
            live: entry.hierarchy().is_some_and(|h| h.is_live()),
            transform: entry.transform().map(|t| *t.components()),
            dependencies,
            kind,
        })
    }

    /// Rebuild a scene from a document. The returned scene is fully dirty;
    /// evaluate it before querying derived state.
    pub fn from_document(config: SceneConfig, document: &SceneDocument) -> Result<Scene, PersistError> {
        let mut scene = Scene::with_root_uid(config, document.root);
        let mut ids: HashMap<Uuid, NodeId> = HashMap::with_capacity(document.nodes.len() + 1);
        ids.insert(document.root, scene.root());

        for record in &document.nodes {
            if ids.contains_key(&record.uid) {
                return Err(PersistError::DuplicateId(record.uid));
            }
            let id = scene.insert_entry(new_entry(record));
            ids.insert(record.uid, id);
        }

        for record in &document.nodes {
            let Some(parent) = record.parent else {
                continue;
            };
            let Some(&parent_id) = ids.get(&parent) else {
                return Err(PersistError::UnknownParent {
                    node: record.uid,
                    parent,
                });
            };
            scene.set_parent(ids[&record.uid], parent_id)?;
        }

        for record in &document.nodes {
            let id = ids[&record.uid];
            match &record.kind {
                KindRecord::Entity { set: Some(set) } => match ids.get(set) {
                    Some(&set) => scene.link_entity(id, set)?,
                    None => debug!(node = %record.uid, set = %set, "dropping unknown entity set"),
                },
                KindRecord::Layer { members, .. } => {
                    for member in members {
                        match ids.get(member) {
                            Some(&member) => scene.add_layer_member(id, member)?,
                            None => debug!(layer = %record.uid, member = %member, "dropping unknown layer member"),
                        }
                    }
                }
                KindRecord::Skin {
                    mesh: Some(mesh),
                    influence_objects,
                    ..
                } => {
                    let mesh = ids.get(mesh).copied();
                    let objects: Option<Vec<NodeId>> =
                        influence_objects.iter().map(|uid| ids.get(uid).copied()).collect();
                    match (mesh, objects) {
                        (Some(mesh), Some(objects)) => scene.bind_skin(id, mesh, objects)?,
                        _ => debug!(skin = %record.uid, "dropping skin binding with unknown references"),
                    }
                }
                _ => {}
            }
        }

        for record in &document.nodes {
            let id = ids[&record.uid];
            for dependency in &record.dependencies {
                match ids.get(dependency) {
                    Some(&ancestor) => scene.create_dependency(id, ancestor)?,
                    None => debug!(node = %record.uid, dependency = %dependency, "dropping unknown dependency"),
                }
            }
        }

        debug!(nodes = document.nodes.len(), "scene loaded");
        Ok(scene)
    }
}

/// Unlinked arena entry for a record. References are resolved later.
fn new_entry(record: &NodeRecord) -> NodeEntry {
    let kind = match &record.kind {
        KindRecord::Transform => NodeKind::Transform,
        KindRecord::Light { color } => NodeKind::Light(Light { color: *color }),
        KindRecord::Locator { shape } => NodeKind::Locator(Locator { shape: *shape }),
        KindRecord::Mesh { bounds } => NodeKind::Mesh(Mesh {
            bounds: bounds.unwrap_or(Aabb::EMPTY),
        }),
        KindRecord::Entity { .. } => NodeKind::Entity(Entity::default()),
        KindRecord::EntitySet {
            class_path,
            class_bounds,
        } => NodeKind::EntitySet(EntitySet {
            class_path: class_path.clone(),
            class_bounds: *class_bounds,
            instances: Vec::new(),
        }),
        KindRecord::Layer {
            visible,
            selectable,
            color,
            ..
        } => NodeKind::Layer(Layer {
            visible: *visible,
            selectable: *selectable,
            color: *color,
            members: Vec::new(),
        }),
        KindRecord::Skin { influences, .. } => {
            NodeKind::Skin(Skin::with_influences(influences.clone()))
        }
    };

    let mut entry = NodeEntry::new(SceneNode::with_uid(record.uid, &record.name), kind);
    if let Some(hierarchy) = entry.hierarchy.as_mut() {
        hierarchy.hidden = record.hidden;
        hierarchy.live = record.live;
    }
    if let (Some(components), Some(transform)) = (record.transform, entry.transform.as_mut()) {
        *transform = Transform::new(components);
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Scene, NodeId, NodeId) {
        let mut scene = Scene::default();
        let group = scene.create_transform("group");
        let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
        let layer = scene.create_layer("layer");
        scene.set_parent(mesh, group).unwrap();
        scene.set_translate(group, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        scene.add_layer_member(layer, mesh).unwrap();
        scene.evaluate().unwrap();
        (scene, group, mesh)
    }

    #[test]
    fn records_are_written_parents_first() {
        let (scene, group, mesh) = sample();
        let document = scene.to_document();

        let position = |id: NodeId| {
            let uid = scene.uid(id).unwrap();
            document.nodes.iter().position(|r| r.uid == uid).unwrap()
        };
        assert!(position(group) < position(mesh));
        assert_eq!(document.nodes.len(), 3);
    }

    #[test]
    fn json_round_trip_rebuilds_links() {
        let (scene, group, mesh) = sample();
        let json = scene.to_document().to_json().unwrap();

        let document = SceneDocument::from_json(&json).unwrap();
        let mut loaded = Scene::from_document(SceneConfig::default(), &document).unwrap();
        loaded.evaluate().unwrap();

        let loaded_mesh = loaded.find_by_uid(scene.uid(mesh).unwrap()).unwrap();
        let loaded_group = loaded.find_by_uid(scene.uid(group).unwrap()).unwrap();
        assert_eq!(loaded.parent(loaded_mesh), Some(loaded_group));
        assert_eq!(loaded.layers_of(loaded_mesh).len(), 1);
        assert_eq!(
            loaded.global_transform(loaded_mesh),
            scene.global_transform(mesh)
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (scene, _, _) = sample();
        let mut document = scene.to_document();
        let copy = document.nodes[0].clone();
        document.nodes.push(copy);

        assert!(matches!(
            Scene::from_document(SceneConfig::default(), &document),
            Err(PersistError::DuplicateId(_))
        ));
    }

    #[test]
    fn unknown_layer_members_are_dropped() {
        let (scene, _, _) = sample();
        let mut document = scene.to_document();
        for record in &mut document.nodes {
            if let KindRecord::Layer { members, .. } = &mut record.kind {
                members.push(Uuid::new_v4());
            }
        }

        let loaded = Scene::from_document(SceneConfig::default(), &document).unwrap();
        let layer = loaded
            .node_ids()
            .find(|&id| loaded.node_type(id) == Some(NodeType::Layer))
            .unwrap();
        assert_eq!(loaded.layer_members(layer).unwrap().len(), 1);
    }
}
