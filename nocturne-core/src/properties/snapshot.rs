//! Selection snapshots.
//!
//! Copies the editable state of selected nodes out of the scene so that the
//! property sheet can be built without touching the scene again.

use std::collections::BTreeMap;

use glam::Vec3;

use super::panel::PropertyValue::{Bool, Count, Text, Vector};
use super::panel::{validate_panel, NodeSnapshot, PanelKind, PropertyField};
use crate::graph::NodeId;
use crate::scene::{NodeEntry, NodeKind, Scene};

impl Scene {
    /// Snapshot the given nodes, skipping handles that are no longer live.
    pub fn snapshot(&self, ids: &[NodeId]) -> Vec<NodeSnapshot> {
        ids.iter()
            .filter_map(|&id| {
                let entry = self.node(id)?;
                let mut panels = BTreeMap::new();
                for panel in PanelKind::ALL {
                    if validate_panel(entry.node_type(), panel) {
                        panels.insert(panel, self.panel_fields(id, entry, panel));
                    }
                }
                Some(NodeSnapshot {
                    id,
                    uid: entry.scene_node().uid(),
                    name: entry.scene_node().name().to_string(),
                    node_type: entry.node_type(),
                    panels,
                })
            })
            .collect()
    }

    fn panel_fields(&self, id: NodeId, entry: &NodeEntry, panel: PanelKind) -> Vec<PropertyField> {
        let field = PropertyField::new;

        match (panel, entry.kind()) {
            (PanelKind::General, _) => vec![
                field("name", Text(entry.scene_node().name().to_string())),
                field("type", Text(entry.node_type().name().to_string())),
            ],
            (PanelKind::Hierarchy, _) => entry
                .hierarchy()
                .map(|h| {
                    vec![
                        field("hidden", Bool(h.is_hidden())),
                        field("live", Bool(h.is_live())),
                        field("visible", Bool(self.is_visible(id))),
                    ]
                })
                .unwrap_or_default(),
            (PanelKind::Transform, _) => entry
                .transform()
                .map(|t| {
                    let c = t.components();
                    vec![
                        field("scale", Vector(c.scale)),
                        field("rotate", Vector(Vec3::from_array(c.rotate.to_array().map(f32::to_degrees)))),
                        field("translate", Vector(c.translate)),
                        field("inherit_transform", Bool(c.inherit_transform)),
                    ]
                })
                .unwrap_or_default(),
            (PanelKind::Light, NodeKind::Light(light)) => vec![field("color", Vector(light.color()))],
            (PanelKind::Locator, NodeKind::Locator(locator)) => {
                let shape = format!("{:?}", locator.shape()).to_lowercase();
                vec![field("shape", Text(shape))]
            }
            (PanelKind::Mesh, NodeKind::Mesh(mesh)) => vec![
                field("bounds_min", Vector(mesh.bounds().min)),
                field("bounds_max", Vector(mesh.bounds().max)),
            ],
            (PanelKind::Entity, NodeKind::Entity(entity)) => {
                let class = entity
                    .set()
                    .and_then(|set| self.entity_set(set))
                    .map(|set| set.class_path().to_string())
                    .unwrap_or_default();
                vec![field("class", Text(class))]
            }
            (PanelKind::EntitySet, NodeKind::EntitySet(set)) => vec![
                field("class", Text(set.class_path().to_string())),
                field("instances", Count(set.instances().len())),
            ],
            (PanelKind::Layer, NodeKind::Layer(layer)) => vec![
                field("visible", Bool(layer.is_visible())),
                field("selectable", Bool(layer.is_selectable())),
                field("color", Vector(layer.color())),
                field("members", Count(entry.scene_node().descendants().len())),
            ],
            (PanelKind::Skin, NodeKind::Skin(skin)) => vec![
                field("influence_objects", Count(skin.influence_objects().len())),
                field("influences", Count(skin.influences().len())),
            ],
            (PanelKind::Membership, _) => {
                let mut names: Vec<&str> = self
                    .layers_of(id)
                    .into_iter()
                    .filter_map(|layer| self.name(layer))
                    .collect();
                names.sort_by_key(|name| name.to_lowercase());
                vec![field("layers", Text(names.join(", ")))]
            }
            _ => Vec::new(),
        }
    }
}
