//! Property Panels
//!
//! A property sheet is built from [`NodeSnapshot`]s, never from the live
//! scene, so it can be generated off the caller's thread.
//!
//! # Styles
//!
//! - [`PropertiesStyle::Intersection`]: only panels every selected node
//!   accepts are shown, each listing the whole selection.
//! - [`PropertiesStyle::Union`]: every panel at least one node accepts is
//!   shown, each listing only the nodes that accepted it.
//!
//! Within a panel, a field is shown when every listed node has it. Its value
//! is shown when all of them agree and left blank (mixed) otherwise.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cancel::SelectionToken;
use crate::graph::NodeId;
use crate::scene::NodeType;

/// How panels are combined across a multi-selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertiesStyle {
    #[default]
    Intersection,
    Union,
}

/// The panels a property sheet can contain, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelKind {
    General,
    Hierarchy,
    Transform,
    Light,
    Locator,
    Mesh,
    Entity,
    EntitySet,
    Layer,
    Skin,
    /// Layers a hierarchy node belongs to.
    Membership,
}

impl PanelKind {
    pub const ALL: [PanelKind; 11] = [
        PanelKind::General,
        PanelKind::Hierarchy,
        PanelKind::Transform,
        PanelKind::Light,
        PanelKind::Locator,
        PanelKind::Mesh,
        PanelKind::Entity,
        PanelKind::EntitySet,
        PanelKind::Layer,
        PanelKind::Skin,
        PanelKind::Membership,
    ];
}

/// Whether a node of `node_type` accepts `panel`.
pub fn validate_panel(node_type: NodeType, panel: PanelKind) -> bool {
    match panel {
        PanelKind::General => true,
        PanelKind::Hierarchy | PanelKind::Membership => node_type.is_hierarchy(),
        PanelKind::Transform => node_type.has_transform(),
        PanelKind::Light => node_type == NodeType::Light,
        PanelKind::Locator => node_type == NodeType::Locator,
        PanelKind::Mesh => node_type == NodeType::Mesh,
        PanelKind::Entity => node_type == NodeType::Entity,
        PanelKind::EntitySet => node_type == NodeType::EntitySet,
        PanelKind::Layer => node_type == NodeType::Layer,
        PanelKind::Skin => node_type == NodeType::Skin,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Bool(bool),
    Vector(Vec3),
    Count(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyField {
    pub name: &'static str,
    pub value: PropertyValue,
}

impl PropertyField {
    pub fn new(name: &'static str, value: PropertyValue) -> Self {
        Self { name, value }
    }
}

/// Owned copy of one selected node's properties, grouped by panel.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub uid: Uuid,
    pub name: String,
    pub node_type: NodeType,
    pub panels: BTreeMap<PanelKind, Vec<PropertyField>>,
}

/// A field shown in a panel. `None` means the listed nodes disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelField {
    pub name: &'static str,
    pub value: Option<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub kind: PanelKind,
    /// Nodes the panel edits.
    pub nodes: Vec<NodeId>,
    pub fields: Vec<PanelField>,
}

impl Panel {
    fn build(kind: PanelKind, nodes: &[&NodeSnapshot]) -> Self {
        let empty = Vec::new();
        let lists: Vec<&Vec<PropertyField>> = nodes
            .iter()
            .map(|node| node.panels.get(&kind).unwrap_or(&empty))
            .collect();

        let mut fields = Vec::new();
        if let Some((first, rest)) = lists.split_first() {
            for field in first.iter() {
                let mut value = Some(field.value.clone());
                let mut shared = true;
                for list in rest {
                    match list.iter().find(|f| f.name == field.name) {
                        Some(other) if value.as_ref() == Some(&other.value) => {}
                        Some(_) => value = None,
                        None => {
                            shared = false;
                            break;
                        }
                    }
                }
                if shared {
                    fields.push(PanelField {
                        name: field.name,
                        value,
                    });
                }
            }
        }

        Self {
            kind,
            nodes: nodes.iter().map(|node| node.id).collect(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&PanelField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The generated sheet for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySheet {
    /// Generation of the selection this sheet was built for.
    pub selection_id: u32,
    pub style: PropertiesStyle,
    pub panels: Vec<Panel>,
}

impl PropertySheet {
    pub fn empty(selection_id: u32, style: PropertiesStyle) -> Self {
        Self {
            selection_id,
            style,
            panels: Vec::new(),
        }
    }

    pub fn panel(&self, kind: PanelKind) -> Option<&Panel> {
        self.panels.iter().find(|p| p.kind == kind)
    }
}

/// Build the sheet for `selection`.
///
/// Returns `None` as soon as `token` goes stale.
pub fn generate(
    style: PropertiesStyle,
    selection: &[NodeSnapshot],
    token: &SelectionToken,
) -> Option<PropertySheet> {
    let mut intersecting: Vec<PanelKind> = PanelKind::ALL.to_vec();
    let mut unioned: BTreeMap<PanelKind, Vec<&NodeSnapshot>> = BTreeMap::new();

    for node in selection {
        if !token.is_current() {
            return None;
        }

        match style {
            PropertiesStyle::Intersection => {
                intersecting.retain(|&panel| validate_panel(node.node_type, panel));
                if intersecting.is_empty() {
                    break;
                }
            }
            PropertiesStyle::Union => {
                for panel in PanelKind::ALL {
                    if validate_panel(node.node_type, panel) {
                        unioned.entry(panel).or_default().push(node);
                    }
                }
            }
        }
    }

    let groups: Vec<(PanelKind, Vec<&NodeSnapshot>)> = match style {
        PropertiesStyle::Intersection if selection.is_empty() => Vec::new(),
        PropertiesStyle::Intersection => intersecting
            .into_iter()
            .map(|panel| (panel, selection.iter().collect()))
            .collect(),
        PropertiesStyle::Union => unioned.into_iter().collect(),
    };

    let mut panels = Vec::with_capacity(groups.len());
    for (kind, nodes) in groups {
        if !token.is_current() {
            return None;
        }
        panels.push(Panel::build(kind, &nodes));
    }

    Some(PropertySheet {
        selection_id: token.id(),
        style,
        panels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::cancel::SelectionCounter;
    use slotmap::KeyData;

    fn snapshot(key: u64, node_type: NodeType, panels: &[(PanelKind, Vec<PropertyField>)]) -> NodeSnapshot {
        NodeSnapshot {
            id: NodeId::from(KeyData::from_ffi(key)),
            uid: Uuid::new_v4(),
            name: format!("node{key}"),
            node_type,
            panels: panels.iter().cloned().collect(),
        }
    }

    fn hidden(value: bool) -> PropertyField {
        PropertyField::new("hidden", PropertyValue::Bool(value))
    }

    #[test]
    fn layer_rejects_membership_panel() {
        assert!(validate_panel(NodeType::Layer, PanelKind::Layer));
        assert!(!validate_panel(NodeType::Layer, PanelKind::Membership));
        assert!(validate_panel(NodeType::Mesh, PanelKind::Membership));
        assert!(!validate_panel(NodeType::Mesh, PanelKind::Transform));
        assert!(validate_panel(NodeType::Entity, PanelKind::Transform));
    }

    #[test]
    fn intersection_keeps_shared_panels() {
        let counter = SelectionCounter::default();
        let token = counter.advance();
        let selection = vec![
            snapshot(1, NodeType::Light, &[(PanelKind::Hierarchy, vec![hidden(false)])]),
            snapshot(2, NodeType::Mesh, &[(PanelKind::Hierarchy, vec![hidden(true)])]),
        ];

        let sheet = generate(PropertiesStyle::Intersection, &selection, &token).unwrap();

        let kinds: Vec<PanelKind> = sheet.panels.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PanelKind::General, PanelKind::Hierarchy, PanelKind::Membership]);

        let hierarchy = sheet.panel(PanelKind::Hierarchy).unwrap();
        assert_eq!(hierarchy.nodes.len(), 2);
        assert_eq!(hierarchy.field("hidden").unwrap().value, None);
    }

    #[test]
    fn union_lists_accepting_nodes() {
        let counter = SelectionCounter::default();
        let token = counter.advance();
        let light = snapshot(1, NodeType::Light, &[]);
        let layer = snapshot(2, NodeType::Layer, &[]);
        let selection = vec![light.clone(), layer.clone()];

        let sheet = generate(PropertiesStyle::Union, &selection, &token).unwrap();

        assert_eq!(sheet.panel(PanelKind::Light).unwrap().nodes, vec![light.id]);
        assert_eq!(sheet.panel(PanelKind::Layer).unwrap().nodes, vec![layer.id]);
        assert_eq!(sheet.panel(PanelKind::General).unwrap().nodes.len(), 2);
    }

    #[test]
    fn fields_missing_on_one_node_are_culled() {
        let counter = SelectionCounter::default();
        let token = counter.advance();
        let live = PropertyField::new("live", PropertyValue::Bool(true));
        let selection = vec![
            snapshot(1, NodeType::Mesh, &[(PanelKind::Hierarchy, vec![hidden(true), live])]),
            snapshot(2, NodeType::Mesh, &[(PanelKind::Hierarchy, vec![hidden(true)])]),
        ];

        let sheet = generate(PropertiesStyle::Intersection, &selection, &token).unwrap();
        let panel = sheet.panel(PanelKind::Hierarchy).unwrap();

        assert_eq!(panel.fields.len(), 1);
        assert_eq!(panel.field("hidden").unwrap().value, Some(PropertyValue::Bool(true)));
    }

    #[test]
    fn stale_token_cancels_generation() {
        let counter = SelectionCounter::default();
        let token = counter.advance();
        counter.advance();

        let selection = vec![snapshot(1, NodeType::Transform, &[])];
        assert!(generate(PropertiesStyle::Intersection, &selection, &token).is_none());
    }
}
