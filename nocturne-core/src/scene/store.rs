//! Node Storage
//!
//! The arena that owns every node of a scene, and the per-kind dispatch of
//! the evaluate hook.

use std::collections::HashMap;

use glam::Mat4;
use slotmap::SlotMap;
use uuid::Uuid;

use super::bounds::Aabb;
use super::events::SceneEvent;
use super::hierarchy::HierarchyNode;
use super::kinds::{Entity, EntitySet, Light, Locator, Mesh};
use super::layer::Layer;
use super::skin::Skin;
use super::transform::Transform;
use crate::config::PrimitiveConfig;
use crate::graph::{mark_dirty, GraphDirection, NodeAccess, NodeId, SceneNode};

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Transform,
    Light,
    Locator,
    Mesh,
    Entity,
    EntitySet,
    Layer,
    Skin,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Transform,
        NodeType::Light,
        NodeType::Locator,
        NodeType::Mesh,
        NodeType::Entity,
        NodeType::EntitySet,
        NodeType::Layer,
        NodeType::Skin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Transform => "Transform",
            NodeType::Light => "Light",
            NodeType::Locator => "Locator",
            NodeType::Mesh => "Mesh",
            NodeType::Entity => "Entity",
            NodeType::EntitySet => "EntitySet",
            NodeType::Layer => "Layer",
            NodeType::Skin => "Skin",
        }
    }

    /// Whether nodes of this type sit in the display hierarchy.
    pub fn is_hierarchy(self) -> bool {
        !matches!(self, NodeType::EntitySet | NodeType::Layer | NodeType::Skin)
    }

    /// Whether nodes of this type carry their own transform.
    pub fn has_transform(self) -> bool {
        matches!(
            self,
            NodeType::Transform | NodeType::Light | NodeType::Locator | NodeType::Entity
        )
    }
}

/// Kind-specific data of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Transform,
    Light(Light),
    Locator(Locator),
    Mesh(Mesh),
    Entity(Entity),
    EntitySet(EntitySet),
    Layer(Layer),
    Skin(Skin),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Transform => NodeType::Transform,
            NodeKind::Light(_) => NodeType::Light,
            NodeKind::Locator(_) => NodeType::Locator,
            NodeKind::Mesh(_) => NodeType::Mesh,
            NodeKind::Entity(_) => NodeType::Entity,
            NodeKind::EntitySet(_) => NodeType::EntitySet,
            NodeKind::Layer(_) => NodeType::Layer,
            NodeKind::Skin(_) => NodeType::Skin,
        }
    }
}

/// Type-wide visibility and selectability switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeFlags {
    pub visible: bool,
    pub selectable: bool,
}

impl Default for TypeFlags {
    fn default() -> Self {
        Self {
            visible: true,
            selectable: true,
        }
    }
}

/// One node in the arena.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub(crate) node: SceneNode,
    pub(crate) hierarchy: Option<HierarchyNode>,
    pub(crate) transform: Option<Transform>,
    pub(crate) kind: NodeKind,
}

impl NodeEntry {
    pub(crate) fn new(node: SceneNode, kind: NodeKind) -> Self {
        let node_type = kind.node_type();
        Self {
            node,
            hierarchy: node_type.is_hierarchy().then(HierarchyNode::default),
            transform: node_type.has_transform().then(Transform::default),
            kind,
        }
    }

    pub fn scene_node(&self) -> &SceneNode {
        &self.node
    }

    pub fn hierarchy(&self) -> Option<&HierarchyNode> {
        self.hierarchy.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

/// Arena of scene nodes.
pub(crate) struct NodeStore {
    pub(crate) entries: SlotMap<NodeId, NodeEntry>,
    pub(crate) uids: HashMap<Uuid, NodeId>,
    pub(crate) root: Option<NodeId>,
    pub(crate) type_flags: HashMap<NodeType, TypeFlags>,
    pub(crate) primitives: PrimitiveConfig,

    /// Events raised during evaluation, drained by the scene afterwards.
    pub(crate) events: Vec<SceneEvent>,
}

impl NodeStore {
    pub(crate) fn new(primitives: PrimitiveConfig) -> Self {
        Self {
            entries: SlotMap::with_key(),
            uids: HashMap::new(),
            root: None,
            type_flags: HashMap::new(),
            primitives,
            events: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, entry: NodeEntry) -> NodeId {
        let uid = entry.node.uid();
        let id = self.entries.insert(entry);
        self.uids.insert(uid, id);
        id
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<NodeEntry> {
        let entry = self.entries.remove(id)?;
        self.uids.remove(&entry.node.uid());
        Some(entry)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.entries.get_mut(id)
    }

    pub(crate) fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.entries.get(id).map(NodeEntry::node_type)
    }

    pub(crate) fn type_flags(&self, node_type: NodeType) -> TypeFlags {
        self.type_flags.get(&node_type).copied().unwrap_or_default()
    }

    pub(crate) fn hierarchy(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.entries.get(id)?.hierarchy.as_ref()
    }

    pub(crate) fn hierarchy_mut(&mut self, id: NodeId) -> Option<&mut HierarchyNode> {
        self.entries.get_mut(id)?.hierarchy.as_mut()
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.hierarchy(id)?.parent
    }

    /// The nearest node, starting at `id` and walking up parents, that
    /// carries a transform.
    pub(crate) fn transform_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            let entry = self.entries.get(node)?;
            if entry.transform.is_some() {
                return Some(node);
            }
            current = entry.hierarchy.as_ref().and_then(|h| h.parent);
        }
        None
    }

    pub(crate) fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.entries.get(id)?.transform.as_ref()
    }

    /// Global transform of the node's transform, or identity.
    pub(crate) fn global_transform(&self, id: NodeId) -> Mat4 {
        self.transform_of(id)
            .and_then(|t| self.transform(t))
            .map_or(Mat4::IDENTITY, Transform::global_transform)
    }

    pub(crate) fn inverse_global_transform(&self, id: NodeId) -> Mat4 {
        self.transform_of(id)
            .and_then(|t| self.transform(t))
            .map_or(Mat4::IDENTITY, Transform::inverse_global_transform)
    }

    /// Layers this node is a member of.
    pub(crate) fn layers_of(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Layer)> + '_ {
        self.entries
            .get(id)
            .into_iter()
            .flat_map(|entry| entry.node.ancestors().iter())
            .filter_map(move |&ancestor| match &self.entries.get(ancestor)?.kind {
                NodeKind::Layer(layer) => Some((ancestor, layer)),
                _ => None,
            })
    }

    fn evaluate_downstream(&mut self, id: NodeId) {
        let Some(node_type) = self.node_type(id) else {
            return;
        };

        if node_type.has_transform() {
            self.evaluate_transform(id);
        }

        match node_type {
            NodeType::Transform => {
                let bounds = Aabb::cube(self.primitives.transform_axis_length);
                self.set_object_bounds(id, bounds);
            }
            NodeType::Light => self.evaluate_light(id),
            NodeType::Locator => self.evaluate_locator(id),
            NodeType::Entity => self.evaluate_entity(id),
            NodeType::Mesh => self.evaluate_mesh(id),
            NodeType::Skin => self.evaluate_skin(id),
            NodeType::Layer => self.evaluate_layer_members(id),
            NodeType::EntitySet => {}
        }

        if node_type.is_hierarchy() {
            self.evaluate_visibility(id);
        }
    }

    fn evaluate_upstream(&mut self, id: NodeId) {
        if self.node_type(id).is_some_and(NodeType::is_hierarchy) {
            self.evaluate_hierarchy_bounds(id);
        }
    }

    fn evaluate_transform(&mut self, id: NodeId) {
        let parent = self
            .parent(id)
            .and_then(|p| self.transform_of(p))
            .and_then(|t| self.transform(t))
            .map(|t| (t.global_transform(), t.bind_transform()));

        if let Some(transform) = self.get_mut(id).and_then(|e| e.transform.as_mut()) {
            transform.evaluate(parent);
        }
    }

    /// Store new object bounds. A change re-dirties the node and its
    /// ancestors upstream, since their hierarchy bounds include these; the
    /// upstream pass of the running sweep then settles them.
    pub(crate) fn set_object_bounds(&mut self, id: NodeId, bounds: Aabb) {
        let Some(hierarchy) = self.hierarchy_mut(id) else {
            return;
        };
        if hierarchy.object_bounds == bounds {
            return;
        }
        hierarchy.object_bounds = bounds;
        mark_dirty(self, id, GraphDirection::Upstream);
    }
}

impl NodeAccess for NodeStore {
    fn scene_node(&self, id: NodeId) -> Option<&SceneNode> {
        self.entries.get(id).map(|e| &e.node)
    }

    fn scene_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.entries.get_mut(id).map(|e| &mut e.node)
    }

    fn do_evaluate(&mut self, id: NodeId, direction: GraphDirection) {
        match direction {
            GraphDirection::Downstream => self.evaluate_downstream(id),
            GraphDirection::Upstream => self.evaluate_upstream(id),
        }
    }
}
