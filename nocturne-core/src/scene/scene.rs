//! Scene
//!
//! [`Scene`] owns the node arena, the dependency graph and the root of the
//! display hierarchy. It is the only place where edges change: every
//! structural edit goes through it so that the sibling lists, the dependency
//! edges and the graph classification never disagree.

use std::time::Duration;

use glam::Vec3;
use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::bounds::Aabb;
use super::events::{ParentChanging, SceneEvent};
use super::kinds::{Entity, EntitySet, Light, Locator, LocatorShape, Mesh};
use super::layer::Layer;
use super::skin::Skin;
use super::store::{NodeEntry, NodeKind, NodeStore, NodeType};
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::graph::{
    EvaluateResult, EvaluatedArgs, Graph, GraphDirection, ListenerId, NodeAccess, NodeId, SceneNode,
};

type EventListener = Box<dyn FnMut(&SceneEvent)>;
type ParentChangingListener = Box<dyn FnMut(&ParentChanging) -> bool>;

/// A scene: nodes, their dependency graph and their display hierarchy.
pub struct Scene {
    pub(crate) store: NodeStore,
    pub(crate) graph: Graph,
    root: NodeId,
    config: SceneConfig,
    listeners: IndexMap<ListenerId, EventListener>,
    parent_changing: IndexMap<ListenerId, ParentChangingListener>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    /// Create a scene containing only the root transform.
    pub fn new(config: SceneConfig) -> Self {
        Self::with_root_uid(config, Uuid::new_v4())
    }

    pub(crate) fn with_root_uid(config: SceneConfig, root_uid: Uuid) -> Self {
        let mut store = NodeStore::new(config.primitives.clone());
        let mut graph = Graph::new();
        graph.set_slow_sweep_threshold(Duration::from_millis(
            config.evaluation.slow_sweep_warning_ms,
        ));

        let root = store.insert(NodeEntry::new(
            SceneNode::with_uid(root_uid, "root"),
            NodeKind::Transform,
        ));
        store.root = Some(root);
        graph.add_node(&mut store, root);

        Self {
            store,
            graph,
            root,
            config,
            listeners: IndexMap::new(),
            parent_changing: IndexMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Get the total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.store.entries.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.store.entries.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.store.get(id)
    }

    /// Iterate over every node handle.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.store.entries.keys()
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.store.node_type(id)
    }

    pub fn find_by_uid(&self, uid: Uuid) -> Option<NodeId> {
        self.store.uids.get(&uid).copied()
    }

    pub fn uid(&self, id: NodeId) -> Option<Uuid> {
        self.store.get(id).map(|e| e.node.uid())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.store.get(id).map(|e| e.node.name())
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.entry_mut(id)?.node.set_name(name);
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.store.parent(id)
    }

    /// Children in display order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.store
            .hierarchy(id)
            .map(|h| h.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn entry(&self, id: NodeId) -> Result<&NodeEntry, SceneError> {
        self.store.get(id).ok_or(SceneError::UnknownNode(id))
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, SceneError> {
        self.store.get_mut(id).ok_or(SceneError::UnknownNode(id))
    }

    pub(crate) fn expect_type(&self, id: NodeId, expected: NodeType) -> Result<(), SceneError> {
        let actual = self.entry(id)?.node_type();
        if actual == expected {
            Ok(())
        } else {
            Err(SceneError::WrongKind {
                node: id,
                expected: expected.name(),
                actual: actual.name(),
            })
        }
    }

    fn expect_hierarchy(&self, id: NodeId) -> Result<(), SceneError> {
        match self.entry(id)?.hierarchy {
            Some(_) => Ok(()),
            None => Err(SceneError::NotHierarchyNode(id)),
        }
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Insert a node into the arena and the graph without parenting it.
    pub(crate) fn insert_entry(&mut self, entry: NodeEntry) -> NodeId {
        let id = self.store.insert(entry);
        self.graph.add_node(&mut self.store, id);
        self.emit(SceneEvent::NodeAdded(id));
        id
    }

    /// Insert a node; hierarchy nodes are placed under the root.
    fn create(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let entry = NodeEntry::new(SceneNode::new(name), kind);
        let in_hierarchy = entry.hierarchy.is_some();
        let id = self.insert_entry(entry);
        if in_hierarchy {
            self.attach(self.root, id);
        }
        debug!(?id, name, "node created");
        id
    }

    pub fn create_transform(&mut self, name: &str) -> NodeId {
        self.create(name, NodeKind::Transform)
    }

    pub fn create_light(&mut self, name: &str) -> NodeId {
        self.create(name, NodeKind::Light(Light::default()))
    }

    pub fn create_locator(&mut self, name: &str, shape: LocatorShape) -> NodeId {
        self.create(name, NodeKind::Locator(Locator { shape }))
    }

    /// Create a mesh. Meshes use the transform of their parent.
    pub fn create_mesh(&mut self, name: &str, bounds: Aabb) -> NodeId {
        self.create(name, NodeKind::Mesh(Mesh { bounds }))
    }

    pub fn create_layer(&mut self, name: &str) -> NodeId {
        self.create(name, NodeKind::Layer(Layer::default()))
    }

    /// Create the set for an entity class. The set is named after the
    /// class path's file stem.
    pub fn create_entity_set(&mut self, class_path: &str) -> NodeId {
        let name = EntitySet::name_for_path(class_path);
        self.create(
            &name,
            NodeKind::EntitySet(EntitySet {
                class_path: class_path.to_string(),
                ..Default::default()
            }),
        )
    }

    /// Create an instance of the class behind `set`.
    pub fn create_entity(&mut self, name: &str, set: NodeId) -> Result<NodeId, SceneError> {
        self.expect_type(set, NodeType::EntitySet)?;

        let id = self.create(name, NodeKind::Entity(Entity::default()));
        self.link_entity(id, set)?;
        Ok(id)
    }

    /// Make `entity` an instance of `set`.
    pub(crate) fn link_entity(&mut self, entity: NodeId, set: NodeId) -> Result<(), SceneError> {
        self.expect_type(entity, NodeType::Entity)?;
        self.expect_type(set, NodeType::EntitySet)?;

        if let NodeKind::Entity(data) = &mut self.entry_mut(entity)?.kind {
            data.set = Some(set);
        }
        if let NodeKind::EntitySet(data) = &mut self.entry_mut(set)?.kind {
            data.instances.push(entity);
        }
        self.connect(set, entity);
        Ok(())
    }

    /// Create a skin deforming `mesh` by `influence_objects`.
    ///
    /// Influence objects must carry their own transform. If the skin cannot
    /// be bound without a cycle it is removed again.
    pub fn create_skin(
        &mut self,
        name: &str,
        mesh: NodeId,
        influence_objects: Vec<NodeId>,
    ) -> Result<NodeId, SceneError> {
        self.expect_type(mesh, NodeType::Mesh)?;
        self.expect_transforms(&influence_objects)?;

        let skin = self.create(name, NodeKind::Skin(Skin::default()));
        if let Err(err) = self.bind_skin(skin, mesh, influence_objects) {
            self.remove_single(skin);
            return Err(err);
        }
        Ok(skin)
    }

    fn expect_transforms(&self, objects: &[NodeId]) -> Result<(), SceneError> {
        for &object in objects {
            let node_type = self.entry(object)?.node_type();
            if !node_type.has_transform() {
                return Err(SceneError::WrongKind {
                    node: object,
                    expected: "transform",
                    actual: node_type.name(),
                });
            }
        }
        Ok(())
    }

    /// Bind `skin` to `mesh` and its influence objects and add the edges
    /// that order their evaluation.
    pub(crate) fn bind_skin(
        &mut self,
        skin: NodeId,
        mesh: NodeId,
        influence_objects: Vec<NodeId>,
    ) -> Result<(), SceneError> {
        self.expect_type(skin, NodeType::Skin)?;
        self.expect_type(mesh, NodeType::Mesh)?;
        self.expect_transforms(&influence_objects)?;

        if let NodeKind::Skin(data) = &mut self.entry_mut(skin)?.kind {
            data.mesh = Some(mesh);
            data.influence_objects = influence_objects;
        }
        for input in self.skin_inputs(skin) {
            if !self.entry(skin)?.node.ancestors().contains(&input) {
                self.create_dependency(skin, input)?;
            }
        }
        self.create_dependency(mesh, skin)
    }

    /// Transforms a skin reads: each influence object and the transform the
    /// mesh is placed under.
    fn skin_inputs(&self, skin: NodeId) -> Vec<NodeId> {
        let Some(NodeKind::Skin(data)) = self.store.get(skin).map(|e| &e.kind) else {
            return Vec::new();
        };

        let mut inputs: Vec<NodeId> = Vec::new();
        for object in data.influence_objects.iter().copied().chain(data.mesh) {
            if let Some(transform) = self.store.transform_of(object) {
                if !inputs.contains(&transform) {
                    inputs.push(transform);
                }
            }
        }
        inputs
    }

    /// Skins deforming a mesh in the subtree of `id`, with their current
    /// inputs.
    fn skins_below(&self, id: NodeId) -> Vec<(NodeId, Vec<NodeId>)> {
        let mut skins: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
        self.traverse_hierarchy(id, |node, entry| {
            for &ancestor in entry.node.ancestors() {
                let deforms = matches!(
                    self.store.get(ancestor).map(|e| &e.kind),
                    Some(NodeKind::Skin(skin)) if skin.mesh == Some(node)
                );
                if deforms && !skins.iter().any(|(skin, _)| *skin == ancestor) {
                    skins.push((ancestor, self.skin_inputs(ancestor)));
                }
            }
            super::query::TraversalAction::Continue
        });
        skins
    }

    /// Move skin edges from the inputs captured before a hierarchy edit to
    /// the inputs the skins read now.
    fn retarget_skins(&mut self, skins: Vec<(NodeId, Vec<NodeId>)>) {
        for (skin, old_inputs) in skins {
            let inputs = self.skin_inputs(skin);
            for &old in old_inputs.iter().filter(|old| !inputs.contains(old)) {
                self.disconnect(old, skin);
            }
            for input in inputs {
                let linked = self
                    .store
                    .get(skin)
                    .is_some_and(|e| e.node.ancestors().contains(&input));
                if linked {
                    continue;
                }
                if let Err(err) = self.create_dependency(skin, input) {
                    warn!(?skin, ?input, %err, "skin input not linked");
                }
            }
            debug!(?skin, "skin inputs retargeted");
        }
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    /// Add the edge `ancestor -> descendant` and dirty the affected nodes.
    fn connect(&mut self, ancestor: NodeId, descendant: NodeId) {
        self.graph.add_edge(&mut self.store, ancestor, descendant);
        self.graph.dirty(&mut self.store, descendant);
        self.graph.dirty(&mut self.store, ancestor);
    }

    fn disconnect(&mut self, ancestor: NodeId, descendant: NodeId) {
        self.graph.remove_edge(&mut self.store, ancestor, descendant);
        self.graph.dirty(&mut self.store, descendant);
        self.graph.dirty(&mut self.store, ancestor);
    }

    /// Link a child into both the sibling list and the graph.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.store.link_child(parent, child);
        self.connect(parent, child);
        debug_assert!(self.store.sibling_links_valid(parent));
    }

    /// Unlink a child from both the sibling list and the graph.
    fn detach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.store.unlink_child(parent, child) {
            return false;
        }
        self.disconnect(parent, child);
        debug_assert!(self.store.sibling_links_valid(parent));
        true
    }

    /// Move `child` under `parent`.
    ///
    /// The child is unlinked from its old parent, appended to the new
    /// parent's children, and its parent dependency is moved with it.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        if child == self.root {
            return Err(SceneError::RootImmutable);
        }
        self.expect_hierarchy(child)?;
        self.expect_hierarchy(parent)?;

        let old_parent = self.store.parent(child);
        if old_parent == Some(parent) {
            return Ok(());
        }

        // Refuse to parent a node under itself or one of its own children
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(SceneError::ParentCycle { child, parent });
            }
            cursor = self.store.parent(node);
        }
        if self
            .graph
            .is_reachable(&mut self.store, child, parent, GraphDirection::Downstream)
        {
            return Err(SceneError::DependencyCycle {
                node: child,
                ancestor: parent,
            });
        }

        let args = ParentChanging {
            node: child,
            old_parent,
            new_parent: parent,
        };
        for listener in self.parent_changing.values_mut() {
            if !listener(&args) {
                debug!(?child, ?parent, "reparent vetoed");
                return Err(SceneError::ReparentVetoed(child));
            }
        }

        let skins = self.skins_below(child);
        if let Some(old_parent) = old_parent {
            self.detach(old_parent, child);
        }
        self.attach(parent, child);
        self.retarget_skins(skins);

        debug!(?child, ?old_parent, ?parent, "parent changed");
        self.emit(SceneEvent::ParentChanged {
            node: child,
            old_parent,
            new_parent: parent,
        });
        Ok(())
    }

    /// Remove `child` from `parent`, leaving it without a parent.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.entry(parent)?;
        self.entry(child)?;
        let skins = self.skins_below(child);
        if !self.detach(parent, child) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.retarget_skins(skins);
        Ok(())
    }

    /// Make `node` depend on `ancestor`.
    pub fn create_dependency(&mut self, node: NodeId, ancestor: NodeId) -> Result<(), SceneError> {
        self.entry(node)?;
        self.entry(ancestor)?;

        if node == ancestor
            || self
                .graph
                .is_reachable(&mut self.store, node, ancestor, GraphDirection::Downstream)
        {
            return Err(SceneError::DependencyCycle { node, ancestor });
        }

        self.connect(ancestor, node);
        Ok(())
    }

    /// Remove a dependency added with [`Scene::create_dependency`].
    pub fn remove_dependency(&mut self, node: NodeId, ancestor: NodeId) -> Result<(), SceneError> {
        self.entry(node)?;
        self.entry(ancestor)?;
        if self.store.parent(node) == Some(ancestor) {
            return Err(SceneError::ParentDependency { node });
        }

        self.disconnect(ancestor, node);
        Ok(())
    }

    /// Remove a node and its whole subtree from the scene.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootImmutable);
        }
        self.entry(id)?;

        let mut order = Vec::new();
        self.traverse_hierarchy(id, |node, _| {
            order.push(node);
            super::query::TraversalAction::Continue
        });

        // Children before parents
        for node in order.into_iter().rev() {
            self.remove_single(node);
        }
        Ok(())
    }

    fn remove_single(&mut self, id: NodeId) {
        let Some(entry) = self.store.get(id) else {
            return;
        };
        let parent = entry.hierarchy.as_ref().and_then(|h| h.parent);
        let ancestors: Vec<NodeId> = entry.node.ancestors().iter().copied().collect();
        let descendants: Vec<NodeId> = entry.node.descendants().iter().copied().collect();

        if let Some(parent) = parent {
            self.store.unlink_child(parent, id);
        }
        for ancestor in ancestors {
            self.disconnect(ancestor, id);
        }
        for descendant in descendants {
            self.disconnect(id, descendant);
        }

        match self.store.get(id).map(|e| e.kind.clone()) {
            Some(NodeKind::Entity(Entity { set: Some(set) })) => {
                if let Some(NodeKind::EntitySet(set)) = self.store.get_mut(set).map(|e| &mut e.kind) {
                    set.instances.retain(|&instance| instance != id);
                }
            }
            Some(NodeKind::EntitySet(set)) => {
                for instance in set.instances {
                    if let Some(NodeKind::Entity(entity)) =
                        self.store.get_mut(instance).map(|e| &mut e.kind)
                    {
                        entity.set = None;
                    }
                }
            }
            _ => {}
        }

        self.graph.remove_node(&mut self.store, id);
        if let Some(entry) = self.store.remove(id) {
            debug!(?id, name = entry.node.name(), "node removed");
            self.emit(SceneEvent::NodeRemoved {
                node: id,
                uid: entry.node.uid(),
            });
        }
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Mark a node dirty in both directions. Returns the number of nodes
    /// newly marked.
    pub fn dirty(&mut self, id: NodeId) -> u32 {
        self.graph.dirty(&mut self.store, id)
    }

    pub fn is_dirty(&self, id: NodeId, direction: GraphDirection) -> bool {
        self.store
            .scene_node(id)
            .is_some_and(|node| node.is_dirty(direction))
    }

    /// Settle every dirty node and notify listeners.
    pub fn evaluate(&mut self) -> Result<EvaluateResult, SceneError> {
        self.run_evaluation(false)
    }

    /// Settle every dirty node without raising the evaluated notification.
    pub fn evaluate_silent(&mut self) -> Result<EvaluateResult, SceneError> {
        self.run_evaluation(true)
    }

    fn run_evaluation(&mut self, silent: bool) -> Result<EvaluateResult, SceneError> {
        let result = self.graph.evaluate_graph(&mut self.store, silent);

        for event in std::mem::take(&mut self.store.events) {
            self.emit(event);
        }

        let result = result?;
        if !silent {
            self.emit(SceneEvent::Evaluated {
                node_count: result.node_count,
            });
        }
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Register a listener for every [`SceneEvent`].
    pub fn subscribe(&mut self, listener: impl FnMut(&SceneEvent) + 'static) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    /// Register a listener consulted before every reparent. Returning false
    /// vetoes the change.
    pub fn on_parent_changing(
        &mut self,
        listener: impl FnMut(&ParentChanging) -> bool + 'static,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.parent_changing.insert(id, Box::new(listener));
        id
    }

    pub fn remove_parent_changing_listener(&mut self, id: ListenerId) -> bool {
        self.parent_changing.shift_remove(&id).is_some()
    }

    /// Register a listener receiving the set of evaluated nodes after each
    /// non-silent sweep.
    pub fn on_evaluated(
        &mut self,
        listener: impl FnMut(&EvaluatedArgs<'_>) + 'static,
    ) -> ListenerId {
        self.graph.on_evaluated(listener)
    }

    pub(crate) fn emit(&mut self, event: SceneEvent) {
        for listener in self.listeners.values_mut() {
            listener(&event);
        }
    }

    /// Check the sibling links of `parent`'s children.
    pub fn sibling_links_valid(&self, parent: NodeId) -> bool {
        self.store.sibling_links_valid(parent)
    }

    /// Color of the first layer the node belongs to.
    pub fn layer_color(&self, id: NodeId) -> Option<Vec3> {
        self.store.layers_of(id).next().map(|(_, layer)| layer.color)
    }
}
