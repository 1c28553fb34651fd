//! Hierarchy queries, traversal and duplication.

use glam::Mat4;
use tracing::debug;

use super::bounds::Aabb;
use super::kinds::EntitySet;
use super::layer::{Layer, MembershipSummary};
use super::scene::Scene;
use super::skin::Skin;
use super::store::{NodeEntry, NodeKind, NodeType};
use super::transform::Transform;
use crate::error::SceneError;
use crate::graph::{NodeId, SceneNode};

/// What a hierarchy traversal should do after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalAction {
    /// Visit the node's children.
    Continue,
    /// Skip the node's children.
    Prune,
    /// Stop the traversal.
    Abort,
}

impl Scene {
    /// Visit `start` and its subtree depth-first, parents before children.
    ///
    /// Returns [`TraversalAction::Abort`] if the visitor aborted, otherwise
    /// [`TraversalAction::Continue`].
    pub fn traverse_hierarchy<F>(&self, start: NodeId, mut visit: F) -> TraversalAction
    where
        F: FnMut(NodeId, &NodeEntry) -> TraversalAction,
    {
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            let Some(entry) = self.store.get(id) else {
                continue;
            };

            match visit(id, entry) {
                TraversalAction::Abort => return TraversalAction::Abort,
                TraversalAction::Prune => {}
                TraversalAction::Continue => {
                    if let Some(hierarchy) = &entry.hierarchy {
                        stack.extend(hierarchy.children.iter().rev().copied());
                    }
                }
            }
        }

        TraversalAction::Continue
    }

    /// Pipe-separated path from the root, e.g. `|group|child`. The root
    /// itself is not part of any path.
    pub fn path(&self, id: NodeId) -> Option<String> {
        self.store.get(id)?;

        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == self.root() {
                break;
            }
            names.push(self.name(node)?);
            cursor = self.parent(node);
        }

        Some(names.iter().rev().fold(String::new(), |mut path, name| {
            path.push('|');
            path.push_str(name);
            path
        }))
    }

    /// Find a node named `name` (case-insensitive) below `start`.
    pub fn find(&self, start: NodeId, name: &str) -> Option<NodeId> {
        let mut found = None;
        self.traverse_hierarchy(start, |id, entry| {
            if id != start && entry.node.name().eq_ignore_ascii_case(name) {
                found = Some(id);
                TraversalAction::Abort
            } else {
                TraversalAction::Continue
            }
        });
        found
    }

    /// Resolve a path produced by [`Scene::path`].
    pub fn find_from_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root();
        for part in path.split('|').filter(|p| !p.is_empty()) {
            current = self
                .children(current)
                .iter()
                .copied()
                .find(|&child| self.name(child).is_some_and(|n| n.eq_ignore_ascii_case(part)))?;
        }
        (current != self.root()).then_some(current)
    }

    /// Reverse the display order of a node's children.
    pub fn reverse_children(&mut self, parent: NodeId) -> Result<(), SceneError> {
        let Some(hierarchy) = self.store.hierarchy_mut(parent) else {
            return Err(SceneError::NotHierarchyNode(parent));
        };
        hierarchy.children.reverse();
        self.store.relink_children(parent);
        self.dirty(parent);
        Ok(())
    }

    /// Copy a node and its subtree under the same parent.
    ///
    /// Copies get fresh ids. Edges to nodes outside the hierarchy are copied
    /// both ways: a copy joins the layers and entity set of its original, and
    /// skins reading the original also wait on the copy. Edges between
    /// hierarchy nodes other than the parent are not copied. A copied skin
    /// is bound to the same mesh and influence objects as the original.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        if id == self.root() {
            return Err(SceneError::RootImmutable);
        }
        let parent = self.parent(id);
        self.duplicate_under(id, parent)
    }

    fn duplicate_under(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<NodeId, SceneError> {
        let entry = self.entry(id)?;
        let children: Vec<NodeId> = entry
            .hierarchy
            .as_ref()
            .map(|h| h.children.clone())
            .unwrap_or_default();
        let outside_hierarchy =
            |node: &NodeId| self.store.node_type(*node).is_some_and(|t| !t.is_hierarchy());
        let ancestors: Vec<NodeId> = entry
            .node
            .ancestors()
            .iter()
            .copied()
            .filter(outside_hierarchy)
            .collect();
        let dependents: Vec<NodeId> = entry
            .node
            .descendants()
            .iter()
            .copied()
            .filter(outside_hierarchy)
            .collect();

        let mut kind = entry.kind.clone();
        let mut binding = None;
        match &mut kind {
            NodeKind::Layer(layer) => layer.members.clear(),
            NodeKind::EntitySet(set) => set.instances.clear(),
            NodeKind::Skin(skin) => {
                binding = skin
                    .mesh
                    .take()
                    .map(|mesh| (mesh, std::mem::take(&mut skin.influence_objects)));
            }
            _ => {}
        }

        let mut copy = NodeEntry::new(SceneNode::new(entry.node.name()), kind);
        copy.transform = entry.transform.clone();
        if let (Some(to), Some(from)) = (copy.hierarchy.as_mut(), entry.hierarchy.as_ref()) {
            to.hidden = from.hidden;
            to.live = from.live;
        }

        let copy = self.insert_entry(copy);
        if let Some(parent) = parent {
            self.set_parent(copy, parent)?;
        }
        for ancestor in ancestors {
            self.create_dependency(copy, ancestor)?;
        }
        for dependent in dependents {
            self.create_dependency(dependent, copy)?;
        }
        if let Some((mesh, influence_objects)) = binding {
            self.bind_skin(copy, mesh, influence_objects)?;
        }
        let set = match self.node(copy).map(|e| &e.kind) {
            Some(NodeKind::Entity(entity)) => entity.set,
            _ => None,
        };
        if let Some(NodeKind::EntitySet(set)) = set.and_then(|s| self.store.get_mut(s)).map(|e| &mut e.kind) {
            set.instances.push(copy);
        }

        for child in children {
            self.duplicate_under(child, Some(copy))?;
        }

        debug!(?id, ?copy, "node duplicated");
        Ok(copy)
    }

    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.store.transform(id)
    }

    /// The node carrying the transform that applies to `id`.
    pub fn transform_of(&self, id: NodeId) -> Option<NodeId> {
        self.store.transform_of(id)
    }

    /// Global transform from the last sweep.
    pub fn global_transform(&self, id: NodeId) -> Option<Mat4> {
        self.store.get(id)?;
        Some(self.store.global_transform(id))
    }

    /// Whether the node was visible at the last sweep. The root never is.
    pub fn is_visible(&self, id: NodeId) -> bool {
        id != self.root() && self.store.hierarchy(id).is_some_and(|h| h.visible)
    }

    /// Whether the node was selectable at the last sweep. The root never is.
    pub fn is_selectable(&self, id: NodeId) -> bool {
        id != self.root() && self.store.hierarchy(id).is_some_and(|h| h.selectable)
    }

    pub fn object_bounds(&self, id: NodeId) -> Option<Aabb> {
        self.store.hierarchy(id).map(|h| h.object_bounds)
    }

    /// Bounds of the node and its subtree, in the node's space.
    pub fn hierarchy_bounds(&self, id: NodeId) -> Option<Aabb> {
        self.store.hierarchy(id).map(|h| h.hierarchy_bounds)
    }

    /// Object bounds in world space.
    pub fn global_bounds(&self, id: NodeId) -> Option<Aabb> {
        let bounds = self.object_bounds(id)?;
        Some(bounds.transformed(&self.store.global_transform(id)))
    }

    /// Hierarchy bounds in world space.
    pub fn global_hierarchy_bounds(&self, id: NodeId) -> Option<Aabb> {
        let bounds = self.hierarchy_bounds(id)?;
        Some(bounds.transformed(&self.store.global_transform(id)))
    }

    pub fn layer(&self, id: NodeId) -> Option<&Layer> {
        match &self.store.get(id)?.kind {
            NodeKind::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    /// Layers the node is a member of.
    pub fn layers_of(&self, id: NodeId) -> Vec<NodeId> {
        self.store.layers_of(id).map(|(layer, _)| layer).collect()
    }

    /// Current members of a layer.
    pub fn layer_members(&self, layer: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.expect_type(layer, NodeType::Layer)?;
        Ok(self.entry(layer)?.node.descendants().iter().copied().collect())
    }

    /// Member names shared by any and by all of `layers`.
    pub fn layer_membership(&self, layers: &[NodeId]) -> Result<MembershipSummary, SceneError> {
        let mut lists = Vec::with_capacity(layers.len());
        for &layer in layers {
            let names: Vec<&str> = self
                .layer_members(layer)?
                .into_iter()
                .filter_map(|member| self.name(member))
                .collect();
            lists.push(names);
        }
        Ok(MembershipSummary::build(lists))
    }

    pub fn skin(&self, id: NodeId) -> Option<&Skin> {
        match &self.store.get(id)?.kind {
            NodeKind::Skin(skin) => Some(skin),
            _ => None,
        }
    }

    pub fn entity_set(&self, id: NodeId) -> Option<&EntitySet> {
        match &self.store.get(id)?.kind {
            NodeKind::EntitySet(set) => Some(set),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Scene, NodeId, NodeId, NodeId) {
        let mut scene = Scene::default();
        let group = scene.create_transform("Group");
        let a = scene.create_transform("a");
        let b = scene.create_transform("b");
        scene.set_parent(a, group).unwrap();
        scene.set_parent(b, group).unwrap();
        (scene, group, a, b)
    }

    #[test]
    fn path_excludes_root() {
        let (scene, group, a, _) = tree();
        assert_eq!(scene.path(group).unwrap(), "|Group");
        assert_eq!(scene.path(a).unwrap(), "|Group|a");
        assert_eq!(scene.path(scene.root()).unwrap(), "");
    }

    #[test]
    fn find_is_case_insensitive() {
        let (scene, group, _, b) = tree();
        assert_eq!(scene.find(scene.root(), "group"), Some(group));
        assert_eq!(scene.find(group, "B"), Some(b));
        assert_eq!(scene.find(group, "group"), None);
        assert_eq!(scene.find_from_path("|GROUP|b"), Some(b));
        assert_eq!(scene.find_from_path("|group|missing"), None);
    }

    #[test]
    fn traversal_prune_and_abort() {
        let (scene, group, a, _) = tree();

        let mut seen = Vec::new();
        scene.traverse_hierarchy(scene.root(), |id, _| {
            seen.push(id);
            if id == group {
                TraversalAction::Prune
            } else {
                TraversalAction::Continue
            }
        });
        assert!(seen.contains(&group));
        assert!(!seen.contains(&a));

        let mut count = 0;
        let action = scene.traverse_hierarchy(group, |_, _| {
            count += 1;
            if count == 2 {
                TraversalAction::Abort
            } else {
                TraversalAction::Continue
            }
        });
        assert_eq!(action, TraversalAction::Abort);
        assert_eq!(count, 2);
    }

    #[test]
    fn reverse_children_relinks_siblings() {
        let (mut scene, group, a, b) = tree();
        scene.evaluate().unwrap();

        scene.reverse_children(group).unwrap();

        assert_eq!(scene.children(group), &[b, a]);
        assert!(scene.sibling_links_valid(group));
        assert!(scene.is_dirty(group, crate::graph::GraphDirection::Downstream));
        assert!(scene.is_dirty(group, crate::graph::GraphDirection::Upstream));
    }

    #[test]
    fn duplicate_copies_subtree() {
        let (mut scene, group, _, _) = tree();
        let layer = scene.create_layer("layer");
        scene.add_layer_member(layer, group).unwrap();

        let copy = scene.duplicate(group).unwrap();

        assert_ne!(scene.uid(copy), scene.uid(group));
        assert_eq!(scene.parent(copy), Some(scene.root()));
        assert_eq!(scene.children(copy).len(), 2);
        assert_eq!(scene.layers_of(copy), vec![layer]);
        assert!(scene.sibling_links_valid(copy));
        assert!(matches!(
            scene.duplicate(scene.root()),
            Err(SceneError::RootImmutable)
        ));
    }

    #[test]
    fn duplicate_copies_only_edges_outside_the_hierarchy() {
        let (mut scene, group, a, b) = tree();
        // A plain dependency between two hierarchy nodes stays with the original
        scene.create_dependency(a, b).unwrap();
        let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
        let skin = scene.create_skin("skin", mesh, vec![a]).unwrap();

        let copy = scene.duplicate(a).unwrap();

        let ancestors: Vec<NodeId> =
            scene.node(copy).unwrap().scene_node().ancestors().iter().copied().collect();
        assert_eq!(ancestors, vec![group]);
        // The skin reading `a` also waits on the copy, without binding to it
        assert!(scene.node(skin).unwrap().scene_node().ancestors().contains(&copy));
        assert_eq!(scene.skin(skin).unwrap().influence_objects(), &[a]);
        scene.evaluate().unwrap();
    }

    #[test]
    fn duplicated_skin_is_bound_to_the_same_inputs() {
        let (mut scene, _, a, b) = tree();
        let mesh = scene.create_mesh("mesh", Aabb::cube(1.0));
        let skin = scene.create_skin("skin", mesh, vec![a, b]).unwrap();

        let copy = scene.duplicate(skin).unwrap();

        let bound = scene.skin(copy).unwrap();
        assert_eq!(bound.mesh(), Some(mesh));
        assert_eq!(bound.influence_objects(), &[a, b]);
        let ancestors: Vec<NodeId> =
            scene.node(copy).unwrap().scene_node().ancestors().iter().copied().collect();
        assert!(ancestors.contains(&a) && ancestors.contains(&b));
        assert!(scene.node(mesh).unwrap().scene_node().ancestors().contains(&copy));
    }
}
