//! Hierarchy Nodes
//!
//! The display hierarchy layered on top of the dependency graph. Each
//! hierarchy node has a parent, an ordered list of children and explicit
//! previous/next sibling handles. A child always depends on its parent, so
//! the parent edge appears in both structures; [`crate::scene::Scene`] is the
//! only place that changes either, and it changes both together.
//!
//! # Evaluation
//!
//! - Downstream: visibility and selectability are derived from the node's
//!   own flags, its parent, its type and every layer it belongs to.
//! - Upstream: the hierarchy bounds are the node's object bounds merged with
//!   each child's hierarchy bounds, mapped into this node's space.

use glam::Mat4;

use super::bounds::Aabb;
use super::events::SceneEvent;
use super::store::NodeStore;
use crate::graph::NodeId;

/// Tree links and cached derived state of a hierarchy node.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) previous: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    pub(crate) hidden: bool,
    pub(crate) live: bool,

    // Transient, not persisted
    pub(crate) highlighted: bool,
    pub(crate) reactive: bool,

    pub(crate) visible: bool,
    pub(crate) selectable: bool,
    pub(crate) object_bounds: Aabb,
    pub(crate) hierarchy_bounds: Aabb,
}

impl Default for HierarchyNode {
    fn default() -> Self {
        Self {
            parent: None,
            previous: None,
            next: None,
            children: Vec::new(),
            hidden: false,
            live: false,
            highlighted: false,
            reactive: false,
            visible: true,
            selectable: true,
            object_bounds: Aabb::EMPTY,
            hierarchy_bounds: Aabb::EMPTY,
        }
    }
}

impl HierarchyNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn previous(&self) -> Option<NodeId> {
        self.previous
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    pub fn object_bounds(&self) -> Aabb {
        self.object_bounds
    }

    pub fn hierarchy_bounds(&self) -> Aabb {
        self.hierarchy_bounds
    }
}

impl NodeStore {
    /// Append `child` to `parent`'s children and link it after the current
    /// last child. Does not touch dependency edges.
    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId) {
        let last = self.hierarchy(parent).and_then(|h| h.children.last().copied());

        if let Some(last) = last {
            if let Some(h) = self.hierarchy_mut(last) {
                h.next = Some(child);
            }
        }
        if let Some(h) = self.hierarchy_mut(child) {
            h.parent = Some(parent);
            h.previous = last;
            h.next = None;
        }
        if let Some(h) = self.hierarchy_mut(parent) {
            h.children.push(child);
        }
    }

    /// Remove `child` from `parent`'s children and splice its siblings
    /// together. Returns false if `child` was not a child of `parent`.
    pub(crate) fn unlink_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(index) = self
            .hierarchy(parent)
            .and_then(|h| h.children.iter().position(|&c| c == child))
        else {
            return false;
        };

        let (previous, next) = match self.hierarchy(child) {
            Some(h) => (h.previous, h.next),
            None => (None, None),
        };

        if let Some(previous) = previous {
            if let Some(h) = self.hierarchy_mut(previous) {
                debug_assert_eq!(h.next, Some(child), "sibling list out of sync");
                h.next = next;
            }
        }
        if let Some(next) = next {
            if let Some(h) = self.hierarchy_mut(next) {
                debug_assert_eq!(h.previous, Some(child), "sibling list out of sync");
                h.previous = previous;
            }
        }
        if let Some(h) = self.hierarchy_mut(parent) {
            h.children.remove(index);
        }
        if let Some(h) = self.hierarchy_mut(child) {
            h.parent = None;
            h.previous = None;
            h.next = None;
        }

        true
    }

    /// Rewrite previous/next handles to match the children vector.
    pub(crate) fn relink_children(&mut self, parent: NodeId) {
        let children = match self.hierarchy(parent) {
            Some(h) => h.children.clone(),
            None => return,
        };
        for (i, &child) in children.iter().enumerate() {
            if let Some(h) = self.hierarchy_mut(child) {
                h.previous = i.checked_sub(1).map(|p| children[p]);
                h.next = children.get(i + 1).copied();
            }
        }
    }

    /// Check that the sibling handles of `parent`'s children agree with the
    /// children vector and that every child points back at `parent`.
    pub(crate) fn sibling_links_valid(&self, parent: NodeId) -> bool {
        let Some(children) = self.hierarchy(parent).map(|h| &h.children) else {
            return true;
        };

        children.iter().enumerate().all(|(i, &child)| {
            self.hierarchy(child).is_some_and(|h| {
                h.parent == Some(parent)
                    && h.previous == i.checked_sub(1).map(|p| children[p])
                    && h.next == children.get(i + 1).copied()
            })
        })
    }

    pub(super) fn evaluate_visibility(&mut self, id: NodeId) {
        let Some(entry) = self.get(id) else {
            return;
        };
        let Some(hierarchy) = entry.hierarchy.as_ref() else {
            return;
        };
        let flags = self.type_flags(entry.node_type());

        let parent_visible = match hierarchy.parent {
            Some(parent) if Some(parent) != self.root => {
                self.hierarchy(parent).map_or(true, |h| h.visible)
            }
            _ => true,
        };

        let visible = !hierarchy.hidden
            && parent_visible
            && flags.visible
            && self.layers_of(id).all(|(_, layer)| layer.visible);
        let selectable = flags.selectable && self.layers_of(id).all(|(_, layer)| layer.selectable);
        let previous = hierarchy.visible;

        if let Some(h) = self.hierarchy_mut(id) {
            h.visible = visible;
            h.selectable = selectable;
        }
        if previous != visible {
            self.events.push(SceneEvent::VisibilityChanged { node: id, visible });
        }
    }

    pub(super) fn evaluate_hierarchy_bounds(&mut self, id: NodeId) {
        let Some(hierarchy) = self.hierarchy(id) else {
            return;
        };

        let this_transform = self.transform_of(id);
        let inverse_global = self.inverse_global_transform(id);
        let mut bounds = hierarchy.object_bounds;

        for &child in &hierarchy.children {
            let Some(child_bounds) = self.hierarchy(child).map(|h| h.hierarchy_bounds) else {
                continue;
            };

            let child_transform = self.transform_of(child);
            if child_transform == this_transform {
                bounds.merge(&child_bounds);
            } else {
                let to_local: Mat4 = inverse_global * self.global_transform(child);
                bounds.merge(&child_bounds.transformed(&to_local));
            }
        }

        if let Some(h) = self.hierarchy_mut(id) {
            h.hierarchy_bounds = bounds;
        }
    }
}
