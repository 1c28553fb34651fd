//! Render traversal.
//!
//! The scene does not draw anything. A renderer implements
//! [`RenderVisitor`] and receives the evaluated state of every visible
//! hierarchy node.

use glam::{Mat4, Vec3};

use super::bounds::Aabb;
use super::query::TraversalAction;
use super::scene::Scene;
use super::store::NodeType;
use crate::graph::NodeId;

/// Evaluated state of one visible node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    pub node: NodeId,
    pub node_type: NodeType,
    pub global_transform: Mat4,
    pub object_bounds: Aabb,
    pub hierarchy_bounds: Aabb,
    pub highlighted: bool,
    /// Color of the first layer the node belongs to.
    pub layer_color: Option<Vec3>,
}

pub trait RenderVisitor {
    fn visit(&mut self, entry: &RenderEntry);
}

impl<F: FnMut(&RenderEntry)> RenderVisitor for F {
    fn visit(&mut self, entry: &RenderEntry) {
        self(entry)
    }
}

impl Scene {
    /// Hand every visible node to `visitor`, parents before children.
    /// Subtrees under an invisible node are skipped.
    pub fn render(&self, visitor: &mut dyn RenderVisitor) {
        let root = self.root();
        self.traverse_hierarchy(root, |id, entry| {
            if id == root {
                return TraversalAction::Continue;
            }
            let Some(hierarchy) = entry.hierarchy() else {
                return TraversalAction::Prune;
            };
            if !hierarchy.visible {
                return TraversalAction::Prune;
            }

            visitor.visit(&RenderEntry {
                node: id,
                node_type: entry.node_type(),
                global_transform: self.store.global_transform(id),
                object_bounds: hierarchy.object_bounds,
                hierarchy_bounds: hierarchy.hierarchy_bounds,
                highlighted: hierarchy.highlighted,
                layer_color: self.layer_color(id),
            });
            TraversalAction::Continue
        });
    }
}
