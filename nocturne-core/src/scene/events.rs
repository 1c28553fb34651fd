//! Scene Events
//!
//! Notifications raised by structural edits and by evaluation. Listeners
//! registered on [`crate::scene::Scene`] receive them synchronously.

use uuid::Uuid;

use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A node was created.
    NodeAdded(NodeId),

    /// A node was removed. Its handle is no longer valid.
    NodeRemoved { node: NodeId, uid: Uuid },

    /// A node was moved under a new parent.
    ParentChanged {
        node: NodeId,
        old_parent: Option<NodeId>,
        new_parent: NodeId,
    },

    /// Evaluation changed a node's visibility.
    VisibilityChanged { node: NodeId, visible: bool },

    /// A non-silent sweep finished.
    Evaluated { node_count: usize },
}

/// Passed to parent-changing listeners before a reparent is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentChanging {
    pub node: NodeId,
    pub old_parent: Option<NodeId>,
    pub new_parent: NodeId,
}
