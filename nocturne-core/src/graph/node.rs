//! Graph Nodes
//!
//! This module defines the bookkeeping every node carries in order to take
//! part in the dependency graph: its identity, its edges in both directions,
//! a dirty state per evaluation direction, and a visited stamp.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

slotmap::new_key_type! {
    /// Handle to a node in the scene arena.
    ///
    /// Handles are only valid for the arena that issued them. A handle to a
    /// removed node is never reused for a different node.
    pub struct NodeId;
}

/// The two independent evaluation directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphDirection {
    /// Flows from ancestors toward descendants (transforms, visibility).
    Downstream,

    /// Flows from descendants toward ancestors (bounds accumulation).
    Upstream,
}

impl GraphDirection {
    /// Both directions, in sweep order.
    pub const ALL: [GraphDirection; 2] = [GraphDirection::Downstream, GraphDirection::Upstream];
}

/// Per-direction state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Cached state is up to date for this direction.
    Clean,

    /// Cached state is stale and must be recomputed in the next sweep.
    #[default]
    Dirty,
}

/// Where a node sits in the graph, derived from its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No ancestors. Also used for fully isolated nodes.
    Original,

    /// Both ancestors and descendants.
    Intermediate,

    /// Ancestors but no descendants.
    Terminal,
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Persistent identifier, stable across save and load.
    uid: Uuid,

    /// Display name.
    name: String,

    /// Nodes this node depends on.
    ancestors: IndexSet<NodeId>,

    /// Nodes that depend on this node.
    descendants: IndexSet<NodeId>,

    downstream: NodeState,
    upstream: NodeState,

    /// Traversal stamp, compared against the graph's current visited id.
    visited_id: u32,

    /// Whether the node is registered with a graph.
    attached: bool,
}

impl SceneNode {
    /// Create a detached node with a fresh persistent id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uid(Uuid::new_v4(), name)
    }

    /// Create a detached node with the given persistent id.
    pub fn with_uid(uid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            ancestors: IndexSet::new(),
            descendants: IndexSet::new(),
            downstream: NodeState::Dirty,
            upstream: NodeState::Dirty,
            visited_id: 0,
            attached: false,
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get all ancestors.
    pub fn ancestors(&self) -> &IndexSet<NodeId> {
        &self.ancestors
    }

    /// Get all descendants.
    pub fn descendants(&self) -> &IndexSet<NodeId> {
        &self.descendants
    }

    /// The nodes that must be clean before this node evaluates in `direction`.
    pub fn inputs(&self, direction: GraphDirection) -> &IndexSet<NodeId> {
        match direction {
            GraphDirection::Downstream => &self.ancestors,
            GraphDirection::Upstream => &self.descendants,
        }
    }

    pub fn state(&self, direction: GraphDirection) -> NodeState {
        match direction {
            GraphDirection::Downstream => self.downstream,
            GraphDirection::Upstream => self.upstream,
        }
    }

    pub fn is_dirty(&self, direction: GraphDirection) -> bool {
        self.state(direction) == NodeState::Dirty
    }

    pub fn visited_id(&self) -> u32 {
        self.visited_id
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Compute where this node belongs from its current edges.
    pub fn classification(&self) -> Classification {
        if self.ancestors.is_empty() {
            Classification::Original
        } else if self.descendants.is_empty() {
            Classification::Terminal
        } else {
            Classification::Intermediate
        }
    }

    pub(crate) fn set_state(&mut self, direction: GraphDirection, state: NodeState) {
        match direction {
            GraphDirection::Downstream => self.downstream = state,
            GraphDirection::Upstream => self.upstream = state,
        }
    }

    pub(crate) fn set_visited_id(&mut self, id: u32) {
        self.visited_id = id;
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub(crate) fn add_ancestor(&mut self, id: NodeId) -> bool {
        self.ancestors.insert(id)
    }

    pub(crate) fn remove_ancestor(&mut self, id: NodeId) -> bool {
        self.ancestors.shift_remove(&id)
    }

    pub(crate) fn add_descendant(&mut self, id: NodeId) -> bool {
        self.descendants.insert(id)
    }

    pub(crate) fn remove_descendant(&mut self, id: NodeId) -> bool {
        self.descendants.shift_remove(&id)
    }
}
