//! Error Types
//!
//! Each layer of the crate reports failures through its own enum:
//!
//! - [`GraphError`]: the dependency graph sweep
//! - [`SceneError`]: structural edits made through [`crate::scene::Scene`]
//! - [`PersistError`]: encoding and decoding scene documents
//! - [`ConfigError`]: loading [`crate::config::SceneConfig`]
//!
//! Contract violations that only a bug inside the crate could produce (such
//! as a broken sibling list) are `debug_assert!`s, not error variants.

use thiserror::Error;
use uuid::Uuid;

use crate::graph::{GraphDirection, NodeId};

/// Errors raised while evaluating the dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The sweep reached a node that is already on the active evaluation path.
    #[error("dependency cycle detected at {node:?} during {direction:?} evaluation")]
    CycleDetected {
        /// The node that closed the cycle
        node: NodeId,
        /// The direction being evaluated
        direction: GraphDirection,
    },
}

/// Errors raised by scene mutations and queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The handle does not refer to a live node.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The operation requires a node that sits in the display hierarchy.
    #[error("node {0:?} is not part of the hierarchy")]
    NotHierarchyNode(NodeId),

    /// The node exists but is of the wrong kind for this operation.
    #[error("node {node:?} is a {actual}, expected {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
        actual: &'static str,
    },

    /// Reparenting would make a node its own ancestor.
    #[error("cannot parent {child:?} under {parent:?}: it would create a cycle")]
    ParentCycle { child: NodeId, parent: NodeId },

    /// Adding the dependency would make the graph cyclic.
    #[error("dependency {node:?} -> {ancestor:?} would create a cycle")]
    DependencyCycle { node: NodeId, ancestor: NodeId },

    /// Parent edges only change through reparenting.
    #[error("the dependency of {node:?} on its parent cannot be removed directly")]
    ParentDependency { node: NodeId },

    /// A parent-changing listener rejected the edit.
    #[error("reparenting {0:?} was vetoed")]
    ReparentVetoed(NodeId),

    /// The root node cannot be reparented, removed or duplicated.
    #[error("the root node cannot be modified this way")]
    RootImmutable,

    /// `child` is not a child of `parent`.
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Errors raised while saving or loading a scene document.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two records share the same persistent id.
    #[error("duplicate node id {0}")]
    DuplicateId(Uuid),

    /// A record names a parent that is not in the document.
    #[error("node {node} refers to missing parent {parent}")]
    UnknownParent { node: Uuid, parent: Uuid },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
