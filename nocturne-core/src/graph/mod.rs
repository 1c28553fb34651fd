//! Dependency Graph
//!
//! This module implements the dependency graph that decides when and in
//! which order scene nodes recompute their derived state.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes are scene objects (transforms, lights, layers, skins, ...)
//! - An edge from A to B means B depends on A: A is an ancestor of B and B
//!   is a descendant of A
//!
//! Editing a node marks it dirty in both directions. A sweep then settles
//! every dirty node, evaluating downstream state (matrices, visibility) from
//! ancestors toward descendants and upstream state (bounds) from descendants
//! toward ancestors.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena owned by the scene and are addressed by
//!    [`NodeId`] handles. The graph only holds handles, so removing a node
//!    can never leave a dangling reference behind.
//!
//! 2. The graph reaches node storage through the [`NodeAccess`] trait. The
//!    per-kind evaluate hook is dispatched by the storage, not the graph.
//!
//! 3. The sweep uses an explicit stack and reports cycles as
//!    [`crate::error::GraphError::CycleDetected`].

mod node;
mod scheduler;

pub use node::{Classification, GraphDirection, NodeId, NodeState, SceneNode};
pub(crate) use scheduler::mark_dirty;
pub use scheduler::{EvaluateResult, EvaluatedArgs, Graph, ListenerId, NodeAccess};
