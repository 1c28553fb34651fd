//! Scene Nodes
//!
//! This module holds the nodes that live in the dependency graph and the
//! [`Scene`] that owns them.
//!
//! # Overview
//!
//! - Every node has graph bookkeeping ([`crate::graph::SceneNode`]) and a
//!   [`NodeKind`] carrying its kind-specific data.
//! - Transforms, lights, locators, meshes and entities also sit in the
//!   display hierarchy ([`HierarchyNode`]).
//! - Layers, entity sets and skins only take part in the graph.
//!
//! # Evaluation
//!
//! | Kind      | Downstream                                  | Upstream          |
//! |-----------|---------------------------------------------|-------------------|
//! | Transform | matrices, axis bounds, visibility           | hierarchy bounds  |
//! | Light     | matrices, pointer bounds, visibility        | hierarchy bounds  |
//! | Locator   | matrices, shape bounds, visibility          | hierarchy bounds  |
//! | Entity    | matrices, class bounds, visibility          | hierarchy bounds  |
//! | Mesh      | bounds, visibility                          | hierarchy bounds  |
//! | Skin      | deform and blended skin matrices            |                   |
//! | Layer     | member list                                 |                   |
//! | EntitySet |                                             |                   |

mod bounds;
mod edit;
mod events;
mod hierarchy;
mod kinds;
mod layer;
mod query;
mod render;
#[allow(clippy::module_inception)]
mod scene;
mod skin;
mod store;
mod transform;

pub use bounds::Aabb;
pub use events::{ParentChanging, SceneEvent};
pub use hierarchy::HierarchyNode;
pub use kinds::{Entity, EntitySet, Light, Locator, LocatorShape, Mesh};
pub use layer::{Layer, MembershipSummary};
pub use query::TraversalAction;
pub use render::{RenderEntry, RenderVisitor};
pub use scene::Scene;
pub use skin::{Influence, Skin};
pub use store::{NodeEntry, NodeKind, NodeType, TypeFlags};
pub use transform::{Transform, TransformComponents};
