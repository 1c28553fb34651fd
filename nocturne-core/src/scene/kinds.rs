//! Leaf node kinds: lights, locators, meshes and entities.
//!
//! These kinds only add object bounds on top of the transform evaluation.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::bounds::Aabb;
use super::store::{NodeKind, NodeStore};
use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub(crate) color: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self { color: Vec3::ONE }
    }
}

impl Light {
    pub fn color(&self) -> Vec3 {
        self.color
    }
}

/// Gizmo shape drawn for a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorShape {
    #[default]
    Cross,
    Cube,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locator {
    pub(crate) shape: LocatorShape,
}

impl Locator {
    pub fn shape(&self) -> LocatorShape {
        self.shape
    }
}

/// Geometry placed under a transform. Has no transform of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub(crate) bounds: Aabb,
}

impl Mesh {
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// An instance of an entity class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub(crate) set: Option<NodeId>,
}

impl Entity {
    /// The set this entity is an instance of.
    pub fn set(&self) -> Option<NodeId> {
        self.set
    }
}

/// All instances of one entity class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySet {
    pub(crate) class_path: String,
    pub(crate) class_bounds: Option<Aabb>,
    pub(crate) instances: Vec<NodeId>,
}

impl EntitySet {
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    pub fn class_bounds(&self) -> Option<Aabb> {
        self.class_bounds
    }

    pub fn instances(&self) -> &[NodeId] {
        &self.instances
    }

    /// Display name derived from the class path: the file name without
    /// directories or extension.
    pub fn name_for_path(class_path: &str) -> String {
        let file = class_path
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(class_path);
        match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => file.to_string(),
        }
    }
}

impl NodeStore {
    pub(super) fn evaluate_light(&mut self, id: NodeId) {
        // Keep the pointer a constant size regardless of the light's scale
        let scale = self
            .transform(id)
            .map(|t| t.inverse_global_transform().to_scale_rotation_translation().0)
            .unwrap_or(Vec3::ONE);
        let bounds = Aabb::cube(self.primitives.light_pointer_extent).scaled(scale);
        self.set_object_bounds(id, bounds);
    }

    pub(super) fn evaluate_locator(&mut self, id: NodeId) {
        let Some(NodeKind::Locator(locator)) = self.get(id).map(|e| &e.kind) else {
            return;
        };
        let size = match locator.shape {
            LocatorShape::Cross => self.primitives.locator_cross_size,
            LocatorShape::Cube => self.primitives.locator_cube_size,
        };
        self.set_object_bounds(id, Aabb::cube(size));
    }

    pub(super) fn evaluate_mesh(&mut self, id: NodeId) {
        if let Some(NodeKind::Mesh(mesh)) = self.get(id).map(|e| &e.kind) {
            let bounds = mesh.bounds;
            self.set_object_bounds(id, bounds);
        }
    }

    pub(super) fn evaluate_entity(&mut self, id: NodeId) {
        let Some(NodeKind::Entity(entity)) = self.get(id).map(|e| &e.kind) else {
            return;
        };
        let bounds = entity
            .set
            .and_then(|set| match &self.get(set)?.kind {
                NodeKind::EntitySet(set) => set.class_bounds,
                _ => None,
            })
            .unwrap_or(Aabb::EMPTY);
        self.set_object_bounds(id, bounds);
    }
}
