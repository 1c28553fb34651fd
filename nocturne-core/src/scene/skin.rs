//! Skins
//!
//! A skin binds a mesh to a set of influence transforms. The mesh depends
//! on the skin, and the skin depends on every influence transform and on the
//! transform the mesh is placed under, so a sweep always sees final
//! influence matrices before it blends them.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use super::store::{NodeKind, NodeStore};
use crate::graph::NodeId;

/// Weights of one vertex against the skin's influence objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    /// Indices into the skin's influence objects.
    pub objects: Vec<u32>,
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub(crate) mesh: Option<NodeId>,
    pub(crate) influence_objects: Vec<NodeId>,
    pub(crate) influences: Vec<Influence>,

    /// One per influence object, rebuilt on every evaluation.
    deform_matrices: Vec<Mat4>,

    /// One per influence, rebuilt on every evaluation.
    skin_matrices: Vec<Mat4>,
}

impl Skin {
    /// An unbound skin carrying only vertex weights.
    pub(crate) fn with_influences(influences: Vec<Influence>) -> Self {
        Self {
            influences,
            ..Default::default()
        }
    }

    pub fn mesh(&self) -> Option<NodeId> {
        self.mesh
    }

    pub fn influence_objects(&self) -> &[NodeId] {
        &self.influence_objects
    }

    pub fn influences(&self) -> &[Influence] {
        &self.influences
    }

    pub fn deform_matrices(&self) -> &[Mat4] {
        &self.deform_matrices
    }

    pub fn skin_matrices(&self) -> &[Mat4] {
        &self.skin_matrices
    }
}

/// Weighted sum of deform matrices for one influence.
fn blend_matrix(deform: &[Mat4], influence: &Influence) -> Mat4 {
    let mut blended = Mat4::ZERO;
    for (&object, &weight) in influence.objects.iter().zip(&influence.weights) {
        if let Some(matrix) = deform.get(object as usize) {
            blended += *matrix * weight;
        }
    }
    blended
}

impl NodeStore {
    pub(super) fn evaluate_skin(&mut self, id: NodeId) {
        let Some(NodeKind::Skin(skin)) = self.get(id).map(|e| &e.kind) else {
            return;
        };

        let (mesh_global, mesh_inverse) = match skin.mesh.filter(|m| self.get(*m).is_some()) {
            Some(mesh) => (self.global_transform(mesh), self.inverse_global_transform(mesh)),
            None => (Mat4::IDENTITY, Mat4::IDENTITY),
        };
        let in_world = mesh_global == Mat4::IDENTITY;

        let deform: Vec<Mat4> = skin
            .influence_objects
            .iter()
            .map(|&object| {
                let Some(transform) = self.transform_of(object).and_then(|t| self.transform(t)) else {
                    return Mat4::IDENTITY;
                };
                let matrix = transform.global_transform() * transform.inverse_bind_transform();
                if in_world {
                    matrix
                } else {
                    mesh_inverse * matrix * mesh_global
                }
            })
            .collect();

        let blended: Vec<Mat4> = skin
            .influences
            .iter()
            .map(|influence| mesh_inverse * blend_matrix(&deform, influence))
            .collect();

        if let Some(NodeKind::Skin(skin)) = self.get_mut(id).map(|e| &mut e.kind) {
            skin.deform_matrices = deform;
            skin.skin_matrices = blended;
        }
    }
}
