//! Property edits.
//!
//! Every setter dirties the node it changes, so the next sweep picks the
//! change up. Setters fail with [`SceneError::WrongKind`] when the node does
//! not have the property.

use glam::{Mat4, Vec3};

use super::bounds::Aabb;
use super::kinds::LocatorShape;
use super::scene::Scene;
use super::skin::Influence;
use super::store::{NodeKind, NodeType, TypeFlags};
use super::transform::TransformComponents;
use crate::error::SceneError;
use crate::graph::NodeId;

impl Scene {
    fn wrong_kind(&self, id: NodeId, expected: &'static str) -> SceneError {
        match self.store.node_type(id) {
            Some(actual) => SceneError::WrongKind {
                node: id,
                expected,
                actual: actual.name(),
            },
            None => SceneError::UnknownNode(id),
        }
    }

    /// Apply `edit` to the node's transform components and dirty it.
    pub fn edit_transform(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut TransformComponents),
    ) -> Result<(), SceneError> {
        let Some(transform) = self.store.get_mut(id).and_then(|e| e.transform.as_mut()) else {
            return Err(self.wrong_kind(id, "transform"));
        };
        edit(&mut transform.components);
        self.dirty(id);
        Ok(())
    }

    pub fn set_translate(&mut self, id: NodeId, translate: Vec3) -> Result<(), SceneError> {
        self.edit_transform(id, |c| c.translate = translate)
    }

    /// Set the rotation as Euler angles in radians.
    pub fn set_rotate(&mut self, id: NodeId, rotate: Vec3) -> Result<(), SceneError> {
        self.edit_transform(id, |c| c.rotate = rotate)
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<(), SceneError> {
        self.edit_transform(id, |c| c.scale = scale)
    }

    pub fn set_inherit_transform(&mut self, id: NodeId, inherit: bool) -> Result<(), SceneError> {
        self.edit_transform(id, |c| c.inherit_transform = inherit)
    }

    /// Rotation as Euler angles in degrees.
    pub fn rotate_degrees(&self, id: NodeId) -> Option<Vec3> {
        let rotate = self.store.transform(id)?.components.rotate;
        Some(Vec3::new(
            rotate.x.to_degrees(),
            rotate.y.to_degrees(),
            rotate.z.to_degrees(),
        ))
    }

    pub fn set_rotate_degrees(&mut self, id: NodeId, degrees: Vec3) -> Result<(), SceneError> {
        let radians = Vec3::new(
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        );
        self.set_rotate(id, radians)
    }

    /// Reset scale, rotation and translation to identity.
    pub fn reset_transform(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.edit_transform(id, TransformComponents::reset)
    }

    /// Set local components so that the node's global transform becomes
    /// `global`. Uses the parent transform from the last sweep.
    pub fn set_global_transform(&mut self, id: NodeId, global: Mat4) -> Result<(), SceneError> {
        let parent_inverse = self
            .store
            .parent(id)
            .and_then(|p| self.store.transform_of(p))
            .and_then(|t| self.store.transform(t))
            .map(|t| t.inverse_global_transform());

        let Some(transform) = self.store.get_mut(id).and_then(|e| e.transform.as_mut()) else {
            return Err(self.wrong_kind(id, "transform"));
        };
        transform.localize(global, parent_inverse);
        self.dirty(id);
        Ok(())
    }

    /// Re-derive local components from the current global transform.
    pub fn center_transform(&mut self, id: NodeId) -> Result<(), SceneError> {
        let global = self
            .store
            .transform(id)
            .map(|t| t.global_transform())
            .ok_or_else(|| self.wrong_kind(id, "transform"))?;
        self.reset_transform(id)?;
        self.set_global_transform(id, global)
    }

    /// Capture the bind pose again on the next sweep.
    pub fn reset_bind_pose(&mut self, id: NodeId) -> Result<(), SceneError> {
        let Some(transform) = self.store.get_mut(id).and_then(|e| e.transform.as_mut()) else {
            return Err(self.wrong_kind(id, "transform"));
        };
        transform.invalidate_bind();
        self.dirty(id);
        Ok(())
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> Result<(), SceneError> {
        let Some(hierarchy) = self.store.hierarchy_mut(id) else {
            return Err(SceneError::NotHierarchyNode(id));
        };
        hierarchy.hidden = hidden;
        self.dirty(id);
        Ok(())
    }

    pub fn set_live(&mut self, id: NodeId, live: bool) -> Result<(), SceneError> {
        let Some(hierarchy) = self.store.hierarchy_mut(id) else {
            return Err(SceneError::NotHierarchyNode(id));
        };
        hierarchy.live = live;
        Ok(())
    }

    pub fn set_highlighted(&mut self, id: NodeId, highlighted: bool) -> Result<(), SceneError> {
        let Some(hierarchy) = self.store.hierarchy_mut(id) else {
            return Err(SceneError::NotHierarchyNode(id));
        };
        hierarchy.highlighted = highlighted;
        Ok(())
    }

    /// Set the reactive flag on a node and its whole subtree.
    pub fn set_reactive(&mut self, id: NodeId, reactive: bool) -> Result<(), SceneError> {
        if self.store.hierarchy(id).is_none() {
            return Err(SceneError::NotHierarchyNode(id));
        }

        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(hierarchy) = self.store.hierarchy_mut(node) {
                hierarchy.reactive = reactive;
                stack.extend(hierarchy.children.iter().copied());
            }
        }
        Ok(())
    }

    pub fn type_flags(&self, node_type: NodeType) -> TypeFlags {
        self.store.type_flags(node_type)
    }

    /// Show or hide every node of a type.
    pub fn set_type_visible(&mut self, node_type: NodeType, visible: bool) {
        self.store.type_flags.entry(node_type).or_default().visible = visible;
        self.dirty_type(node_type);
    }

    pub fn set_type_selectable(&mut self, node_type: NodeType, selectable: bool) {
        self.store.type_flags.entry(node_type).or_default().selectable = selectable;
        self.dirty_type(node_type);
    }

    fn dirty_type(&mut self, node_type: NodeType) {
        let ids: Vec<NodeId> = self
            .store
            .entries
            .iter()
            .filter(|(_, entry)| entry.node_type() == node_type)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.dirty(id);
        }
    }

    fn edit_kind<T>(
        &mut self,
        id: NodeId,
        expected: NodeType,
        edit: impl FnOnce(&mut NodeKind) -> T,
    ) -> Result<T, SceneError> {
        self.expect_type(id, expected)?;
        let entry = self.entry_mut(id)?;
        let out = edit(&mut entry.kind);
        self.dirty(id);
        Ok(out)
    }

    pub fn set_layer_visible(&mut self, layer: NodeId, visible: bool) -> Result<(), SceneError> {
        self.edit_kind(layer, NodeType::Layer, |kind| {
            if let NodeKind::Layer(layer) = kind {
                layer.visible = visible;
            }
        })
    }

    pub fn set_layer_selectable(&mut self, layer: NodeId, selectable: bool) -> Result<(), SceneError> {
        self.edit_kind(layer, NodeType::Layer, |kind| {
            if let NodeKind::Layer(layer) = kind {
                layer.selectable = selectable;
            }
        })
    }

    /// Set the layer color. Members are only dirtied if the color changed.
    pub fn set_layer_color(&mut self, layer: NodeId, color: Vec3) -> Result<(), SceneError> {
        self.expect_type(layer, NodeType::Layer)?;
        if let NodeKind::Layer(data) = &mut self.entry_mut(layer)?.kind {
            if data.color == color {
                return Ok(());
            }
            data.color = color;
        }
        self.dirty(layer);
        Ok(())
    }

    /// Make `node` a member of `layer`.
    pub fn add_layer_member(&mut self, layer: NodeId, node: NodeId) -> Result<(), SceneError> {
        self.expect_type(layer, NodeType::Layer)?;
        self.create_dependency(node, layer)
    }

    pub fn remove_layer_member(&mut self, layer: NodeId, node: NodeId) -> Result<(), SceneError> {
        self.expect_type(layer, NodeType::Layer)?;
        self.remove_dependency(node, layer)
    }

    pub fn set_light_color(&mut self, light: NodeId, color: Vec3) -> Result<(), SceneError> {
        self.edit_kind(light, NodeType::Light, |kind| {
            if let NodeKind::Light(light) = kind {
                light.color = color;
            }
        })
    }

    pub fn set_locator_shape(&mut self, locator: NodeId, shape: LocatorShape) -> Result<(), SceneError> {
        self.edit_kind(locator, NodeType::Locator, |kind| {
            if let NodeKind::Locator(locator) = kind {
                locator.shape = shape;
            }
        })
    }

    pub fn set_mesh_bounds(&mut self, mesh: NodeId, bounds: Aabb) -> Result<(), SceneError> {
        self.edit_kind(mesh, NodeType::Mesh, |kind| {
            if let NodeKind::Mesh(mesh) = kind {
                mesh.bounds = bounds;
            }
        })
    }

    /// Set the bounds of an entity class. Every instance picks them up on
    /// the next sweep.
    pub fn set_entity_class_bounds(
        &mut self,
        set: NodeId,
        bounds: Option<Aabb>,
    ) -> Result<(), SceneError> {
        self.edit_kind(set, NodeType::EntitySet, |kind| {
            if let NodeKind::EntitySet(set) = kind {
                set.class_bounds = bounds;
            }
        })
    }

    /// Replace the per-vertex influences of a skin.
    pub fn set_skin_influences(
        &mut self,
        skin: NodeId,
        influences: Vec<Influence>,
    ) -> Result<(), SceneError> {
        self.edit_kind(skin, NodeType::Skin, |kind| {
            if let NodeKind::Skin(skin) = kind {
                skin.influences = influences;
            }
        })
    }
}
