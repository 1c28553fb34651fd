//! Transforms
//!
//! Local scale, rotation and translation plus the matrices derived from them.
//! Matrices use the column-vector convention: a point `p` in object space
//! maps to world space as `global * p`, and `global = parent.global * object`.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local transform components of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformComponents {
    pub scale: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotate: Vec3,
    pub translate: Vec3,
    /// Whether the parent's global transform applies to this node.
    pub inherit_transform: bool,
}

impl Default for TransformComponents {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            rotate: Vec3::ZERO,
            translate: Vec3::ZERO,
            inherit_transform: true,
        }
    }
}

impl TransformComponents {
    /// Compose `T * R * S`.
    pub fn object_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.translate)
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotate.x, self.rotate.y, self.rotate.z)
    }

    /// Replace scale, rotation and translation with a decomposition of `matrix`.
    pub fn set_from_matrix(&mut self, matrix: &Mat4) {
        let (scale, rotation, translate) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        self.scale = scale;
        self.rotate = Vec3::new(x, y, z);
        self.translate = translate;
    }

    pub fn reset(&mut self) {
        self.scale = Vec3::ONE;
        self.rotate = Vec3::ZERO;
        self.translate = Vec3::ZERO;
    }
}

/// A transform node: components plus cached matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub(crate) components: TransformComponents,

    object: Mat4,
    inverse_object: Mat4,
    global: Mat4,
    inverse_global: Mat4,

    /// Captured on the first evaluation after the bind pose was invalidated.
    bind: Mat4,
    inverse_bind: Mat4,
    bind_dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(TransformComponents::default())
    }
}

impl Transform {
    pub fn new(components: TransformComponents) -> Self {
        Self {
            components,
            object: Mat4::IDENTITY,
            inverse_object: Mat4::IDENTITY,
            global: Mat4::IDENTITY,
            inverse_global: Mat4::IDENTITY,
            bind: Mat4::IDENTITY,
            inverse_bind: Mat4::IDENTITY,
            bind_dirty: true,
        }
    }

    pub fn components(&self) -> &TransformComponents {
        &self.components
    }

    pub fn object_transform(&self) -> Mat4 {
        self.object
    }

    pub fn inverse_object_transform(&self) -> Mat4 {
        self.inverse_object
    }

    pub fn global_transform(&self) -> Mat4 {
        self.global
    }

    pub fn inverse_global_transform(&self) -> Mat4 {
        self.inverse_global
    }

    pub fn bind_transform(&self) -> Mat4 {
        self.bind
    }

    pub fn inverse_bind_transform(&self) -> Mat4 {
        self.inverse_bind
    }

    /// Capture the bind pose again on the next evaluation.
    pub(crate) fn invalidate_bind(&mut self) {
        self.bind_dirty = true;
    }

    /// Recompute matrices. `parent` carries the parent transform's global and
    /// bind matrices when there is one.
    pub(crate) fn evaluate(&mut self, parent: Option<(Mat4, Mat4)>) {
        let parent = parent.filter(|_| self.components.inherit_transform);

        self.object = self.components.object_matrix();
        self.inverse_object = self.object.inverse();

        self.global = match parent {
            Some((parent_global, _)) => parent_global * self.object,
            None => self.object,
        };
        self.inverse_global = self.global.inverse();

        if self.bind_dirty {
            self.bind = match parent {
                Some((_, parent_bind)) => parent_bind * self.object,
                None => self.object,
            };
            self.inverse_bind = self.bind.inverse();
            self.bind_dirty = false;
        }
    }

    /// Set the local components so that the global transform becomes
    /// `global`, given the parent's inverse global transform.
    pub(crate) fn localize(&mut self, global: Mat4, parent_inverse_global: Option<Mat4>) {
        self.global = global;
        let object = match parent_inverse_global {
            Some(inverse) if self.components.inherit_transform => inverse * global,
            _ => global,
        };
        self.components.set_from_matrix(&object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn object_matrix_is_trs() {
        let components = TransformComponents {
            scale: Vec3::splat(2.0),
            rotate: Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            translate: Vec3::new(1.0, 0.0, 0.0),
            inherit_transform: true,
        };

        // Scale, then rotate X onto Y, then translate
        let p = components.object_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn global_composes_with_parent() {
        let mut transform = Transform::new(TransformComponents {
            translate: Vec3::Y,
            ..Default::default()
        });
        let parent = Mat4::from_translation(Vec3::X);

        transform.evaluate(Some((parent, parent)));

        assert!(approx(
            transform.global_transform(),
            Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0))
        ));
        assert!(approx(
            transform.global_transform() * transform.inverse_global_transform(),
            Mat4::IDENTITY
        ));
    }

    #[test]
    fn no_inherit_ignores_parent() {
        let mut transform = Transform::new(TransformComponents {
            translate: Vec3::Y,
            inherit_transform: false,
            ..Default::default()
        });
        let parent = Mat4::from_translation(Vec3::X);

        transform.evaluate(Some((parent, parent)));

        assert!(approx(transform.global_transform(), Mat4::from_translation(Vec3::Y)));
    }

    #[test]
    fn bind_pose_is_captured_once() {
        let mut transform = Transform::default();
        transform.evaluate(None);

        transform.components.translate = Vec3::Z;
        transform.evaluate(None);
        assert!(approx(transform.bind_transform(), Mat4::IDENTITY));

        transform.invalidate_bind();
        transform.evaluate(None);
        assert!(approx(transform.bind_transform(), Mat4::from_translation(Vec3::Z)));
    }

    #[test]
    fn localize_recovers_components() {
        let mut transform = Transform::default();
        let parent_global = Mat4::from_translation(Vec3::X);
        let target = Mat4::from_translation(Vec3::new(3.0, 2.0, 0.0));

        transform.localize(target, Some(parent_global.inverse()));

        assert!(transform
            .components()
            .translate
            .abs_diff_eq(Vec3::new(2.0, 2.0, 0.0), 1e-5));
    }
}
