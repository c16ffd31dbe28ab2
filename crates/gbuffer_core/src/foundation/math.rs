//! Math utilities and types
//!
//! Provides the fundamental math types used by the geometry pipeline. Matrices
//! follow OpenGL clip-space conventions (right-handed view space, depth in
//! [-1, 1]) because the shaders the pipeline feeds are GLSL.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 2D integer vector type
pub type IVec2 = Vector2<i32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box center
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Box extent along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros())
    }
}

/// Math utility functions
pub mod utils {
    use super::*;

    /// Reflect `v` about the plane with unit normal `n`
    pub fn reflect(v: &Vec3, n: &Vec3) -> Vec3 {
        v - 2.0 * n.dot(v) * n
    }

    /// Transform a point by an affine matrix
    pub fn transform_point(m: &Mat4, p: &Vec3) -> Vec3 {
        m.transform_point(&Point3::from(*p)).coords
    }

    /// Transform a direction by an affine matrix (translation ignored)
    pub fn transform_vector(m: &Mat4, v: &Vec3) -> Vec3 {
        m.transform_vector(v)
    }
}

/// Extension trait for Mat4 with OpenGL-convention constructors
pub trait Mat4Ext {
    /// Right-handed perspective projection, depth mapped to [-1, 1]
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed orthographic projection, depth mapped to [-1, 1]
    fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reflect_flips_normal_component() {
        let v = Vec3::new(1.0, -2.0, 3.0);
        let r = utils::reflect(&v, &Vec3::y());
        assert_relative_eq!(r, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_aabb_size_and_center() {
        let aabb = Aabb::new(Vec3::new(-2.0, 0.0, -1.0), Vec3::new(2.0, 0.0, 3.0));
        assert_relative_eq!(aabb.size(), Vec3::new(4.0, 0.0, 4.0));
        assert_relative_eq!(aabb.center(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 2.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());
        let p = utils::transform_point(&view, &eye);
        assert_relative_eq!(p, Vec3::zeros(), epsilon = 1e-5);
    }
}
