//! View frustum culling

use crate::foundation::math::{Aabb, Mat4, Vec3, Vec4};

/// Six clip planes extracted from a projection-view matrix
///
/// Plane normals point inward; a point is inside when
/// `dot(normal, point) + w >= 0` for every plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the planes of `projection * view`
    pub fn from_matrix(projection_view: &Mat4) -> Self {
        let mut frustum = Self::default();
        frustum.update(projection_view);
        frustum
    }

    /// Re-extract the planes from a new projection-view matrix
    pub fn update(&mut self, projection_view: &Mat4) {
        let row = |i: usize| -> Vec4 { projection_view.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        self.planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2];
        for plane in &mut self.planes {
            let length = plane.xyz().norm();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
    }

    /// Planes in left, right, bottom, top, near, far order
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// True if the point is on the inner side of every plane
    pub fn intersects_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.xyz().dot(point) + plane.w >= 0.0)
    }

    /// Conservative box test: false only if the box is fully outside one plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::new(
                if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.xyz().dot(&positive) + plane.w >= 0.0
        })
    }
}

impl Default for Frustum {
    /// Degenerate frustum that accepts everything
    fn default() -> Self {
        Self { planes: [Vec4::zeros(); 6] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    fn camera_frustum() -> Frustum {
        let projection = Mat4::perspective_gl(1.0, 1.0, 0.1, 100.0);
        let view = Mat4::look_at(Vec3::zeros(), -Vec3::z(), Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_point_in_front_is_inside() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_point(&Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.intersects_point(&Vec3::new(0.0, 0.0, 5.0)));
        assert!(!frustum.intersects_point(&Vec3::new(0.0, 0.0, -500.0)));
    }

    #[test]
    fn test_aabb_culling() {
        let frustum = camera_frustum();
        let visible = Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 4.0), Vec3::new(1.0, 1.0, 6.0));
        let straddling = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(frustum.intersects_aabb(&straddling));
    }

    #[test]
    fn test_default_accepts_everything() {
        let frustum = Frustum::default();
        assert!(frustum.intersects_point(&Vec3::new(1e6, -1e6, 0.0)));
    }
}
