/// Frustum - the six half-spaces bounding a camera or light volume.
///
/// Planes are stored as `(nx, ny, nz, d)` with the normal pointing into the
/// visible volume, so a point is inside when its signed distance to every
/// plane is non-negative. The scene rebuilds its frustum from the active
/// transform at the start of each evaluation; shadow passes use the light's
/// view-projection instead.

use glam::{Mat4, Vec3, Vec4};
use super::aabb::Aabb;

/// Three-way classification of a box against the frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumTest {
    Outside,
    Inside,
    /// Straddles at least one plane
    Partial,
}

pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Indexed by the `PLANE_*` constants
    pub planes: [Vec4; 6],
}

impl Default for Frustum {
    /// Clip-space cube of the identity transform
    fn default() -> Self {
        Self::from_view_projection(&Mat4::IDENTITY)
    }
}

/// Box corner furthest along `normal`
#[inline]
fn positive_vertex(aabb: &Aabb, normal: Vec3) -> Vec3 {
    Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min)
}

/// Box corner furthest against `normal`
#[inline]
fn negative_vertex(aabb: &Aabb, normal: Vec3) -> Vec3 {
    Vec3::select(normal.cmpge(Vec3::ZERO), aabb.min, aabb.max)
}

impl Frustum {
    pub fn from_view_projection(transform: &Mat4) -> Self {
        let mut frustum = Self { planes: [Vec4::ZERO; 6] };
        frustum.update(transform);
        frustum
    }

    /// Re-extract the planes from `transform` (projection * view)
    ///
    /// Depth is in the [0, 1] range of glam's right-handed projections, so
    /// the near plane is the third row alone.
    pub fn update(&mut self, transform: &Mat4) {
        let (x, y, z, w) = (transform.row(0), transform.row(1), transform.row(2), transform.row(3));
        self.planes = [w + x, w - x, w + y, w - y, z, w - z];

        for plane in &mut self.planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }
    }

    /// Signed distance of `point` to `plane` (positive inside)
    #[inline]
    pub fn signed_distance(plane: &Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    /// Conservative box test: false only when the box is behind one plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            Self::signed_distance(plane, positive_vertex(aabb, plane.truncate())) >= 0.0
        })
    }

    pub fn classify_aabb(&self, aabb: &Aabb) -> FrustumTest {
        let mut result = FrustumTest::Inside;
        for plane in &self.planes {
            let normal = plane.truncate();
            if Self::signed_distance(plane, positive_vertex(aabb, normal)) < 0.0 {
                return FrustumTest::Outside;
            }
            if Self::signed_distance(plane, negative_vertex(aabb, normal)) < 0.0 {
                result = FrustumTest::Partial;
            }
        }
        result
    }

    /// Rejects only when all points lie behind one plane
    pub fn intersects_points(&self, points: &[Vec3]) -> bool {
        self.planes.iter().all(|plane| {
            points.iter().any(|&p| Self::signed_distance(plane, p) >= 0.0)
        })
    }

    /// Every point in front of every plane
    pub fn contains_points(&self, points: &[Vec3]) -> bool {
        points.iter().all(|&p| self.contains_point(p))
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|plane| Self::signed_distance(plane, center) > -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| Self::signed_distance(plane, point) >= 0.0)
    }
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
