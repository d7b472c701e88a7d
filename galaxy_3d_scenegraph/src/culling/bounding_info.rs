/// BoundingInfo - box + sphere pair attached to meshes and submeshes.

use glam::{Mat4, Vec3};
use super::aabb::Aabb;
use super::bounding_box::BoundingBox;
use super::bounding_sphere::BoundingSphere;
use super::frustum::Frustum;

/// How a mesh is tested against the frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingStrategy {
    /// Sphere first, then the oriented box corners
    #[default]
    Standard,
    /// Sphere only
    BoundingSphereOnly,
    /// Sphere center inside the frustum short-circuits to visible, then Standard
    OptimisticInclusion,
    /// Sphere center short-circuit, then sphere only
    OptimisticInclusionThenBSphereOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingInfo {
    pub bounding_box: BoundingBox,
    pub bounding_sphere: BoundingSphere,
    is_locked: bool,
}

impl BoundingInfo {
    pub fn new(minimum: Vec3, maximum: Vec3, world: &Mat4) -> Self {
        Self {
            bounding_box: BoundingBox::new(minimum, maximum, world),
            bounding_sphere: BoundingSphere::new(minimum, maximum, world),
            is_locked: false,
        }
    }

    /// Replace the local extents (ignores the lock)
    pub fn reconstruct(&mut self, minimum: Vec3, maximum: Vec3, world: &Mat4) {
        self.bounding_box.reconstruct(minimum, maximum, world);
        self.bounding_sphere.reconstruct(minimum, maximum, world);
    }

    pub fn minimum(&self) -> Vec3 {
        self.bounding_box.minimum
    }

    pub fn maximum(&self) -> Vec3 {
        self.bounding_box.maximum
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// A locked info keeps its world data until unlocked
    pub fn set_locked(&mut self, locked: bool) {
        self.is_locked = locked;
    }

    pub fn update(&mut self, world: &Mat4) {
        if self.is_locked {
            return;
        }
        self.bounding_box.update(world);
        self.bounding_sphere.update(world);
    }

    /// World box covering both volumes; the octree stores entries with it
    pub fn culling_aabb(&self) -> Aabb {
        self.bounding_box.world_aabb().union(&self.bounding_sphere.world_aabb())
    }

    pub fn is_in_frustum(&self, frustum: &Frustum, strategy: CullingStrategy) -> bool {
        let optimistic = matches!(
            strategy,
            CullingStrategy::OptimisticInclusion | CullingStrategy::OptimisticInclusionThenBSphereOnly
        );
        if optimistic && self.bounding_sphere.is_center_in_frustum(frustum) {
            return true;
        }

        if !self.bounding_sphere.is_in_frustum(frustum) {
            return false;
        }

        let sphere_only = matches!(
            strategy,
            CullingStrategy::BoundingSphereOnly | CullingStrategy::OptimisticInclusionThenBSphereOnly
        );
        if sphere_only {
            return true;
        }

        self.bounding_box.is_in_frustum(frustum)
    }

    pub fn is_completely_in_frustum(&self, frustum: &Frustum) -> bool {
        self.bounding_box.is_completely_in_frustum(frustum)
    }

    pub fn intersects_point(&self, point: Vec3) -> bool {
        self.bounding_sphere.intersects_point(point)
            && self.bounding_box.intersects_point(point)
    }

    /// Sphere and world-box overlap; `precise` adds a separating-axis test
    /// between the two oriented boxes.
    pub fn intersects(&self, other: &BoundingInfo, precise: bool) -> bool {
        if !self.bounding_sphere.intersects_sphere(&other.bounding_sphere) {
            return false;
        }
        if !self.bounding_box.intersects_box(&other.bounding_box) {
            return false;
        }
        if !precise {
            return true;
        }

        let a = &self.bounding_box;
        let b = &other.bounding_box;
        let mut axes: Vec<Vec3> = Vec::with_capacity(15);
        axes.extend(a.axes_world.iter().copied());
        axes.extend(b.axes_world.iter().copied());
        for ea in &a.axes_world {
            for eb in &b.axes_world {
                axes.push(ea.cross(*eb));
            }
        }

        axes.into_iter()
            .filter(|axis| axis.length_squared() > 1e-12)
            .map(|axis| axis.normalize())
            .all(|axis| {
                let (min_a, max_a) = a.project_on_axis(axis);
                let (min_b, max_b) = b.project_on_axis(axis);
                min_a <= max_b && min_b <= max_a
            })
    }
}

#[cfg(test)]
#[path = "bounding_info_tests.rs"]
mod tests;
