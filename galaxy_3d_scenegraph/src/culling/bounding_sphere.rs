/// Bounding sphere: local center/radius and their world-space image.

use glam::{Mat4, Vec3};
use super::aabb::Aabb;
use super::frustum::Frustum;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
    pub center_world: Vec3,
    pub radius_world: f32,
}

impl BoundingSphere {
    /// Sphere circumscribing the local box `[minimum, maximum]`
    pub fn new(minimum: Vec3, maximum: Vec3, world: &Mat4) -> Self {
        let mut sphere = Self {
            center: Vec3::ZERO,
            radius: 0.0,
            center_world: Vec3::ZERO,
            radius_world: 0.0,
        };
        sphere.reconstruct(minimum, maximum, world);
        sphere
    }

    pub fn reconstruct(&mut self, minimum: Vec3, maximum: Vec3, world: &Mat4) {
        self.center = (minimum + maximum) * 0.5;
        self.radius = minimum.distance(maximum) * 0.5;
        self.update(world);
    }

    /// Radius scales with the largest axis scale of the world matrix
    pub fn update(&mut self, world: &Mat4) {
        self.center_world = world.transform_point3(self.center);
        let scale = world.col(0).truncate().length()
            .max(world.col(1).truncate().length())
            .max(world.col(2).truncate().length());
        self.radius_world = self.radius * scale;
    }

    /// World-space box around the sphere
    pub fn world_aabb(&self) -> Aabb {
        Aabb::new(
            self.center_world - Vec3::splat(self.radius_world),
            self.center_world + Vec3::splat(self.radius_world),
        )
    }

    pub fn is_in_frustum(&self, frustum: &Frustum) -> bool {
        frustum.intersects_sphere(self.center_world, self.radius_world)
    }

    pub fn is_center_in_frustum(&self, frustum: &Frustum) -> bool {
        frustum.contains_point(self.center_world)
    }

    pub fn intersects_point(&self, point: Vec3) -> bool {
        self.center_world.distance_squared(point) <= self.radius_world * self.radius_world
    }

    pub fn intersects_sphere(&self, other: &BoundingSphere) -> bool {
        let radii = self.radius_world + other.radius_world;
        self.center_world.distance_squared(other.center_world) <= radii * radii
    }
}
