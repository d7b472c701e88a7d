/// Oriented bounding box: local extents plus their world-space image.

use glam::{Mat4, Vec3};
use super::aabb::Aabb;
use super::frustum::Frustum;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    /// Local-space minimum
    pub minimum: Vec3,
    /// Local-space maximum
    pub maximum: Vec3,
    /// Local-space center
    pub center: Vec3,
    /// Local-space half extents
    pub extend_size: Vec3,

    /// The 8 local corners transformed by the world matrix
    pub vectors_world: [Vec3; 8],
    /// World-space AABB of `vectors_world`
    pub minimum_world: Vec3,
    pub maximum_world: Vec3,
    pub center_world: Vec3,
    /// Half extents of the world AABB
    pub extend_size_world: Vec3,
    /// World-space half axes of the oriented box
    pub axes_world: [Vec3; 3],

    world: Mat4,
}

impl BoundingBox {
    pub fn new(minimum: Vec3, maximum: Vec3, world: &Mat4) -> Self {
        let mut bbox = Self {
            minimum,
            maximum,
            center: Vec3::ZERO,
            extend_size: Vec3::ZERO,
            vectors_world: [Vec3::ZERO; 8],
            minimum_world: Vec3::ZERO,
            maximum_world: Vec3::ZERO,
            center_world: Vec3::ZERO,
            extend_size_world: Vec3::ZERO,
            axes_world: [Vec3::ZERO; 3],
            world: *world,
        };
        bbox.reconstruct(minimum, maximum, world);
        bbox
    }

    /// Replace the local extents and recompute the world data
    pub fn reconstruct(&mut self, minimum: Vec3, maximum: Vec3, world: &Mat4) {
        self.minimum = minimum;
        self.maximum = maximum;
        self.center = (minimum + maximum) * 0.5;
        self.extend_size = (maximum - minimum) * 0.5;
        self.update(world);
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    pub fn update(&mut self, world: &Mat4) {
        let local = Aabb::new(self.minimum, self.maximum);
        for (out, corner) in self.vectors_world.iter_mut().zip(local.corners()) {
            *out = world.transform_point3(corner);
        }

        let world_aabb = Aabb::from_points(self.vectors_world);
        self.minimum_world = world_aabb.min;
        self.maximum_world = world_aabb.max;
        self.center_world = world_aabb.center();
        self.extend_size_world = world_aabb.extent();

        for i in 0..3 {
            self.axes_world[i] = world.col(i).truncate() * self.extend_size[i];
        }
        self.world = *world;
    }

    /// World-space AABB
    pub fn world_aabb(&self) -> Aabb {
        Aabb::new(self.minimum_world, self.maximum_world)
    }

    /// Rejected only when every world corner is behind one plane
    pub fn is_in_frustum(&self, frustum: &Frustum) -> bool {
        frustum.intersects_points(&self.vectors_world)
    }

    pub fn is_completely_in_frustum(&self, frustum: &Frustum) -> bool {
        frustum.contains_points(&self.vectors_world)
    }

    pub fn intersects_point(&self, point: Vec3) -> bool {
        const EPSILON: f32 = 1e-6;
        point.cmpge(self.minimum_world - EPSILON).all()
            && point.cmple(self.maximum_world + EPSILON).all()
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.world_aabb().intersects_sphere(center, radius)
    }

    pub fn intersects_min_max(&self, min: Vec3, max: Vec3) -> bool {
        self.world_aabb().intersects(&Aabb::new(min, max))
    }

    /// World AABB overlap
    pub fn intersects_box(&self, other: &BoundingBox) -> bool {
        self.world_aabb().intersects(&other.world_aabb())
    }

    /// Projection interval of the oriented box on an axis
    pub fn project_on_axis(&self, axis: Vec3) -> (f32, f32) {
        let center = self.world.transform_point3(self.center);
        let p = center.dot(axis);
        let r: f32 = self.axes_world.iter().map(|a| a.dot(axis).abs()).sum();
        (p - r, p + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_data_follows_transform() {
        let world = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let bbox = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0), &world);

        assert_eq!(bbox.minimum_world, Vec3::new(3.0, -2.0, -2.0));
        assert_eq!(bbox.maximum_world, Vec3::new(7.0, 2.0, 2.0));
        assert_eq!(bbox.center_world, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(bbox.extend_size_world, Vec3::splat(2.0));
        assert_eq!(bbox.extend_size, Vec3::ONE);
    }

    #[test]
    fn test_point_and_box_intersections() {
        let a = BoundingBox::new(Vec3::ZERO, Vec3::ONE, &Mat4::IDENTITY);
        let b = BoundingBox::new(Vec3::splat(0.5), Vec3::splat(2.0), &Mat4::IDENTITY);
        let c = BoundingBox::new(Vec3::splat(3.0), Vec3::splat(4.0), &Mat4::IDENTITY);

        assert!(a.intersects_point(Vec3::splat(0.5)));
        assert!(!a.intersects_point(Vec3::splat(1.5)));
        assert!(a.intersects_box(&b));
        assert!(!a.intersects_box(&c));
        assert!(a.intersects_min_max(Vec3::splat(0.9), Vec3::splat(5.0)));
    }

    #[test]
    fn test_projection_interval_of_rotated_box() {
        let world = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let bbox = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0), &world);
        let (min, max) = bbox.project_on_axis(Vec3::X);
        let expected = 2.0_f32.sqrt();
        assert!((max - expected).abs() < 1e-5);
        assert!((min + expected).abs() < 1e-5);
    }
}
