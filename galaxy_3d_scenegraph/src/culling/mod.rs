//! Bounding volumes, frustum tests and the block octree

mod aabb;
mod bounding_box;
mod bounding_info;
mod bounding_sphere;
mod frustum;
mod octree;

pub use aabb::Aabb;
pub use bounding_box::BoundingBox;
pub use bounding_info::{BoundingInfo, CullingStrategy};
pub use bounding_sphere::BoundingSphere;
pub use frustum::{
    Frustum, FrustumTest, PLANE_BOTTOM, PLANE_FAR, PLANE_LEFT, PLANE_NEAR, PLANE_RIGHT, PLANE_TOP,
};
pub use octree::Octree;
