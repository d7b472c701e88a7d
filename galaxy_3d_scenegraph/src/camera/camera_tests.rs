use glam::{Mat4, Vec3, Vec4};
use crate::culling::{Aabb, FrustumTest};
use super::*;

fn create_test_camera() -> Camera {
    Camera::new("main", Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO)
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_camera_defaults() {
    let camera = create_test_camera();
    assert_eq!(camera.min_z, 1.0);
    assert_eq!(camera.max_z, 10000.0);
    assert_eq!(camera.layer_mask, DEFAULT_LAYER_MASK);
    assert_eq!(camera.unique_id(), 0);
    assert!(camera.post_processes().is_empty());
}

// ============================================================================
// Matrices
// ============================================================================

#[test]
fn test_view_matrix_moves_target_down_negative_z() {
    let camera = create_test_camera();
    let target_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
    assert!((target_in_view - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-5);
}

#[test]
fn test_transform_is_projection_times_view() {
    let camera = create_test_camera();
    assert_eq!(camera.transform_matrix(), camera.projection_matrix() * camera.view_matrix());
}

#[test]
fn test_orthographic_projection() {
    let mut camera = create_test_camera();
    camera.mode = CameraMode::Orthographic { left: -2.0, right: 2.0, bottom: -1.0, top: 1.0 };
    camera.min_z = 0.5;
    camera.max_z = 50.0;
    assert_eq!(
        camera.projection_matrix(),
        Mat4::orthographic_rh(-2.0, 2.0, -1.0, 1.0, 0.5, 50.0)
    );
}

#[test]
fn test_frustum_follows_camera() {
    let camera = create_test_camera();
    let frustum = camera.frustum();
    let at_origin = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let behind = Aabb::new(Vec3::new(-1.0, -1.0, 20.0), Vec3::new(1.0, 1.0, 22.0));
    assert_eq!(frustum.classify_aabb(&at_origin), FrustumTest::Inside);
    assert_eq!(frustum.classify_aabb(&behind), FrustumTest::Outside);
}

#[test]
fn test_clip_space_depth_is_zero_to_one() {
    let camera = create_test_camera();
    let near = camera.transform_matrix() * Vec4::new(0.0, 0.0, 9.0, 1.0);
    let far = camera.transform_matrix() * Vec4::new(0.0, 0.0, 10.0 - 10000.0, 1.0);
    assert!((near.z / near.w).abs() < 1e-4);
    assert!((far.z / far.w - 1.0).abs() < 1e-3);
}
