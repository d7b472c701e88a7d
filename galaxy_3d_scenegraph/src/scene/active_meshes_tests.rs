use glam::{Mat4, Vec3};
use crate::camera::Camera;
use crate::error::Error;
use crate::mesh::{Mesh, MeshKey};
use super::super::test_fixtures::{add_camera, add_cube, cube_data, draw_calls, mock_scene};

// ============================================================================
// SELECTION
// ============================================================================

#[test]
fn test_hidden_meshes_are_not_selected() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    let visible = add_cube(&mut scene, "visible", Vec3::ZERO);
    let invisible = add_cube(&mut scene, "invisible", Vec3::X);
    let transparent = add_cube(&mut scene, "transparent", Vec3::Y);
    let disabled = add_cube(&mut scene, "disabled", Vec3::NEG_X);
    let flat = add_cube(&mut scene, "flat", Vec3::NEG_Y);
    scene.mesh_mut(invisible).unwrap().is_visible = false;
    scene.mesh_mut(transparent).unwrap().visibility = 0.0;
    scene.mesh_mut(disabled).unwrap().enabled = false;
    scene.mesh_mut(flat).unwrap().scaling = Vec3::ZERO;

    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[visible]);
}

#[test]
fn test_always_selected_mesh_ignores_frustum() {
    let (mut scene, mock) = mock_scene();
    add_camera(&mut scene);
    let behind = add_cube(&mut scene, "behind", Vec3::new(0.0, 0.0, 40.0));
    scene.mesh_mut(behind).unwrap().always_select_as_active_mesh = true;

    scene.render_with_delta(16.0).unwrap();
    assert_eq!(scene.active_meshes(), &[behind]);
    assert_eq!(draw_calls(&mock).len(), 1);
}

#[test]
fn test_evaluation_order_follows_insertion() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    let keys: Vec<MeshKey> = (0..5)
        .map(|i| add_cube(&mut scene, &format!("cube{}", i), Vec3::new(2.0 - i as f32, 0.0, 0.0)))
        .collect();

    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), keys.as_slice());
}

#[test]
fn test_unknown_camera_is_refused() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    scene.remove_camera(camera).unwrap();
    assert!(matches!(scene.evaluate_active_meshes(camera), Err(Error::NotFound(_))));
}

#[test]
fn test_child_world_matrix_follows_parent() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    let parent = add_cube(&mut scene, "parent", Vec3::ZERO);
    let child = add_cube(&mut scene, "child", Vec3::new(1.0, 0.0, 0.0));
    scene.mesh_mut(child).unwrap().parent = Some(parent);
    scene.mesh_mut(parent).unwrap().position = Vec3::new(2.0, 0.0, 0.0);

    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(
        *scene.mesh(child).unwrap().world_matrix(),
        Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)),
    );
}

// ============================================================================
// SELECTION OCTREE
// ============================================================================

#[test]
fn test_octree_indexes_meshes_at_their_world_position() {
    let (mut scene, _mock) = mock_scene();
    let camera = scene.add_camera(Camera::new("camera", Vec3::new(50.0, 0.0, 10.0), Vec3::new(50.0, 0.0, 0.0)));
    add_cube(&mut scene, "origin", Vec3::ZERO);
    let geometry = scene.create_geometry("placed", cube_data()).unwrap();
    let mut placed = Mesh::new("placed", geometry);
    placed.position = Vec3::new(50.0, 0.0, 0.0);
    let placed = scene.add_mesh(placed);

    scene.create_or_update_default_selection_octree();
    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[placed]);

    // Added after the build, through a parent that was never computed either
    let geometry = scene.create_geometry("child", cube_data()).unwrap();
    let mut child = Mesh::new("child", geometry);
    child.position = Vec3::new(0.0, 2.0, 0.0);
    child.parent = Some(placed);
    let child = scene.add_mesh(child);
    let stored = scene.selection_octree().unwrap().entry_bounds(child).unwrap();
    assert!(stored.contains_point(Vec3::new(50.0, 2.0, 0.0)));

    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[placed, child]);
}

#[test]
fn test_moved_mesh_is_relocated_in_octree() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    let still = add_cube(&mut scene, "still", Vec3::ZERO);
    let mover = add_cube(&mut scene, "mover", Vec3::new(-40.0, 0.0, 40.0));
    add_cube(&mut scene, "far", Vec3::new(40.0, 0.0, -40.0));
    scene.create_or_update_selection_octree(1, 2);

    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[still]);

    scene.mesh_mut(mover).unwrap().position = Vec3::new(0.0, 0.0, -5.0);
    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[still, mover]);

    scene.dispose_selection_octree();
    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), &[still, mover]);
}

#[test]
fn test_octree_selection_matches_linear_scan() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    for x in -5..5 {
        for z in -5..5 {
            let position = Vec3::new(x as f32 * 4.0, 0.0, z as f32 * 4.0);
            add_cube(&mut scene, &format!("cube_{}_{}", x, z), position);
        }
    }

    scene.evaluate_active_meshes(camera).unwrap();
    let linear = scene.active_meshes().to_vec();
    assert!(!linear.is_empty());
    assert!(linear.len() < 100);

    let octree = scene.create_or_update_selection_octree(8, 2);
    assert_eq!(octree.entry_count(), 100);
    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes(), linear.as_slice());
}

#[test]
fn test_meshes_added_after_octree_are_indexed() {
    let (mut scene, _mock) = mock_scene();
    let camera = add_camera(&mut scene);
    add_cube(&mut scene, "first", Vec3::ZERO);
    scene.create_or_update_default_selection_octree();
    let late = add_cube(&mut scene, "late", Vec3::X);

    scene.evaluate_active_meshes(camera).unwrap();
    assert!(scene.active_meshes().contains(&late));

    scene.remove_mesh(late).unwrap();
    assert_eq!(scene.selection_octree().unwrap().entry_count(), 1);
    scene.dispose_selection_octree();
    assert!(scene.selection_octree().is_none());
}

// ============================================================================
// FREEZING
// ============================================================================

#[test]
fn test_frozen_active_meshes_are_reused() {
    let (mut scene, mock) = mock_scene();
    let camera = add_camera(&mut scene);
    let first = add_cube(&mut scene, "first", Vec3::ZERO);
    scene.freeze_active_meshes();
    assert!(scene.is_active_meshes_frozen());

    scene.render_with_delta(16.0).unwrap();
    add_cube(&mut scene, "late", Vec3::X);
    scene.mesh_mut(first).unwrap().position = Vec3::new(0.0, 1.0, 0.0);
    scene.render_with_delta(16.0).unwrap();

    assert_eq!(scene.active_meshes(), &[first]);
    assert_eq!(draw_calls(&mock).len(), 2);
    assert_eq!(
        *scene.mesh(first).unwrap().world_matrix(),
        Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
    );

    scene.unfreeze_active_meshes();
    scene.evaluate_active_meshes(camera).unwrap();
    assert_eq!(scene.active_meshes().len(), 2);
}

// ============================================================================
// LOD
// ============================================================================

#[test]
fn test_far_camera_draws_lod_level() {
    let (mut scene, mock) = mock_scene();
    scene.add_camera(Camera::new("far", Vec3::new(0.0, 0.0, 30.0), Vec3::ZERO));
    let master = add_cube(&mut scene, "master", Vec3::ZERO);
    let level = add_cube(&mut scene, "level", Vec3::new(100.0, 0.0, 0.0));
    scene.add_lod_level(master, 20.0, Some(level)).unwrap();

    scene.render_with_delta(16.0).unwrap();

    assert_eq!(scene.active_meshes(), &[master]);
    assert_eq!(draw_calls(&mock).len(), 1);
    let render_id = scene.render_id();
    assert_eq!(scene.mesh(level).unwrap().sub_meshes()[0].render_id(), render_id);
    assert_eq!(scene.mesh(master).unwrap().sub_meshes()[0].render_id(), 0);
    assert_eq!(scene.mesh(level).unwrap().world_matrix(), scene.mesh(master).unwrap().world_matrix());
}

#[test]
fn test_near_camera_draws_master() {
    let (mut scene, mock) = mock_scene();
    add_camera(&mut scene);
    let master = add_cube(&mut scene, "master", Vec3::ZERO);
    let level = add_cube(&mut scene, "level", Vec3::ZERO);
    scene.add_lod_level(master, 20.0, Some(level)).unwrap();

    scene.render_with_delta(16.0).unwrap();
    assert_eq!(draw_calls(&mock).len(), 1);
    assert_eq!(scene.mesh(master).unwrap().sub_meshes()[0].render_id(), 1);
    assert_eq!(scene.mesh(level).unwrap().sub_meshes()[0].render_id(), 0);
}

#[test]
fn test_empty_lod_level_hides_mesh() {
    let (mut scene, mock) = mock_scene();
    scene.add_camera(Camera::new("far", Vec3::new(0.0, 0.0, 30.0), Vec3::ZERO));
    let master = add_cube(&mut scene, "master", Vec3::ZERO);
    scene.add_lod_level(master, 20.0, None).unwrap();

    scene.render_with_delta(16.0).unwrap();
    assert!(draw_calls(&mock).is_empty());
    assert!(scene.active_meshes().is_empty());
}
