//! Integration tests for Scene rendering through the Engine
//!
//! These tests build scenes over a headless device registered with the
//! Engine and render full frames through the public API. No GPU required.
//!
//! Run with: cargo test --test scene_integration_tests


use device_test_utils::{cube_data, DeviceLog, HeadlessDevice};
use galaxy_3d_scenegraph::galaxy3d::camera::Camera;
use galaxy_3d_scenegraph::galaxy3d::material::BasicMaterial;
use galaxy_3d_scenegraph::galaxy3d::mesh::{Mesh, MeshKey};
use galaxy_3d_scenegraph::galaxy3d::scene::{Scene, SceneConfig};
use galaxy_3d_scenegraph::galaxy3d::target::RenderTargetTexture;
use galaxy_3d_scenegraph::galaxy3d::Engine;
use galaxy_3d_scenegraph::glam::Vec3;
use serial_test::serial;
use std::sync::{Arc, Mutex};

fn engine_scene() -> (Scene, Arc<Mutex<DeviceLog>>) {
    Engine::initialize().unwrap();
    Engine::shutdown();
    let (device, log) = HeadlessDevice::new();
    let device = Engine::create_graphics_device("main", device).unwrap();

    let mut scene = Scene::new(device, SceneConfig::default());
    let material = scene.add_material(BasicMaterial::new("default"));
    scene.set_default_material(Some(material));
    scene.add_camera(Camera::new("camera", Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO));
    (scene, log)
}

fn add_cube(scene: &mut Scene, name: &str, position: Vec3) -> MeshKey {
    let geometry = scene.create_geometry(name, cube_data()).unwrap();
    let mut mesh = Mesh::new(name, geometry);
    mesh.position = position;
    scene.add_mesh(mesh)
}

// ============================================================================
// FRAME TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_scene_renders_visible_meshes() {
    let (mut scene, log) = engine_scene();
    add_cube(&mut scene, "left", Vec3::new(-2.0, 0.0, 0.0));
    add_cube(&mut scene, "right", Vec3::new(2.0, 0.0, 0.0));
    add_cube(&mut scene, "behind", Vec3::new(0.0, 0.0, 50.0));

    scene.render_with_delta(16.0).unwrap();
    assert_eq!(log.lock().unwrap().draws.len(), 2);
    assert_eq!(scene.draw_calls().current(), 2);
    assert!(log.lock().unwrap().created_effects.contains(&"default".to_string()));

    scene.dispose().unwrap();
    assert!(scene.is_disposed());
    Engine::shutdown();
}

#[test]
#[serial]
fn test_integration_instances_share_one_draw() {
    let (mut scene, log) = engine_scene();
    let source = add_cube(&mut scene, "tree", Vec3::ZERO);
    let instance = scene.create_instance(source, "tree.1").unwrap();
    scene.mesh_mut(instance).unwrap().position = Vec3::new(3.0, 0.0, 0.0);

    scene.render_with_delta(16.0).unwrap();
    let draws = log.lock().unwrap().draws.clone();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instance_count, 2);

    scene.dispose().unwrap();
    Engine::shutdown();
}

#[test]
#[serial]
fn test_integration_cube_render_target_renders_every_face() {
    let (mut scene, log) = engine_scene();
    let cube = add_cube(&mut scene, "probe_subject", Vec3::ZERO);
    let mut probe = RenderTargetTexture::new("probe", 64, true);
    probe.render_list = Some(vec![cube]);
    let probe = scene.add_custom_render_target(probe);

    scene.render_with_delta(16.0).unwrap();
    let texture = scene.render_target(probe).unwrap().texture().unwrap();
    let faces: Vec<Option<u32>> = log.lock().unwrap().framebuffer_binds
        .iter()
        .filter(|(bound, _)| *bound == texture)
        .map(|(_, face)| *face)
        .collect();
    assert_eq!(faces, (0..6).map(Some).collect::<Vec<_>>());

    // Six faces plus the camera pass
    assert_eq!(log.lock().unwrap().draws.len(), 7);

    scene.remove_render_target(probe).unwrap();
    assert!(log.lock().unwrap().released_textures.contains(&texture));
    scene.dispose().unwrap();
    Engine::shutdown();
}
