/// Shared fixtures of the scene test files

use std::sync::{Arc, Mutex};
use glam::{Vec2, Vec3};
use crate::camera::{Camera, CameraKey};
use crate::config::SceneConfig;
use crate::graphics_device::mock_graphics_device::{DeviceCommand, MockGraphicsDevice};
use crate::graphics_device::{DrawCall, GraphicsDevice};
use crate::material::BasicMaterial;
use crate::mesh::{Mesh, MeshKey, VertexData};
use super::Scene;

/// Axis-aligned cube of half size 1 around the origin (8 vertices, 12 triangles)
pub(crate) fn cube_data() -> VertexData {
    let positions: Vec<Vec3> = (0..8)
        .map(|i| Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        ))
        .collect();
    let normals = positions.iter().map(|p| p.normalize()).collect();
    let uvs = vec![Vec2::ZERO; 8];
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    VertexData { positions, normals, uvs, indices, ..VertexData::default() }
}

/// Scene over a mock device, with a `BasicMaterial` as default material
pub(crate) fn mock_scene() -> (Scene, Arc<Mutex<MockGraphicsDevice>>) {
    mock_scene_with(SceneConfig::default(), MockGraphicsDevice::new())
}

pub(crate) fn mock_scene_with(
    config: SceneConfig,
    device: MockGraphicsDevice,
) -> (Scene, Arc<Mutex<MockGraphicsDevice>>) {
    let mock = Arc::new(Mutex::new(device));
    let device: Arc<Mutex<dyn GraphicsDevice>> = mock.clone();
    let mut scene = Scene::new(device, config);
    let material = scene.add_material(BasicMaterial::new("default"));
    scene.set_default_material(Some(material));
    (scene, mock)
}

/// Cube mesh at `position`
pub(crate) fn add_cube(scene: &mut Scene, name: &str, position: Vec3) -> MeshKey {
    let geometry = scene.create_geometry(name, cube_data()).unwrap();
    let mut mesh = Mesh::new(name, geometry);
    mesh.position = position;
    mesh.compute_world_matrix(None);
    scene.add_mesh(mesh)
}

/// Camera on +Z looking at the origin
pub(crate) fn add_camera(scene: &mut Scene) -> CameraKey {
    scene.add_camera(Camera::new("camera", Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO))
}

pub(crate) fn draw_calls(mock: &Arc<Mutex<MockGraphicsDevice>>) -> Vec<DrawCall> {
    mock.lock().unwrap().draw_calls()
}

pub(crate) fn commands(mock: &Arc<Mutex<MockGraphicsDevice>>) -> Vec<DeviceCommand> {
    mock.lock().unwrap().commands.clone()
}

pub(crate) fn clear_commands(mock: &Arc<Mutex<MockGraphicsDevice>>) {
    mock.lock().unwrap().clear_commands();
}
