use std::sync::Arc;
use glam::{Vec3, Vec4};
use slotmap::SlotMap;
use crate::graphics_device::mock_graphics_device::{DeviceCommand, MockGraphicsDevice};
use crate::graphics_device::{ClearFlags, UniformValue};
use crate::mesh::{Geometry, Mesh, MeshKey, SubMeshRef};
use crate::scene::test_fixtures::{add_camera, add_cube, commands, cube_data, mock_scene};
use super::*;

fn depth_stencil_clear() -> DeviceCommand {
    DeviceCommand::Clear { flags: ClearFlags::DEPTH | ClearFlags::STENCIL, color: Vec4::ZERO }
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_dispatch_follows_mesh_group() {
    let mut device = MockGraphicsDevice::new();
    let geometry = Arc::new(Geometry::new("cube", cube_data(), &mut device).unwrap());
    let mut keys: SlotMap<MeshKey, ()> = SlotMap::with_key();
    let mut manager = RenderingManager::new();
    assert!(manager.is_empty());

    let mut overlay = Mesh::new("overlay", Arc::clone(&geometry));
    overlay.rendering_group_id = 2;
    let overlay_ref = SubMeshRef::new(keys.insert(()), 0);
    manager.dispatch(overlay_ref, &overlay, None);

    let mut stray = Mesh::new("stray", geometry);
    stray.rendering_group_id = MAX_RENDERING_GROUPS + 3;
    let stray_ref = SubMeshRef::new(keys.insert(()), 0);
    manager.dispatch(stray_ref, &stray, None);

    assert_eq!(manager.group(2).unwrap().queues().opaque, vec![overlay_ref]);
    assert_eq!(manager.group(0).unwrap().queues().opaque, vec![stray_ref]);
    assert!(manager.group(MAX_RENDERING_GROUPS).is_none());

    manager.dispatch_particles(0, 1);
    manager.dispatch_sprites(0, 7);
    assert!(!manager.group(1).unwrap().is_empty());

    manager.reset();
    assert!(manager.is_empty());
}

// ============================================================================
// RENDER
// ============================================================================

#[test]
fn test_groups_render_in_order() {
    let (mut scene, mock) = mock_scene();
    add_camera(&mut scene);
    let top = add_cube(&mut scene, "top", Vec3::new(1.0, 0.0, 0.0));
    add_cube(&mut scene, "bottom", Vec3::new(-1.0, 0.0, 0.0));
    scene.mesh_mut(top).unwrap().rendering_group_id = 1;

    scene.render_with_delta(16.0).unwrap();
    let commands = commands(&mock);
    let worlds: Vec<(usize, f32)> = commands
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            DeviceCommand::SetUniform { name, value: UniformValue::Mat4(world), .. } if name == "world" => {
                Some((i, world.w_axis.x))
            }
            _ => None,
        })
        .collect();
    assert_eq!(worlds.iter().map(|(_, x)| *x).collect::<Vec<_>>(), vec![-1.0, 1.0]);

    let clear = commands.iter().position(|c| *c == depth_stencil_clear()).unwrap();
    assert!(worlds[0].0 < clear && clear < worlds[1].0);
}

#[test]
fn test_first_group_never_clears() {
    let (mut scene, mock) = mock_scene();
    add_camera(&mut scene);
    add_cube(&mut scene, "cube", Vec3::ZERO);

    scene.render_with_delta(16.0).unwrap();
    assert!(!commands(&mock).contains(&depth_stencil_clear()));
}

#[test]
fn test_auto_clear_can_be_disabled_per_group() {
    let (mut scene, mock) = mock_scene();
    add_camera(&mut scene);
    let cube = add_cube(&mut scene, "cube", Vec3::ZERO);
    scene.mesh_mut(cube).unwrap().rendering_group_id = 3;
    scene.rendering_manager_mut().set_auto_clear_depth_stencil(3, false);
    scene.rendering_manager_mut().set_auto_clear_depth_stencil(9, false);

    scene.render_with_delta(16.0).unwrap();
    assert!(!commands(&mock).contains(&depth_stencil_clear()));
}
