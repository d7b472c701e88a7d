use std::sync::Arc;
use slotmap::SlotMap;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::mesh::Geometry;
use crate::scene::test_fixtures::cube_data;
use super::*;

fn source_mesh() -> Mesh {
    let mut device = MockGraphicsDevice::new();
    let geometry = Geometry::new("cube", cube_data(), &mut device).unwrap();
    let mut mesh = Mesh::new("source", Arc::new(geometry));
    mesh.add_sub_mesh(0, 0, 8, 0, 6).unwrap();
    mesh
}

fn instance_keys(count: usize) -> Vec<MeshKey> {
    let mut map: SlotMap<MeshKey, ()> = SlotMap::with_key();
    (0..count).map(|_| map.insert(())).collect()
}

/// Activate `mesh` for `render_id` and register `instances` as visible
fn activate_with(mesh: &mut Mesh, render_id: u64, instances: &[MeshKey]) {
    mesh.pre_activate(render_id);
    mesh.render_id = render_id;
    for instance in instances {
        mesh.register_instance_for_render_id(*instance, render_id);
    }
}

// ============================================================================
// BATCHES
// ============================================================================

#[test]
fn test_mesh_without_instances_draws_itself() {
    let mut mesh = source_mesh();
    let batch = mesh.get_instances_render_list(0, 1, false);
    assert_eq!(batch, InstancesBatch { must_return: false, render_self: true, instances: Vec::new() });
    assert!(!mesh.get_instances_render_list(0, 1, false).must_return);
}

#[test]
fn test_batch_is_resolved_once_per_render_id() {
    let mut mesh = source_mesh();
    let instances = instance_keys(2);
    activate_with(&mut mesh, 1, &instances);

    let first = mesh.get_instances_render_list(0, 1, false);
    assert!(!first.must_return);
    assert!(first.render_self);
    assert_eq!(first.instances, instances);

    let again = mesh.get_instances_render_list(0, 1, false);
    assert!(again.must_return);
    assert_eq!(again.instances, instances);

    // Each submesh resolves its own batch
    assert!(!mesh.get_instances_render_list(1, 1, false).must_return);
}

#[test]
fn test_peek_does_not_record_batch() {
    let mut mesh = source_mesh();
    let instances = instance_keys(1);
    activate_with(&mut mesh, 1, &instances);

    let peeked = mesh.peek_instances_render_list(0, 1, false);
    assert_eq!(peeked.instances, instances);
    assert!(!mesh.get_instances_render_list(0, 1, false).must_return);
    assert!(!mesh.peek_instances_render_list(0, 1, false).must_return);
}

#[test]
fn test_hidden_source_draws_only_instances() {
    let mut mesh = source_mesh();
    let instances = instance_keys(3);
    activate_with(&mut mesh, 1, &instances);
    mesh.is_visible = false;

    let batch = mesh.get_instances_render_list(0, 1, false);
    assert!(!batch.render_self);
    assert_eq!(batch.instances.len(), 3);
}

#[test]
fn test_only_for_instances_skips_self() {
    let mut mesh = source_mesh();
    mesh.only_for_instances = true;
    assert!(!mesh.get_instances_render_list(0, 1, false).render_self);
    assert!(mesh.get_instances_render_list(0, 1, true).render_self);
}

#[test]
fn test_source_outside_pass_is_not_drawn() {
    let mut mesh = source_mesh();
    mesh.render_id = 1;
    let instances = instance_keys(2);
    mesh.pre_activate(2);
    for instance in &instances {
        mesh.register_instance_for_render_id(*instance, 2);
    }

    let batch = mesh.get_instances_render_list(0, 2, false);
    assert!(!batch.render_self);
    assert_eq!(batch.instances, instances);
}

// ============================================================================
// DEFAULT RENDER IDS
// ============================================================================

#[test]
fn test_later_pass_falls_back_to_registration_render_id() {
    let mut mesh = source_mesh();
    let instances = instance_keys(2);
    activate_with(&mut mesh, 3, &instances);

    let batch = mesh.get_instances_render_list(0, 4, false);
    assert!(!batch.must_return);
    assert!(batch.render_self);
    assert_eq!(batch.instances, instances);
    assert!(mesh.get_instances_render_list(0, 4, false).must_return);
}

#[test]
fn test_cube_faces_fall_back_to_intermediate_render_id() {
    let mut mesh = source_mesh();
    let instances = instance_keys(2);
    activate_with(&mut mesh, 1, &instances);

    // Render target pass: registered under 5, drawn on faces 5 and 6
    mesh.pre_activate_for_intermediate_rendering(5);
    mesh.render_id = 5;
    for instance in &instances {
        mesh.register_instance_for_render_id(*instance, 5);
    }
    let face0 = mesh.get_instances_render_list(0, 5, true);
    let face1 = mesh.get_instances_render_list(0, 6, true);
    assert_eq!(face0.instances, instances);
    assert!(!face1.must_return);
    assert_eq!(face1.instances, instances);
}

#[test]
fn test_pre_activate_forgets_visible_instances() {
    let mut mesh = source_mesh();
    activate_with(&mut mesh, 1, &instance_keys(2));
    assert!(mesh.instance_data.has_visible_instances());

    mesh.pre_activate(1);
    assert!(mesh.instance_data.has_visible_instances());
    mesh.pre_activate(2);
    assert!(!mesh.instance_data.has_visible_instances());
    assert!(mesh.get_instances_render_list(0, 2, false).instances.is_empty());
}
