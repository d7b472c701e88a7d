/// Activation - marks a mesh (or instance) as drawn in a pass and decides
/// which mesh's submeshes get dispatched into the render queues.
///
/// Shared by the camera pass and by intermediate passes (render targets,
/// shadow maps). An instance never dispatches itself: it registers with the
/// mesh selected for its source and dispatches that mesh once per pass.

use glam::Vec3;
use slotmap::SlotMap;
use super::mesh::{Mesh, MeshKey};

/// Mesh to draw for `key` seen from `eye`.
///
/// Instances use their source's LOD levels with their own bounding sphere.
/// `None` means an empty LOD level hides the mesh at this distance.
pub(crate) fn resolve_lod(meshes: &SlotMap<MeshKey, Mesh>, key: MeshKey, eye: Vec3) -> Option<MeshKey> {
    let mesh = meshes.get(key)?;
    let distance = mesh.bounding_info().bounding_sphere.center_world.distance(eye);
    match mesh.source() {
        Some(source) => meshes.get(source)?.select_lod(source, distance),
        None => mesh.select_lod(key, distance),
    }
}

/// Activate `key` for the pass `render_id`.
///
/// `target` is the mesh returned by `resolve_lod`. Returns the mesh whose
/// submeshes must be dispatched, or `None` when it was already dispatched
/// in this pass.
pub(crate) fn activate(
    meshes: &mut SlotMap<MeshKey, Mesh>,
    key: MeshKey,
    target: MeshKey,
    render_id: u64,
    intermediate: bool,
) -> Option<MeshKey> {
    let mesh = meshes.get_mut(key)?;
    mesh.render_id = render_id;
    let is_instance = mesh.is_instance();

    let target_mesh = meshes.get_mut(target)?;
    if is_instance {
        target_mesh.register_instance_for_render_id(key, render_id);
        if target_mesh.dispatch_id == render_id {
            return None;
        }
        if intermediate {
            target_mesh.is_active_intermediate = true;
            target_mesh.only_for_instances_intermediate = true;
        } else {
            target_mesh.is_active = true;
            target_mesh.only_for_instances = true;
        }
    } else {
        target_mesh.render_id = render_id;
        if intermediate {
            target_mesh.is_active_intermediate = true;
            target_mesh.only_for_instances_intermediate = false;
        } else {
            target_mesh.is_active = true;
            target_mesh.only_for_instances = false;
        }
        if target_mesh.dispatch_id == render_id {
            return None;
        }
    }

    target_mesh.dispatch_id = render_id;
    Some(target)
}
