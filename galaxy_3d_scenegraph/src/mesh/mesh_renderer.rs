/// Mesh renderer - draws one submesh of a mesh with its instance batch.
///
/// `render_submesh` is the render-queue entry point. `process_rendering`
/// issues the draw calls and is shared with the shadow map pass, which
/// binds its own effect.

use glam::{Mat4, Vec4};
use crate::engine_warn;
use crate::graphics_device::{
    DrawCall, EffectHandle, FillMode, GraphicsDevice, RasterState, UniformValue,
};
use crate::rendering::PassContext;
use super::instance_buffer::InstanceBuffer;
use super::mesh::MeshKind;
use super::sub_mesh::{SubMesh, SubMeshRef};

/// Base draw call of a submesh (one instance)
pub(crate) fn submesh_draw_call(sub_mesh: &SubMesh, indexed: bool, fill_mode: FillMode) -> DrawCall {
    let (start, count) = if indexed {
        (sub_mesh.index_start, sub_mesh.index_count)
    } else {
        (sub_mesh.vertex_start, sub_mesh.vertex_count)
    };
    DrawCall { fill_mode, indexed, start, count, instance_count: 1 }
}

/// Draw a submesh for the current pass.
///
/// * `enable_alpha_mode` - Apply the material's blend mode (transparent queue)
/// * `depth_only` - Depth pre-pass draw: the batch is not recorded and the
///   submesh is not marked as drawn
pub(crate) fn render_submesh(
    ctx: &mut PassContext<'_>,
    sub_ref: SubMeshRef,
    enable_alpha_mode: bool,
    depth_only: bool,
) {
    let render_id = ctx.state.render_id;
    let intermediate = ctx.state.intermediate;

    // ===== BATCH =====
    let Some(mesh) = ctx.meshes.get_mut(sub_ref.mesh) else { return };
    if mesh.is_active_intermediate {
        mesh.is_active_intermediate = false;
    } else {
        mesh.is_active = false;
    }
    let Some(sub_mesh) = mesh.sub_meshes().get(sub_ref.index) else { return };
    if !depth_only && sub_mesh.render_id == render_id {
        return;
    }

    let batch = if depth_only {
        mesh.peek_instances_render_list(sub_ref.index, render_id, intermediate)
    } else {
        mesh.get_instances_render_list(sub_ref.index, render_id, intermediate)
    };
    if batch.must_return {
        return;
    }

    let PassContext { device, meshes, materials, default_material, skeletons, state, stats, .. } = ctx;

    let instance_worlds: Vec<Mat4> = batch
        .instances
        .iter()
        .filter_map(|key| meshes.get(*key))
        .map(|instance| *instance.world_matrix())
        .collect();

    // ===== MATERIAL =====
    let Some(mesh) = meshes.get(sub_ref.mesh) else { return };
    let Some(sub_mesh) = mesh.sub_meshes().get(sub_ref.index) else { return };
    let Some(vertex_buffer) = mesh.vertex_buffer() else { return };
    let index_buffer = mesh.index_buffer();
    let hardware = state.caps.instanced_arrays && !instance_worlds.is_empty();

    let Some(material_key) = mesh.material_for(sub_mesh).or(*default_material) else { return };
    let Some(material) = materials.get_mut(material_key) else { return };
    let skeleton = mesh
        .skeleton
        .filter(|_| mesh.compute_bones_using_shaders)
        .and_then(|key| skeletons.get(key));

    if !material.is_ready_for_submesh(mesh, sub_mesh, skeleton, hardware, &mut **device) {
        return;
    }
    let Some(effect) = material.effect() else { return };

    if enable_alpha_mode {
        device.set_alpha_mode(material.alpha_mode());
    }
    device.set_state(RasterState {
        culling: material.back_face_culling(),
        cull_back_faces: true,
        reverse_side: mesh.is_world_mirrored(),
        z_offset: material.z_offset(),
    });

    // ===== BIND =====
    device.bind_buffers(vertex_buffer, index_buffer, effect);
    let world = *mesh.world_matrix();
    material.bind_for_submesh(&world, mesh, sub_mesh, skeleton, state, &mut **device);

    let mut fill_mode = material.fill_mode();
    if let MeshKind::Lines { color, alpha } = mesh.kind() {
        device.set_uniform(effect, "color", UniformValue::Vec4(Vec4::from((color, alpha))));
        fill_mode = FillMode::Lines;
    }
    let draw = submesh_draw_call(sub_mesh, index_buffer.is_some(), fill_mode);
    if draw.count == 0 {
        return;
    }

    // ===== DRAW =====
    let Some(mesh) = meshes.get_mut(sub_ref.mesh) else { return };
    let draws = process_rendering(
        &mut **device,
        &mut mesh.instance_data.buffer,
        &world,
        &instance_worlds,
        batch.render_self,
        hardware,
        draw,
        effect,
        &mut |instance_world, device| material.bind_only_world_matrix(instance_world, device),
    );
    stats.draw_calls += draws;

    if !depth_only {
        if let Some(sub_mesh) = mesh.sub_meshes_mut().get_mut(sub_ref.index) {
            sub_mesh.render_id = render_id;
        }
    }
}

/// Issue the draw calls of a submesh batch. Returns the number of calls.
///
/// With hardware instancing the mesh (when `render_self`) and its instances
/// go out in one call through the instance buffer. Otherwise each instance
/// is drawn separately after `bind_world` rebinds its world matrix.
#[allow(clippy::too_many_arguments)]
pub(crate) fn process_rendering(
    device: &mut dyn GraphicsDevice,
    instance_buffer: &mut InstanceBuffer,
    world: &Mat4,
    instance_worlds: &[Mat4],
    render_self: bool,
    hardware: bool,
    draw: DrawCall,
    effect: EffectHandle,
    bind_world: &mut dyn FnMut(&Mat4, &mut dyn GraphicsDevice),
) -> u64 {
    if hardware {
        let mut matrices = Vec::with_capacity(instance_worlds.len() + 1);
        if render_self {
            matrices.push(*world);
        }
        matrices.extend_from_slice(instance_worlds);

        match instance_buffer.upload(&matrices, device) {
            Ok(buffer) => {
                device.bind_instance_buffer(buffer, effect);
                submit(device, DrawCall { instance_count: matrices.len() as u32, ..draw });
                device.unbind_instance_attributes();
                return 1;
            }
            Err(e) => {
                engine_warn!("galaxy3d::MeshRenderer",
                    "Instance buffer upload failed, drawing instances one by one: {}", e);
            }
        }
    }

    let mut draws = 0;
    if render_self {
        submit(device, draw);
        draws += 1;
    }
    for instance_world in instance_worlds {
        bind_world(instance_world, &mut *device);
        submit(device, draw);
        draws += 1;
    }
    draws
}

fn submit(device: &mut dyn GraphicsDevice, call: DrawCall) {
    if call.fill_mode == FillMode::Points {
        device.draw_point_clouds(call.start, call.count, call.instance_count);
    } else {
        device.draw(call);
    }
}

#[cfg(test)]
#[path = "mesh_renderer_tests.rs"]
mod tests;
