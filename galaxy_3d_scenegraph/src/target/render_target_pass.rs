/// Render target pass - fills a target's rendering manager from its render
/// list and draws every face.
///
/// The shadow generator reuses `dispatch_render_list` for its casters and
/// runs its own face loop.

use glam::Vec4;
use crate::engine_trace;
use crate::graphics_device::ClearFlags;
use crate::mesh::{activate, resolve_lod, MeshKey, SubMeshRef};
use crate::rendering::{PassContext, RenderingManager};
use super::render_target_texture::RenderTargetTexture;

/// Activate the meshes of a render list for an intermediate pass and
/// dispatch their submeshes into `manager`.
///
/// `layer_mask` filters the meshes (used when the list is the camera's
/// active meshes). Returns false when a mesh was skipped because it is
/// not ready yet.
pub(crate) fn dispatch_render_list(
    ctx: &mut PassContext<'_>,
    list: &[MeshKey],
    manager: &mut RenderingManager,
    layer_mask: Option<u32>,
) -> bool {
    let render_id = ctx.state.render_id;
    let eye = ctx.state.eye_position;
    let mut all_ready = true;

    for &key in list {
        let Some(mesh) = ctx.meshes.get(key) else { continue };
        if mesh.is_blocked() {
            continue;
        }
        if !mesh.is_ready() {
            engine_trace!("galaxy3d::RenderTarget", "Mesh '{}' not ready, retrying next frame", mesh.name);
            all_ready = false;
            continue;
        }

        let visible = mesh.enabled
            && mesh.is_visible
            && mesh.visibility > 0.0
            && layer_mask.map_or(true, |mask| mesh.layer_mask & mask != 0);
        let is_instance = mesh.is_instance();
        let owner = mesh.source().unwrap_or(key);
        if let Some(owner_mesh) = ctx.meshes.get_mut(owner) {
            owner_mesh.pre_activate_for_intermediate_rendering(render_id);
        }
        if !visible {
            continue;
        }

        let Some(target) = resolve_lod(ctx.meshes, key, eye) else { continue };
        if target != key && !is_instance {
            let world = ctx.meshes.get(key).map(|m| *m.world_matrix());
            if let (Some(world), Some(lod)) = (world, ctx.meshes.get_mut(target)) {
                lod.set_world_matrix(world);
            }
        }
        let Some(dispatched) = activate(ctx.meshes, key, target, render_id, true) else { continue };

        let Some(mesh) = ctx.meshes.get(dispatched) else { continue };
        for (index, sub_mesh) in mesh.sub_meshes().iter().enumerate() {
            let material = mesh
                .material_for(sub_mesh)
                .or(ctx.default_material)
                .and_then(|material| ctx.materials.get(material))
                .map(|material| &**material);
            manager.dispatch(SubMeshRef::new(dispatched, index), mesh, material);
        }
    }
    all_ready
}

/// Render every face of a target.
///
/// The caller checks `should_render` first. Returns false when the target
/// texture could not be created.
///
/// * `active_meshes` - The camera's active meshes, used when the target has
///   no render list
/// * `layer_mask` - Camera layer mask applied to `active_meshes`
/// * `scene_clear_color` - Clear color when the target has none
///
/// Bumps `ctx.state.render_id` after every face of a cube target.
pub(crate) fn render_target_texture(
    ctx: &mut PassContext<'_>,
    target: &mut RenderTargetTexture,
    active_meshes: &[MeshKey],
    layer_mask: u32,
    scene_clear_color: Vec4,
) -> bool {
    let texture = match target.create(&mut *ctx.device) {
        Ok(texture) => texture,
        Err(e) => {
            crate::engine_warn!("galaxy3d::RenderTarget",
                "Render target '{}' has no texture: {}", target.name, e);
            return false;
        }
    };

    // ===== DISPATCH =====
    let mut manager = std::mem::take(&mut target.rendering_manager);
    manager.reset();
    let all_ready = match target.render_list.as_deref() {
        Some(list) => dispatch_render_list(ctx, list, &mut manager, None),
        None => dispatch_render_list(ctx, active_meshes, &mut manager, Some(layer_mask)),
    };
    if !all_ready {
        target.reset_refresh_counter();
    }

    if target.render_particles {
        for (index, system) in ctx.particles.iter().enumerate() {
            if system.is_started() && system.layer_mask() & layer_mask != 0 {
                manager.dispatch_particles(index, system.rendering_group_id());
            }
        }
    }
    if target.render_sprites {
        for (index, sprites) in ctx.sprites.iter().enumerate() {
            if sprites.layer_mask() & layer_mask != 0 {
                manager.dispatch_sprites(index, sprites.rendering_group_id());
            }
        }
    }

    // ===== FACES =====
    let clear_color = target.clear_color.unwrap_or(scene_clear_color);
    let is_cube = target.is_cube();
    for face in 0..target.face_count() {
        ctx.device.bind_framebuffer(texture, is_cube.then_some(face));
        target.on_before_render.notify(&face);
        ctx.device.clear(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL, clear_color);
        manager.render(ctx);
        target.on_after_render.notify(&face);
        ctx.device.unbind_framebuffer(texture);
        if is_cube {
            ctx.state.render_id += 1;
        }
    }
    target.on_after_unbind.notify(&());

    target.rendering_manager = manager;
    true
}

#[cfg(test)]
#[path = "render_target_pass_tests.rs"]
mod tests;
