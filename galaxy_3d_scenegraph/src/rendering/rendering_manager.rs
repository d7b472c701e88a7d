/// RenderingManager - dispatches submeshes into rendering groups and draws
/// the groups in order.
///
/// Groups render from 0 to `MAX_RENDERING_GROUPS - 1`. Before every group
/// but the first, depth and stencil are cleared when the group asks for it,
/// so higher groups draw on top of lower ones.

use glam::Vec4;
use crate::engine_warn;
use crate::graphics_device::ClearFlags;
use crate::material::Material;
use crate::mesh::{Mesh, SubMeshRef};
use super::pass_context::PassContext;
use super::rendering_group::{CustomRenderFunction, RenderingGroup};

pub const MAX_RENDERING_GROUPS: usize = 4;

/// Group id used when a mesh asks for one out of range
const FALLBACK_GROUP: usize = 0;

pub struct RenderingManager {
    groups: Vec<RenderingGroup>,
    auto_clear_depth_stencil: [bool; MAX_RENDERING_GROUPS],
}

impl RenderingManager {
    pub fn new() -> Self {
        Self {
            groups: (0..MAX_RENDERING_GROUPS).map(RenderingGroup::new).collect(),
            auto_clear_depth_stencil: [true; MAX_RENDERING_GROUPS],
        }
    }

    /// Empty every group's queues
    pub fn reset(&mut self) {
        for group in &mut self.groups {
            group.prepare();
        }
    }

    pub fn group(&self, index: usize) -> Option<&RenderingGroup> {
        self.groups.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(RenderingGroup::is_empty)
    }

    /// Clear depth and stencil before `group` renders (ignored for group 0)
    pub fn set_auto_clear_depth_stencil(&mut self, group: usize, auto_clear: bool) {
        if let Some(flag) = self.auto_clear_depth_stencil.get_mut(group) {
            *flag = auto_clear;
        }
    }

    pub fn set_custom_render_function(&mut self, group: usize, function: Option<CustomRenderFunction>) {
        if let Some(group) = self.groups.get_mut(group) {
            group.set_custom_render_function(function);
        }
    }

    fn group_index(group: usize) -> usize {
        if group < MAX_RENDERING_GROUPS {
            group
        } else {
            engine_warn!("galaxy3d::RenderingManager",
                "Rendering group {} out of range, using group {}", group, FALLBACK_GROUP);
            FALLBACK_GROUP
        }
    }

    pub fn dispatch(&mut self, sub_ref: SubMeshRef, mesh: &Mesh, material: Option<&dyn Material>) {
        let index = Self::group_index(mesh.rendering_group_id);
        self.groups[index].dispatch(sub_ref, mesh, material);
    }

    pub fn dispatch_particles(&mut self, index: usize, group: usize) {
        let group = Self::group_index(group);
        self.groups[group].dispatch_particles(index);
    }

    pub fn dispatch_sprites(&mut self, index: usize, group: usize) {
        let group = Self::group_index(group);
        self.groups[group].dispatch_sprites(index);
    }

    /// Render every non-empty group in order
    pub fn render(&mut self, ctx: &mut PassContext<'_>) {
        for (index, group) in self.groups.iter_mut().enumerate() {
            if group.is_empty() {
                continue;
            }
            if index > 0 && self.auto_clear_depth_stencil[index] {
                ctx.device.clear(ClearFlags::DEPTH | ClearFlags::STENCIL, Vec4::ZERO);
            }
            group.render(ctx);
        }
    }
}

impl Default for RenderingManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "rendering_manager_tests.rs"]
mod tests;
