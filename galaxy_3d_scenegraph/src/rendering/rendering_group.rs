/// RenderingGroup - the draw queues of one rendering group.
///
/// Dispatched submeshes are classified by their material:
/// - alpha blended: `transparent`
/// - alpha tested: `alpha_test`
/// - everything else: `opaque`
///
/// Opaque and alpha-tested submeshes whose material asks for a depth
/// pre-pass are also queued in `depth_only`.
///
/// Default draw order: depth-only (color write off), opaque, alpha-test,
/// sprites, particles, then transparent sorted by ascending alpha index and
/// back to front.

use rdst::{RadixKey, RadixSort};
use crate::graphics_device::AlphaMode;
use crate::material::Material;
use crate::mesh::{render_submesh, Mesh, SubMeshRef};
use super::pass_context::PassContext;

/// Replaces the default draw order of a group
pub type CustomRenderFunction = Box<dyn FnMut(&RenderQueues, &mut PassContext<'_>) + Send>;

/// Queues handed to a custom render function
#[derive(Debug, Clone, Default)]
pub struct RenderQueues {
    pub opaque: Vec<SubMeshRef>,
    pub alpha_test: Vec<SubMeshRef>,
    pub transparent: Vec<SubMeshRef>,
    pub depth_only: Vec<SubMeshRef>,
}

impl RenderQueues {
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty()
            && self.alpha_test.is_empty()
            && self.transparent.is_empty()
            && self.depth_only.is_empty()
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.alpha_test.clear();
        self.transparent.clear();
        self.depth_only.clear();
    }
}

/// Draw every submesh of a queue in order
pub fn render_submeshes(ctx: &mut PassContext<'_>, queue: &[SubMeshRef], enable_alpha_mode: bool) {
    for sub_ref in queue {
        render_submesh(ctx, *sub_ref, enable_alpha_mode, false);
    }
}

/// Draw a queue with color writes off (depth pre-pass)
pub fn render_depth_only(ctx: &mut PassContext<'_>, queue: &[SubMeshRef]) {
    if queue.is_empty() {
        return;
    }
    ctx.device.set_color_write(false);
    for sub_ref in queue {
        render_submesh(ctx, *sub_ref, false, true);
    }
    ctx.device.set_color_write(true);
}

pub struct RenderingGroup {
    index: usize,
    queues: RenderQueues,
    particles: Vec<usize>,
    sprites: Vec<usize>,
    custom_render: Option<CustomRenderFunction>,
}

impl RenderingGroup {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            queues: RenderQueues::default(),
            particles: Vec::new(),
            sprites: Vec::new(),
            custom_render: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn queues(&self) -> &RenderQueues {
        &self.queues
    }

    pub fn set_custom_render_function(&mut self, function: Option<CustomRenderFunction>) {
        self.custom_render = function;
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty() && self.particles.is_empty() && self.sprites.is_empty()
    }

    pub fn prepare(&mut self) {
        self.queues.clear();
        self.particles.clear();
        self.sprites.clear();
    }

    /// Queue a submesh according to its material
    pub fn dispatch(&mut self, sub_ref: SubMeshRef, mesh: &Mesh, material: Option<&dyn Material>) {
        let Some(material) = material else {
            self.queues.opaque.push(sub_ref);
            return;
        };

        if material.need_alpha_blending_for_mesh(mesh) {
            self.queues.transparent.push(sub_ref);
        } else if material.need_alpha_testing() {
            if material.need_depth_pre_pass() {
                self.queues.depth_only.push(sub_ref);
            }
            self.queues.alpha_test.push(sub_ref);
        } else {
            if material.need_depth_pre_pass() {
                self.queues.depth_only.push(sub_ref);
            }
            self.queues.opaque.push(sub_ref);
        }
    }

    pub fn dispatch_particles(&mut self, index: usize) {
        self.particles.push(index);
    }

    pub fn dispatch_sprites(&mut self, index: usize) {
        self.sprites.push(index);
    }

    pub fn render(&mut self, ctx: &mut PassContext<'_>) {
        if let Some(custom) = self.custom_render.as_mut() {
            custom(&self.queues, ctx);
            return;
        }

        render_depth_only(ctx, &self.queues.depth_only);
        render_submeshes(ctx, &self.queues.opaque, false);
        render_submeshes(ctx, &self.queues.alpha_test, false);

        for &index in &self.sprites {
            if let Some(sprites) = ctx.sprites.get_mut(index) {
                ctx.stats.draw_calls += sprites.render(&mut *ctx.device, &ctx.state);
            }
        }
        for &index in &self.particles {
            if let Some(system) = ctx.particles.get_mut(index) {
                ctx.stats.draw_calls += system.render(&mut *ctx.device, &ctx.state);
            }
        }

        if !self.queues.transparent.is_empty() {
            let sorted = sort_transparent(ctx, &self.queues.transparent);
            render_transparent(ctx, &sorted);
        }
    }
}

/// Transparent submeshes: depth pre-pass ones first with color write off,
/// then everything with the material's blend mode.
fn render_transparent(ctx: &mut PassContext<'_>, sorted: &[SubMeshRef]) {
    let pre_pass: Vec<SubMeshRef> = sorted
        .iter()
        .copied()
        .filter(|sub_ref| needs_depth_pre_pass(ctx, *sub_ref))
        .collect();
    render_depth_only(ctx, &pre_pass);

    render_submeshes(ctx, sorted, true);
    ctx.device.set_alpha_mode(AlphaMode::Disabled);
}

fn needs_depth_pre_pass(ctx: &PassContext<'_>, sub_ref: SubMeshRef) -> bool {
    let Some(mesh) = ctx.meshes.get(sub_ref.mesh) else { return false };
    let Some(sub_mesh) = mesh.sub_meshes().get(sub_ref.index) else { return false };
    mesh.material_for(sub_mesh)
        .or(ctx.default_material)
        .and_then(|key| ctx.materials.get(key))
        .map_or(false, |material| material.need_depth_pre_pass())
}

// ============================================================================
// Transparent sort
// ============================================================================

/// Radix key: alpha index ascending, then distance descending, then
/// dispatch order
#[derive(Debug, Clone, Copy)]
struct TransparentSortKey {
    alpha_index: u32,
    inverted_distance: u32,
    sequence: u32,
}

impl RadixKey for TransparentSortKey {
    const LEVELS: usize = 12;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        let (word, byte) = match level {
            0..=3 => (self.sequence, level),
            4..=7 => (self.inverted_distance, level - 4),
            _ => (self.alpha_index, level - 8),
        };
        (word >> (byte * 8)) as u8
    }
}

/// Map an f32 to a u32 with the same ordering
fn sortable_f32(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 { !bits } else { bits | 0x8000_0000 }
}

pub(crate) fn sort_transparent(ctx: &PassContext<'_>, queue: &[SubMeshRef]) -> Vec<SubMeshRef> {
    let eye = ctx.state.eye_position;
    let mut keys: Vec<TransparentSortKey> = queue
        .iter()
        .enumerate()
        .map(|(sequence, sub_ref)| {
            let (alpha_index, distance) = ctx
                .meshes
                .get(sub_ref.mesh)
                .and_then(|mesh| {
                    let sub_mesh = mesh.sub_meshes().get(sub_ref.index)?;
                    let center = sub_mesh.bounding_info().bounding_sphere.center_world;
                    Some((mesh.alpha_index, center.distance(eye)))
                })
                .unwrap_or((f32::MAX, 0.0));
            TransparentSortKey {
                alpha_index: sortable_f32(alpha_index),
                inverted_distance: !sortable_f32(distance),
                sequence: sequence as u32,
            }
        })
        .collect();

    keys.radix_sort_unstable();
    keys.iter().map(|key| queue[key.sequence as usize]).collect()
}

#[cfg(test)]
#[path = "rendering_group_tests.rs"]
mod tests;
