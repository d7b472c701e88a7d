/// ShadowGenerator - renders the shadow casters of a light into a shadow map.
///
/// A generator owns its shadow map (a `RenderTargetTexture` whose render
/// list holds the casters), an optional second map and post-process chain
/// for blurred filters, and the light-space transform of the current pass.
///
/// Per frame:
/// 1. the casters are activated and dispatched into the map's rendering manager
/// 2. each face binds the map, computes the light transform and clears
/// 3. `render_for_shadow_map` draws depth-only, opaque, alpha-tested and
///    (optionally) transparent submeshes with the shadow effect
/// 4. blurred filters run the blur chain into the map used for sampling
///
/// The light transform is memoized per `(render_id, face)`. Filter, blur
/// and size changes are applied lazily at the start of the next pass.

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::culling::Aabb;
use crate::error::{Error, Result};
use crate::graphics_device::{
    DeviceCaps, EffectDesc, EffectHandle, FillMode, GraphicsDevice, RasterState, SamplingMode,
    TextureHandle, TextureType, UniformValue,
};
use crate::lights::{Light, LightKey, LightKind};
use crate::material::Material;
use crate::mesh::{process_rendering, submesh_draw_call, Mesh, MeshKey, MeshKind, Skeleton, SubMeshRef};
use crate::postprocess::{PostProcess, PostProcessManager};
use crate::rendering::{PassContext, RenderQueues};
use crate::target::{dispatch_render_list, RenderTargetTexture};
use crate::{engine_debug, engine_trace, engine_warn};
use super::shadow_filter::{shadow_texture_type, ShadowFilter};

slotmap::new_key_type! {
    /// Stable key for a shadow generator stored in the scene
    pub struct ShadowGeneratorKey;
}

/// Shader of the generic shadow effect
const SHADOW_MAP_SHADER: &str = "shadowMap";

const SHADOW_MAP_UNIFORMS: &[&str] = &[
    "world", "mBones", "viewProjection", "diffuseMatrix", "lightData", "depthValues",
    "biasAndScale", "softTransparentShadowSM",
];
const SHADOW_MAP_SAMPLERS: &[&str] = &["diffuseSampler"];

/// Perturbation applied to a light direction parallel to the up axis
const UP_COLLINEAR_EPSILON: f32 = 1e-13;

pub const DEFAULT_BIAS: f32 = 0.000_05;
pub const DEFAULT_BLUR_BOX_OFFSET: f32 = 1.0;
pub const DEFAULT_BLUR_SCALE: f32 = 2.0;
pub const DEFAULT_BLUR_KERNEL: f32 = 1.0;

// ============================================================================
// Shadow binding
// ============================================================================

/// What a material samples to receive the shadows of one light
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowBinding {
    /// Index of the light in the scene's light order
    pub light_index: usize,
    /// Light view-projection the map was rendered with
    pub transform: Mat4,
    pub texture: TextureHandle,
    /// (darkness, texel scale, depth scale, 0)
    pub shadows_info: Vec4,
    /// (near, near + far)
    pub depth_values: Vec2,
}

impl ShadowBinding {
    /// Bind `lightMatrix{i}`, `shadowSampler{i}`, `shadowsInfo{i}` and
    /// `depthValues{i}` on an effect
    pub fn bind(&self, effect: EffectHandle, device: &mut dyn GraphicsDevice) {
        let i = self.light_index;
        device.set_uniform(effect, &format!("lightMatrix{}", i), UniformValue::Mat4(self.transform));
        device.set_texture(effect, &format!("shadowSampler{}", i), self.texture);
        device.set_uniform(effect, &format!("shadowsInfo{}", i), UniformValue::Vec4(self.shadows_info));
        device.set_uniform(effect, &format!("depthValues{}", i), UniformValue::Vec2(self.depth_values));
    }
}

/// Light transform of one `(render_id, face)` pair
#[derive(Debug, Clone, Copy)]
struct TransformCache {
    render_id: u64,
    face: u32,
    position: Vec3,
    direction: Vec3,
    view: Mat4,
    projection: Mat4,
    transform: Mat4,
}

// ============================================================================
// Shadow generator
// ============================================================================

pub struct ShadowGenerator {
    light: LightKey,
    light_name: String,
    map_size: u32,
    texture_type: TextureType,
    is_cube: bool,
    depth_texture_supported: bool,
    /// Filter as set by the user (before downgrade)
    requested_filter: ShadowFilter,

    // ===== OPTIONS =====
    pub bias: f32,
    pub normal_bias: f32,
    /// Draw transparent casters into the map
    pub transparency_shadow: bool,
    /// Fade transparent casters' shadows by their alpha
    pub enable_soft_transparent_shadow: bool,
    darkness: f32,
    depth_scale: Option<f32>,
    blur_box_offset: f32,
    blur_scale: f32,
    blur_kernel: f32,
    use_kernel_blur: bool,

    // ===== RESOURCES =====
    shadow_map: RenderTargetTexture,
    /// Blur output, sampled instead of `shadow_map`
    shadow_map2: Option<RenderTargetTexture>,
    blur_post_processes: Vec<PostProcess>,
    effects: FxHashMap<String, EffectHandle>,
    current_effect: Option<EffectHandle>,

    // ===== PENDING CHANGES =====
    blur_dirty: bool,
    sampling_dirty: bool,
    needs_recreate: bool,

    // ===== PASS STATE =====
    cache: Option<TransformCache>,
    recompute_count: u64,
    current_face: u32,
    disposed: bool,
}

impl ShadowGenerator {
    /// Create a generator for a light.
    ///
    /// # Arguments
    ///
    /// * `map_size` - Width and height of the shadow map
    /// * `use_full_float` - Prefer 32-bit float texels when renderable
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when the light cannot cast shadows.
    pub fn new(
        map_size: u32,
        light_key: LightKey,
        light: &Light,
        caps: &DeviceCaps,
        use_full_float: bool,
    ) -> Result<Self> {
        if !light.can_cast_shadows() {
            engine_warn!("galaxy3d::ShadowGenerator",
                "Light '{}' cannot cast shadows, no shadow generator created", light.name);
            return Err(Error::InvalidOperation(format!(
                "light '{}' cannot cast shadows", light.name
            )));
        }

        let mut generator = Self {
            light: light_key,
            light_name: light.name.clone(),
            map_size,
            texture_type: shadow_texture_type(caps, use_full_float),
            is_cube: light.need_cube(),
            depth_texture_supported: caps.depth_texture,
            requested_filter: ShadowFilter::None,
            bias: DEFAULT_BIAS,
            normal_bias: 0.0,
            transparency_shadow: false,
            enable_soft_transparent_shadow: false,
            darkness: 0.0,
            depth_scale: None,
            blur_box_offset: DEFAULT_BLUR_BOX_OFFSET,
            blur_scale: DEFAULT_BLUR_SCALE,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            use_kernel_blur: false,
            shadow_map: RenderTargetTexture::new("shadowMap", map_size, false),
            shadow_map2: None,
            blur_post_processes: Vec::new(),
            effects: FxHashMap::default(),
            current_effect: None,
            blur_dirty: false,
            sampling_dirty: false,
            needs_recreate: false,
            cache: None,
            recompute_count: 0,
            current_face: 0,
            disposed: false,
        };
        generator.shadow_map = generator.build_shadow_map(Vec::new());
        Ok(generator)
    }

    fn build_shadow_map(&self, render_list: Vec<MeshKey>) -> RenderTargetTexture {
        let mut map = RenderTargetTexture::new(&format!("{}_shadowMap", self.light_name), self.map_size, self.is_cube)
            .with_texture_type(self.texture_type)
            .with_sampling_mode(self.filter().sampling_mode())
            .with_depth_stencil_texture(self.depth_texture_supported);
        map.render_list = Some(render_list);
        map.render_particles = false;
        map.render_sprites = false;
        map
    }

    // ===== ACCESSORS =====

    pub fn light(&self) -> LightKey {
        self.light
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    /// Filter in use (the requested one, downgraded for the light and device)
    pub fn filter(&self) -> ShadowFilter {
        self.requested_filter.downgrade(self.is_cube, self.depth_texture_supported)
    }

    pub fn set_filter(&mut self, filter: ShadowFilter) {
        let previous = self.filter();
        self.requested_filter = filter;
        if self.filter() != previous {
            self.blur_dirty = true;
            self.sampling_dirty = true;
        }
    }

    pub fn darkness(&self) -> f32 {
        self.darkness
    }

    /// Clamped to [0, 1]
    pub fn set_darkness(&mut self, darkness: f32) {
        self.darkness = darkness.clamp(0.0, 1.0);
    }

    /// Depth scale of the shadow shaders (the light's unless overridden)
    pub fn depth_scale(&self, light: &Light) -> f32 {
        self.depth_scale.unwrap_or(light.depth_scale)
    }

    pub fn set_depth_scale(&mut self, depth_scale: Option<f32>) {
        self.depth_scale = depth_scale;
    }

    pub fn blur_box_offset(&self) -> f32 {
        self.blur_box_offset
    }

    pub fn set_blur_box_offset(&mut self, offset: f32) {
        if self.blur_box_offset != offset {
            self.blur_box_offset = offset;
            self.blur_dirty = true;
        }
    }

    pub fn blur_scale(&self) -> f32 {
        self.blur_scale
    }

    pub fn set_blur_scale(&mut self, scale: f32) {
        if self.blur_scale != scale {
            self.blur_scale = scale.max(1.0);
            self.blur_dirty = true;
        }
    }

    pub fn blur_kernel(&self) -> f32 {
        self.blur_kernel
    }

    pub fn set_blur_kernel(&mut self, kernel: f32) {
        if self.blur_kernel != kernel {
            self.blur_kernel = kernel.max(1.0);
            self.blur_dirty = true;
        }
    }

    pub fn use_kernel_blur(&self) -> bool {
        self.use_kernel_blur
    }

    pub fn set_use_kernel_blur(&mut self, use_kernel_blur: bool) {
        if self.use_kernel_blur != use_kernel_blur {
            self.use_kernel_blur = use_kernel_blur;
            self.blur_dirty = true;
        }
    }

    /// The map is recreated at the new size on the next pass
    pub fn set_map_size(&mut self, map_size: u32) {
        if self.map_size != map_size {
            self.map_size = map_size;
            self.needs_recreate = true;
        }
    }

    pub fn shadow_map(&self) -> &RenderTargetTexture {
        &self.shadow_map
    }

    pub fn shadow_map_mut(&mut self) -> &mut RenderTargetTexture {
        &mut self.shadow_map
    }

    /// Map sampled by receivers: the blur output when there is one
    pub fn shadow_map_for_rendering(&self) -> &RenderTargetTexture {
        self.shadow_map2.as_ref().unwrap_or(&self.shadow_map)
    }

    pub fn blur_post_processes(&self) -> &[PostProcess] {
        &self.blur_post_processes
    }

    /// Face of the current (or last) pass
    pub fn current_face(&self) -> u32 {
        self.current_face
    }

    /// Number of times the light view and projection were computed
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ===== CASTERS =====

    pub fn render_list(&self) -> &[MeshKey] {
        self.shadow_map.render_list.as_deref().unwrap_or(&[])
    }

    pub fn add_shadow_caster(&mut self, mesh: MeshKey) {
        self.shadow_map.add_to_render_list(mesh);
    }

    pub fn remove_shadow_caster(&mut self, mesh: MeshKey) -> bool {
        self.shadow_map.remove_from_render_list(mesh)
    }

    // ========================================================================
    // Transform
    // ========================================================================

    /// Light view-projection for a face of the pass `render_id`.
    ///
    /// Memoized per `(render_id, face)`. The view and projection are
    /// recomputed only when the light moved, turned, or asks for it.
    pub fn get_transform_matrix(
        &mut self,
        light: &mut Light,
        casters: &[Aabb],
        camera: &Camera,
        render_id: u64,
        face: u32,
    ) -> Mat4 {
        if let Some(cache) = self.cache {
            if cache.render_id == render_id && cache.face == face {
                return cache.transform;
            }
        }

        let position = light.transformed_position();
        let mut direction = light.shadow_direction(face).normalize_or_zero();
        if direction == Vec3::ZERO {
            direction = Vec3::NEG_Y;
        }
        if direction.dot(Vec3::Y).abs() >= 1.0 {
            direction.z = UP_COLLINEAR_EPSILON;
        }

        let reuse = self.cache.filter(|cache| {
            !light.need_projection_matrix_compute()
                && cache.position == position
                && cache.direction == direction
        });
        let (view, projection) = match reuse {
            Some(cache) => (cache.view, cache.projection),
            None => {
                let view = Mat4::look_to_rh(position, direction, Vec3::Y);
                let projection = light.set_shadow_projection_matrix(&view, casters, camera);
                self.recompute_count += 1;
                (view, projection)
            }
        };

        let transform = projection * view;
        self.cache = Some(TransformCache { render_id, face, position, direction, view, projection, transform });
        transform
    }

    /// Transform of the last computed pass
    pub fn transform_matrix(&self) -> Mat4 {
        self.cache.map_or(Mat4::IDENTITY, |cache| cache.transform)
    }

    /// Light position or direction bound as `lightData`
    fn light_data(&self, light: &Light) -> Vec3 {
        let (position, direction) = self
            .cache
            .map_or((light.transformed_position(), light.direction), |c| (c.position, c.direction));
        if matches!(light.kind(), LightKind::Directional) { direction } else { position }
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Defines of the shadow effect variant for a draw
    #[allow(clippy::too_many_arguments)]
    pub fn prepare_defines(
        &self,
        mesh: &Mesh,
        material: &dyn Material,
        skeleton: Option<&Skeleton>,
        light: &Light,
        use_instances: bool,
        is_transparent: bool,
    ) -> Vec<String> {
        let mut defines = Vec::new();
        let filter = self.filter();

        if self.texture_type != TextureType::UnsignedByte {
            defines.push("#define FLOAT".to_string());
        }
        if filter.is_exponential() {
            defines.push("#define ESM".to_string());
        } else if filter.uses_depth_texture() {
            defines.push("#define DEPTHTEXTURE".to_string());
        }

        let has_normals = mesh.geometry().map_or(false, |g| g.data().has_normals());
        if self.normal_bias != 0.0 && has_normals {
            defines.push("#define NORMAL".to_string());
            if matches!(light.kind(), LightKind::Directional) {
                defines.push("#define DIRECTIONINLIGHTDATA".to_string());
            }
        }
        if light.need_cube() {
            defines.push("#define USEDISTANCE".to_string());
        }
        if is_transparent && self.enable_soft_transparent_shadow {
            defines.push("#define SM_SOFTTRANSPARENTSHADOW 1".to_string());
        }
        if material.need_alpha_testing() && material.alpha_test_texture().is_some() {
            defines.push("#define ALPHATEST".to_string());
        }

        match skeleton {
            Some(skeleton) if mesh.compute_bones_using_shaders => {
                defines.push("#define NUM_BONE_INFLUENCERS 4".to_string());
                defines.push(format!("#define BonesPerMesh {}", skeleton.bone_count() + 1));
            }
            _ => defines.push("#define NUM_BONE_INFLUENCERS 0".to_string()),
        }
        if use_instances {
            defines.push("#define INSTANCES".to_string());
        }
        defines
    }

    /// Whether a submesh can be drawn into the shadow map.
    ///
    /// Selects the shadow effect variant (the material's depth effect when it
    /// supplies one) and, for blurred filters, builds and polls the blur
    /// chain. Variants are cached by their defines.
    #[allow(clippy::too_many_arguments)]
    pub fn is_ready(
        &mut self,
        mesh: &Mesh,
        material: &mut dyn Material,
        skeleton: Option<&Skeleton>,
        light: &Light,
        use_instances: bool,
        is_transparent: bool,
        device: &mut dyn GraphicsDevice,
    ) -> bool {
        let defines = self.prepare_defines(mesh, material, skeleton, light, use_instances, is_transparent);

        let effect = match material.shadow_depth_effect(&defines, device) {
            Some(effect) => effect,
            None => {
                let key = defines.join("\n");
                match self.effects.get(&key) {
                    Some(effect) => *effect,
                    None => {
                        let desc = EffectDesc::new(SHADOW_MAP_SHADER, &defines, SHADOW_MAP_UNIFORMS, SHADOW_MAP_SAMPLERS);
                        match device.create_effect(&desc) {
                            Ok(effect) => {
                                self.effects.insert(key, effect);
                                effect
                            }
                            Err(e) => {
                                engine_warn!("galaxy3d::ShadowGenerator",
                                    "Shadow effect creation failed for '{}': {}", self.light_name, e);
                                return false;
                            }
                        }
                    }
                }
            }
        };
        self.current_effect = Some(effect);
        if !device.is_effect_ready(effect) {
            return false;
        }

        if self.filter().needs_blur() {
            self.initialize_blur(device);
            if !self.blur_post_processes.iter_mut().all(|pp| pp.is_ready(device)) {
                return false;
            }
        }
        true
    }

    /// Number of shadow effect variants created
    pub fn variant_count(&self) -> usize {
        self.effects.len()
    }

    // ========================================================================
    // Blur
    // ========================================================================

    fn initialize_blur(&mut self, device: &mut dyn GraphicsDevice) {
        if !self.blur_post_processes.is_empty() {
            return;
        }
        let Some(input) = self.shadow_map.texture() else { return };
        let target_size = ((self.map_size as f32 / self.blur_scale) as u32).max(1);

        if !self.use_kernel_blur || self.blur_scale != 1.0 {
            let mut map2 = RenderTargetTexture::new(
                &format!("{}_shadowMap2", self.light_name), target_size, false,
            )
            .with_texture_type(self.texture_type)
            .with_sampling_mode(SamplingMode::Bilinear);
            map2.render_list = None;
            if let Err(e) = map2.create(device) {
                engine_warn!("galaxy3d::ShadowGenerator",
                    "Blur target creation failed for '{}': {}", self.light_name, e);
                return;
            }
            self.shadow_map2 = Some(map2);
        }

        if self.use_kernel_blur {
            let packed = self.texture_type == TextureType::UnsignedByte;
            let mut blur_x = PostProcess::kernel_blur("horizontal blur", Vec2::X, self.blur_kernel, target_size, target_size)
                .with_texture_type(self.texture_type)
                .with_packed_float(packed);
            blur_x.auto_clear = false;
            blur_x.set_external_input(Some(input));
            let mut blur_y = PostProcess::kernel_blur("vertical blur", Vec2::Y, self.blur_kernel, target_size, target_size)
                .with_texture_type(self.texture_type)
                .with_packed_float(packed);
            blur_y.auto_clear = false;
            self.blur_post_processes = vec![blur_x, blur_y];
        } else {
            let mut box_blur = PostProcess::box_blur("DepthBoxBlur", self.blur_box_offset, target_size, target_size)
                .with_texture_type(self.texture_type);
            box_blur.set_external_input(Some(input));
            self.blur_post_processes = vec![box_blur];
        }
        self.blur_dirty = false;
    }

    fn dispose_blur(&mut self, device: &mut dyn GraphicsDevice) {
        for post_process in &mut self.blur_post_processes {
            post_process.dispose(device);
        }
        self.blur_post_processes.clear();
        if let Some(mut map2) = self.shadow_map2.take() {
            map2.dispose(device);
        }
    }

    /// Run the blur chain into the map sampled by receivers
    fn apply_blur(&mut self, device: &mut dyn GraphicsDevice, post_process_manager: &mut PostProcessManager) -> u64 {
        if self.blur_post_processes.is_empty() {
            return 0;
        }
        let target = self.shadow_map_for_rendering().texture();
        let draws = post_process_manager.direct_render(&mut self.blur_post_processes, target, device);
        if let Some(texture) = target {
            device.unbind_framebuffer(texture);
        }
        draws
    }

    // ========================================================================
    // Recreation & pending changes
    // ========================================================================

    /// Release the map and blur resources and rebuild the map, keeping the
    /// casters
    pub fn recreate_shadow_map(&mut self, device: &mut dyn GraphicsDevice) {
        engine_debug!("galaxy3d::ShadowGenerator",
            "Recreating shadow map of '{}' ({}x{})", self.light_name, self.map_size, self.map_size);
        let render_list = self.shadow_map.render_list.take().unwrap_or_default();
        let refresh_rate = self.shadow_map.refresh_rate();
        self.dispose_blur(device);
        self.shadow_map.dispose(device);

        self.shadow_map = self.build_shadow_map(render_list);
        self.shadow_map.set_refresh_rate(refresh_rate);
        self.cache = None;
        self.needs_recreate = false;
        self.sampling_dirty = false;
        self.blur_dirty = false;
    }

    fn apply_pending_changes(&mut self, device: &mut dyn GraphicsDevice) {
        if self.needs_recreate {
            self.recreate_shadow_map(device);
            return;
        }
        if self.sampling_dirty {
            self.shadow_map.set_sampling_mode(self.filter().sampling_mode(), device);
            self.sampling_dirty = false;
        }
        if self.blur_dirty {
            self.dispose_blur(device);
            self.blur_dirty = false;
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the shadow map for the current frame.
    ///
    /// Bumps `ctx.state.render_id` after every face of a cube map. The
    /// pass state (matrices, intermediate flag) is restored afterwards.
    /// Returns false when the map was not rendered this frame.
    pub(crate) fn render(
        &mut self,
        ctx: &mut PassContext<'_>,
        light: &mut Light,
        camera: &Camera,
        post_process_manager: &mut PostProcessManager,
    ) -> bool {
        if self.disposed {
            return false;
        }
        self.apply_pending_changes(&mut *ctx.device);

        let texture = match self.shadow_map.create(&mut *ctx.device) {
            Ok(texture) => texture,
            Err(e) => {
                engine_warn!("galaxy3d::ShadowGenerator",
                    "Shadow map of '{}' cannot be created: {}", self.light_name, e);
                return false;
            }
        };
        if !self.shadow_map.should_render() {
            return false;
        }

        let saved_state = ctx.state.clone();
        ctx.state.intermediate = true;

        // ===== DISPATCH =====
        let render_list = self.render_list().to_vec();
        let mut manager = std::mem::take(&mut self.shadow_map.rendering_manager);
        manager.reset();
        if !dispatch_render_list(ctx, &render_list, &mut manager, None) {
            self.shadow_map.reset_refresh_counter();
        }
        let casters: Vec<Aabb> = render_list
            .iter()
            .filter_map(|key| ctx.meshes.get(*key))
            .filter(|mesh| mesh.enabled)
            .map(|mesh| mesh.bounding_info().bounding_box.world_aabb())
            .collect();

        // ===== FACES =====
        let filter = self.filter();
        ctx.device.push_debug_group(&format!("shadow map generation for {}", self.light_name));
        for face in 0..self.shadow_map.face_count() {
            ctx.device.bind_framebuffer(texture, self.is_cube.then_some(face));
            self.current_face = face;
            if filter.uses_depth_texture() {
                ctx.device.set_color_write(false);
            }

            self.get_transform_matrix(light, &casters, camera, ctx.state.render_id, face);
            if let Some(cache) = self.cache {
                ctx.state.set_matrices(cache.view, cache.projection);
                ctx.state.eye_position = cache.position;
            }
            self.shadow_map.on_before_render.notify(&face);

            let (flags, color) = filter.clear();
            ctx.device.clear(flags, color);

            for index in 0..crate::rendering::MAX_RENDERING_GROUPS {
                let Some(group) = manager.group(index) else { continue };
                if group.queues().is_empty() {
                    continue;
                }
                self.render_for_shadow_map(ctx, group.queues(), light, camera);
            }

            self.shadow_map.on_after_render.notify(&face);
            ctx.device.unbind_framebuffer(texture);
            if self.is_cube {
                ctx.state.render_id += 1;
            }
        }

        // ===== AFTER UNBIND =====
        ctx.device.set_color_write(true);
        self.shadow_map.on_after_unbind.notify(&());
        if filter.needs_blur() {
            ctx.stats.draw_calls += self.apply_blur(&mut *ctx.device, post_process_manager);
        }
        ctx.device.pop_debug_group();

        let render_id = ctx.state.render_id;
        ctx.state = saved_state;
        ctx.state.render_id = render_id;
        self.shadow_map.rendering_manager = manager;
        true
    }

    /// Draw the queues of one rendering group into the shadow map.
    ///
    /// Transparent submeshes are drawn only with `transparency_shadow`;
    /// otherwise their mesh's intermediate active flag is cleared.
    pub fn render_for_shadow_map(
        &mut self,
        ctx: &mut PassContext<'_>,
        queues: &RenderQueues,
        light: &Light,
        camera: &Camera,
    ) {
        if !queues.depth_only.is_empty() {
            ctx.device.set_color_write(false);
            for sub_ref in &queues.depth_only {
                self.render_submesh_for_shadow_map(ctx, *sub_ref, light, camera, false, true);
            }
            ctx.device.set_color_write(true);
        }
        for sub_ref in &queues.opaque {
            self.render_submesh_for_shadow_map(ctx, *sub_ref, light, camera, false, false);
        }
        for sub_ref in &queues.alpha_test {
            self.render_submesh_for_shadow_map(ctx, *sub_ref, light, camera, false, false);
        }

        if self.transparency_shadow {
            for sub_ref in &queues.transparent {
                self.render_submesh_for_shadow_map(ctx, *sub_ref, light, camera, true, false);
            }
        } else {
            for sub_ref in &queues.transparent {
                if let Some(mesh) = ctx.meshes.get_mut(sub_ref.mesh) {
                    mesh.is_active_intermediate = false;
                }
            }
        }
    }

    /// Draw one submesh (and its instances) with the shadow effect.
    ///
    /// A `depth_only` draw precedes the real draw of the same submesh: it
    /// peeks the instance batch instead of recording it.
    pub fn render_submesh_for_shadow_map(
        &mut self,
        ctx: &mut PassContext<'_>,
        sub_ref: SubMeshRef,
        light: &Light,
        camera: &Camera,
        is_transparent: bool,
        depth_only: bool,
    ) {
        let render_id = ctx.state.render_id;

        // ===== BATCH =====
        let Some(mesh) = ctx.meshes.get_mut(sub_ref.mesh) else { return };
        mesh.is_active_intermediate = false;
        if sub_ref.index >= mesh.sub_meshes().len() {
            return;
        }
        let batch = if depth_only {
            mesh.peek_instances_render_list(sub_ref.index, render_id, true)
        } else {
            mesh.get_instances_render_list(sub_ref.index, render_id, true)
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

        // ===== EFFECT =====
        let Some(mesh) = meshes.get(sub_ref.mesh) else { return };
        let Some(sub_mesh) = mesh.sub_meshes().get(sub_ref.index) else { return };
        let Some(vertex_buffer) = mesh.vertex_buffer() else { return };
        let index_buffer = mesh.index_buffer();
        let Some(material_key) = mesh.material_for(sub_mesh).or(*default_material) else { return };
        let Some(material) = materials.get_mut(material_key) else { return };
        let skeleton = mesh
            .skeleton
            .filter(|_| mesh.compute_bones_using_shaders)
            .and_then(|key| skeletons.get(key));
        let hardware = state.caps.instanced_arrays && !instance_worlds.is_empty();

        device.set_state(RasterState {
            culling: material.back_face_culling(),
            cull_back_faces: true,
            reverse_side: mesh.is_world_mirrored(),
            z_offset: 0.0,
        });

        if !self.is_ready(mesh, &mut **material, skeleton, light, hardware, is_transparent, &mut **device) {
            engine_trace!("galaxy3d::ShadowGenerator",
                "Shadow effect of '{}' not ready, retrying next frame", mesh.name);
            self.shadow_map.reset_refresh_counter();
            return;
        }
        let Some(effect) = self.current_effect else { return };

        // ===== BIND =====
        device.enable_effect(effect);
        device.bind_buffers(vertex_buffer, index_buffer, effect);

        let world = *mesh.world_matrix();
        device.set_uniform(effect, "world", UniformValue::Mat4(world));
        device.set_uniform(effect, "viewProjection", UniformValue::Mat4(state.transform));
        device.set_uniform(effect, "biasAndScale",
            UniformValue::Vec3(Vec3::new(self.bias, self.normal_bias, self.depth_scale(light))));
        device.set_uniform(effect, "lightData", UniformValue::Vec3(self.light_data(light)));
        let min_z = light.depth_min_z(camera);
        device.set_uniform(effect, "depthValues",
            UniformValue::Vec2(Vec2::new(min_z, min_z + light.depth_max_z(camera))));
        if is_transparent && self.enable_soft_transparent_shadow {
            device.set_uniform(effect, "softTransparentShadowSM",
                UniformValue::Float(mesh.visibility * material.alpha()));
        }
        if material.need_alpha_testing() {
            if let Some(texture) = material.alpha_test_texture() {
                device.set_texture(effect, "diffuseSampler", texture);
                device.set_uniform(effect, "diffuseMatrix", UniformValue::Mat4(Mat4::IDENTITY));
            }
        }
        if let Some(skeleton) = skeleton {
            device.set_uniform(effect, "mBones", UniformValue::Mat4Array(skeleton.transform_matrices().to_vec()));
        }

        let fill_mode = match mesh.kind() {
            MeshKind::Lines { .. } => FillMode::Lines,
            _ => material.fill_mode(),
        };
        let draw = submesh_draw_call(sub_mesh, index_buffer.is_some(), fill_mode);
        if draw.count == 0 {
            return;
        }

        // ===== DRAW =====
        let Some(mesh) = meshes.get_mut(sub_ref.mesh) else { return };
        stats.draw_calls += process_rendering(
            &mut **device,
            &mut mesh.instance_data.buffer,
            &world,
            &instance_worlds,
            batch.render_self,
            hardware,
            draw,
            effect,
            &mut |instance_world, device| {
                device.set_uniform(effect, "world", UniformValue::Mat4(*instance_world));
            },
        );
    }

    // ========================================================================
    // Receivers
    // ========================================================================

    /// Sampling data for materials receiving this light's shadows.
    ///
    /// `None` until the map has been created.
    pub fn bind_shadow_light(&self, light_index: usize, light: &Light, camera: &Camera) -> Option<ShadowBinding> {
        let texture = self.shadow_map_for_rendering().texture()?;
        let size = self.shadow_map.size().max(1) as f32;
        let filter = self.filter();
        let shadows_info = if filter.uses_depth_texture() {
            Vec4::new(self.darkness, size, 1.0 / size, 0.0)
        } else {
            let texel_scale = if filter.needs_blur() { self.blur_scale } else { 1.0 };
            Vec4::new(self.darkness, texel_scale / size, self.depth_scale(light), 0.0)
        };
        let min_z = light.depth_min_z(camera);
        Some(ShadowBinding {
            light_index,
            transform: self.transform_matrix(),
            texture,
            shadows_info,
            depth_values: Vec2::new(min_z, min_z + light.depth_max_z(camera)),
        })
    }

    // ========================================================================
    // Dispose
    // ========================================================================

    /// Release every device resource. Safe to call more than once.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if self.disposed {
            return;
        }
        self.dispose_blur(device);
        self.shadow_map.dispose(device);
        for (_, effect) in self.effects.drain() {
            device.release_effect(effect);
        }
        self.current_effect = None;
        self.cache = None;
        self.disposed = true;
    }
}

#[cfg(test)]
#[path = "shadow_generator_tests.rs"]
mod tests;
