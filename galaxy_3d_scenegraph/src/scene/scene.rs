/// Scene - owns every collection of the scene graph and drives the frame.
///
/// Meshes, lights, cameras, materials, skeletons, render targets and shadow
/// generators live in slot maps with stable keys. Meshes and lights also keep
/// their insertion order, which evaluation and shadow collection follow.
///
/// The graphics device is shared as `Arc<Mutex<dyn GraphicsDevice>>` and
/// locked once per `render()` call (and by the few API calls that create or
/// release device resources).
///
/// The frame loop lives in `scene_render.rs`, active mesh evaluation in
/// `active_meshes.rs` and intersection triggers in `intersections.rs`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_err, engine_info, engine_warn};
use crate::camera::{Camera, CameraKey};
use crate::config::SceneConfig;
use crate::culling::Octree;
use crate::graphics_device::GraphicsDevice;
use crate::lights::{Light, LightKey};
use crate::material::{Material, MaterialKey};
use crate::mesh::{
    resolve_lod, Geometry, IntersectionTrigger, Mesh, MeshKey, MeshKind, Skeleton, SkeletonKey,
    VertexData,
};
use crate::postprocess::{PostProcess, PostProcessManager};
use crate::rendering::{
    Animatable, BoundingBoxRenderer, Layer, LensFlareSystem, ParticleSystem, PhysicsEngine,
    ProceduralTexture, RenderingManager, SpriteManager,
};
use crate::shadows::{ShadowGenerator, ShadowGeneratorKey};
use crate::target::{RenderTargetKey, RenderTargetTexture};
use crate::utils::{Observable, PerfCounter};
use super::active_meshes::update_world_matrix;
use super::intersections::IntersectionEvent;

/// Default capacity of the selection octree blocks
pub const DEFAULT_OCTREE_CAPACITY: usize = 64;
/// Default depth of the selection octree
pub const DEFAULT_OCTREE_MAX_DEPTH: u32 = 2;

pub struct Scene {
    pub config: SceneConfig,
    graphics_device: Arc<Mutex<dyn GraphicsDevice>>,
    next_unique_id: u64,
    /// Pass epoch, bumped per camera pass, render target and cube face
    pub(crate) render_id: u64,
    pub(crate) frame_id: u64,
    pub(crate) last_frame: Option<Instant>,
    pub(crate) disposed: bool,

    // ===== COLLECTIONS =====
    pub(crate) meshes: SlotMap<MeshKey, Mesh>,
    pub(crate) mesh_order: Vec<MeshKey>,
    pub(crate) lights: SlotMap<LightKey, Light>,
    pub(crate) light_order: Vec<LightKey>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) active_camera: Option<CameraKey>,
    pub(crate) active_cameras: Vec<CameraKey>,
    pub(crate) materials: SlotMap<MaterialKey, Box<dyn Material>>,
    pub(crate) default_material: Option<MaterialKey>,
    pub(crate) skeletons: SlotMap<SkeletonKey, Skeleton>,
    pub(crate) render_targets: SlotMap<RenderTargetKey, RenderTargetTexture>,
    /// Targets rendered once per frame before the cameras
    pub(crate) custom_render_targets: Vec<RenderTargetKey>,
    pub(crate) shadow_generators: SlotMap<ShadowGeneratorKey, ShadowGenerator>,

    // ===== COLLABORATORS =====
    pub(crate) animatables: Vec<Box<dyn Animatable>>,
    pub(crate) physics_engine: Option<Box<dyn PhysicsEngine>>,
    pub(crate) particle_systems: Vec<Box<dyn ParticleSystem>>,
    pub(crate) sprite_managers: Vec<Box<dyn SpriteManager>>,
    pub(crate) procedural_textures: Vec<Box<dyn ProceduralTexture>>,
    pub(crate) layers: Vec<Box<dyn Layer>>,
    pub(crate) lens_flare_systems: Vec<Box<dyn LensFlareSystem>>,

    // ===== PER-FRAME STATE =====
    pub(crate) rendering_manager: RenderingManager,
    pub(crate) bounding_box_renderer: BoundingBoxRenderer,
    pub(crate) post_process_manager: PostProcessManager,
    pub(crate) selection_octree: Option<Octree<MeshKey>>,
    pub(crate) active_meshes: Vec<MeshKey>,
    pub(crate) software_skinned_meshes: Vec<MeshKey>,
    pub(crate) active_skeletons: Vec<SkeletonKey>,
    pub(crate) processed_materials: FxHashSet<MaterialKey>,
    /// Render targets sampled by the materials of the active meshes
    pub(crate) material_render_targets: Vec<RenderTargetKey>,
    /// Shadow generators collected for the current frame
    pub(crate) frame_shadow_generators: Vec<ShadowGeneratorKey>,
    pub(crate) active_meshes_frozen: bool,
    pub(crate) frozen_evaluated: bool,
    pub(crate) pending_dispose: Vec<MeshKey>,

    // ===== COUNTERS =====
    pub(crate) total_vertices: PerfCounter,
    pub(crate) active_indices: PerfCounter,
    pub(crate) active_particles: PerfCounter,
    pub(crate) active_bones: PerfCounter,
    pub(crate) draw_calls: PerfCounter,

    // ===== OBSERVABLES =====
    /// Frame id, after animations and physics
    pub on_before_render: Observable<u64>,
    /// Frame id, after intersections and before the dispose sweep
    pub on_after_render: Observable<u64>,
    pub on_before_camera_render: Observable<CameraKey>,
    pub on_after_camera_render: Observable<CameraKey>,
    pub on_before_render_targets_render: Observable<()>,
    pub on_after_render_targets_render: Observable<()>,
    pub on_before_active_meshes_evaluation: Observable<()>,
    pub on_after_active_meshes_evaluation: Observable<()>,
    pub on_before_draw_phase: Observable<CameraKey>,
    pub on_after_draw_phase: Observable<CameraKey>,
    pub on_intersection: Observable<IntersectionEvent>,
    pub on_dispose: Observable<()>,
}

impl Scene {
    /// Create an empty scene over a graphics device
    ///
    /// # Arguments
    ///
    /// * `graphics_device` - Device shared with the engine registry
    /// * `config` - Frame-loop switches
    pub fn new(graphics_device: Arc<Mutex<dyn GraphicsDevice>>, config: SceneConfig) -> Self {
        Self {
            config,
            graphics_device,
            next_unique_id: 1,
            render_id: 0,
            frame_id: 0,
            last_frame: None,
            disposed: false,
            meshes: SlotMap::with_key(),
            mesh_order: Vec::new(),
            lights: SlotMap::with_key(),
            light_order: Vec::new(),
            cameras: SlotMap::with_key(),
            active_camera: None,
            active_cameras: Vec::new(),
            materials: SlotMap::with_key(),
            default_material: None,
            skeletons: SlotMap::with_key(),
            render_targets: SlotMap::with_key(),
            custom_render_targets: Vec::new(),
            shadow_generators: SlotMap::with_key(),
            animatables: Vec::new(),
            physics_engine: None,
            particle_systems: Vec::new(),
            sprite_managers: Vec::new(),
            procedural_textures: Vec::new(),
            layers: Vec::new(),
            lens_flare_systems: Vec::new(),
            rendering_manager: RenderingManager::new(),
            bounding_box_renderer: BoundingBoxRenderer::new(),
            post_process_manager: PostProcessManager::new(),
            selection_octree: None,
            active_meshes: Vec::new(),
            software_skinned_meshes: Vec::new(),
            active_skeletons: Vec::new(),
            processed_materials: FxHashSet::default(),
            material_render_targets: Vec::new(),
            frame_shadow_generators: Vec::new(),
            active_meshes_frozen: false,
            frozen_evaluated: false,
            pending_dispose: Vec::new(),
            total_vertices: PerfCounter::new(),
            active_indices: PerfCounter::new(),
            active_particles: PerfCounter::new(),
            active_bones: PerfCounter::new(),
            draw_calls: PerfCounter::new(),
            on_before_render: Observable::new(),
            on_after_render: Observable::new(),
            on_before_camera_render: Observable::new(),
            on_after_camera_render: Observable::new(),
            on_before_render_targets_render: Observable::new(),
            on_after_render_targets_render: Observable::new(),
            on_before_active_meshes_evaluation: Observable::new(),
            on_after_active_meshes_evaluation: Observable::new(),
            on_before_draw_phase: Observable::new(),
            on_after_draw_phase: Observable::new(),
            on_intersection: Observable::new(),
            on_dispose: Observable::new(),
        }
    }

    pub fn graphics_device(&self) -> Arc<Mutex<dyn GraphicsDevice>> {
        Arc::clone(&self.graphics_device)
    }

    pub(crate) fn lock_device(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
    ) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
        device.lock().map_err(|_| engine_err!("galaxy3d::Scene", "GraphicsDevice lock poisoned"))
    }

    fn allocate_unique_id(&mut self) -> u64 {
        let id = self.next_unique_id;
        self.next_unique_id += 1;
        id
    }

    /// Current pass epoch (monotonic, never reset)
    pub fn render_id(&self) -> u64 {
        self.render_id
    }

    /// Number of `render` calls so far
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    /// Create a geometry on the scene's device
    pub fn create_geometry(&self, name: &str, data: VertexData) -> Result<Arc<Geometry>> {
        let mut device = Self::lock_device(&self.graphics_device)?;
        Ok(Arc::new(Geometry::new(name, data, &mut *device)?))
    }

    /// Add a mesh and return its key
    pub fn add_mesh(&mut self, mut mesh: Mesh) -> MeshKey {
        mesh.unique_id = self.allocate_unique_id();
        let key = self.meshes.insert(mesh);
        self.mesh_order.push(key);
        if self.selection_octree.is_some() {
            update_world_matrix(&mut self.meshes, key, &mut FxHashSet::default());
            let bounds = self.meshes[key].bounding_info().culling_aabb();
            if let Some(octree) = self.selection_octree.as_mut() {
                octree.add_entry(key, bounds);
            }
        }
        key
    }

    /// Create an instance of `source`.
    ///
    /// Instances of an instance are created on its source. Lines meshes
    /// cannot be instanced.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown source, `InvalidOperation` for a lines mesh.
    pub fn create_instance(&mut self, source: MeshKey, name: &str) -> Result<MeshKey> {
        let Some(mut source_mesh) = self.meshes.get(source) else {
            return Err(Error::NotFound(format!("Mesh {:?}", source)));
        };
        let mut source_key = source;
        if let Some(inner) = source_mesh.source() {
            source_key = inner;
            source_mesh = self.meshes.get(inner)
                .ok_or_else(|| Error::NotFound(format!("Mesh {:?}", inner)))?;
        }
        if let MeshKind::Lines { .. } = source_mesh.kind() {
            engine_warn!("galaxy3d::Scene", "Lines mesh '{}' does not support instances", source_mesh.name);
            return Err(Error::InvalidOperation(format!(
                "lines mesh '{}' cannot be instanced", source_mesh.name
            )));
        }

        let instance = Mesh::instance(name, source_key, source_mesh);
        let key = self.add_mesh(instance);
        if let Some(source_mesh) = self.meshes.get_mut(source_key) {
            source_mesh.instances.push(key);
        }
        Ok(key)
    }

    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    pub fn mesh_mut(&mut self, key: MeshKey) -> Option<&mut Mesh> {
        self.meshes.get_mut(key)
    }

    /// Mesh keys in insertion order
    pub fn mesh_keys(&self) -> &[MeshKey] {
        &self.mesh_order
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn find_mesh_by_name(&self, name: &str) -> Option<MeshKey> {
        self.mesh_order.iter().copied().find(|key| self.meshes[*key].name == name)
    }

    /// Remove a mesh now, with its instances. Returns false for an unknown key.
    pub fn remove_mesh(&mut self, key: MeshKey) -> Result<bool> {
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        Ok(self.dispose_mesh(key, &mut *device))
    }

    /// Remove a mesh at the end of the current (or next) frame
    pub fn queue_dispose(&mut self, key: MeshKey) {
        if self.meshes.contains_key(key) && !self.pending_dispose.contains(&key) {
            self.pending_dispose.push(key);
        }
    }

    pub(crate) fn dispose_mesh(&mut self, key: MeshKey, device: &mut dyn GraphicsDevice) -> bool {
        let Some(mut mesh) = self.meshes.remove(key) else { return false };
        self.mesh_order.retain(|k| *k != key);
        self.active_meshes.retain(|k| *k != key);
        self.software_skinned_meshes.retain(|k| *k != key);
        self.pending_dispose.retain(|k| *k != key);
        if let Some(octree) = self.selection_octree.as_mut() {
            octree.remove_entry(key);
        }

        for instance in std::mem::take(&mut mesh.instances) {
            self.dispose_mesh(instance, device);
        }
        if let Some(source) = mesh.source().and_then(|source| self.meshes.get_mut(source)) {
            source.instances.retain(|k| *k != key);
        }

        // ===== LOD RELATIONS =====
        for level in mesh.lod_levels() {
            if let Some(level_mesh) = level.mesh.and_then(|m| self.meshes.get_mut(m)) {
                level_mesh.master_mesh = None;
            }
        }
        if let Some(master) = mesh.master_mesh.and_then(|m| self.meshes.get_mut(m)) {
            master.remove_lod_level(Some(key));
        }

        for other in self.meshes.values_mut() {
            if other.parent == Some(key) {
                other.parent = None;
            }
            other.intersection_triggers.retain(|trigger| trigger.other != key);
        }
        for target in self.render_targets.values_mut() {
            target.remove_from_render_list(key);
        }
        for generator in self.shadow_generators.values_mut() {
            generator.remove_shadow_caster(key);
        }

        mesh.release_skinned_buffer(device);
        mesh.instance_data.buffer.release(device);
        engine_debug!("galaxy3d::Scene", "Mesh '{}' disposed", mesh.name);
        true
    }

    // ===== LOD =====

    /// Register `level` as the mesh drawn for `master` beyond `distance`.
    ///
    /// `None` hides the master beyond `distance`. A mesh can be the level of
    /// a single master only.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown keys, `InvalidOperation` when the level mesh
    /// already has a master.
    pub fn add_lod_level(&mut self, master: MeshKey, distance: f32, level: Option<MeshKey>) -> Result<()> {
        if !self.meshes.contains_key(master) {
            return Err(Error::NotFound(format!("Mesh {:?}", master)));
        }
        if let Some(level_key) = level {
            let Some(level_mesh) = self.meshes.get_mut(level_key) else {
                return Err(Error::NotFound(format!("Mesh {:?}", level_key)));
            };
            if level_key == master || level_mesh.master_mesh.is_some() {
                engine_warn!("galaxy3d::Scene",
                    "Mesh '{}' is already used as an LOD level", level_mesh.name);
                return Err(Error::InvalidOperation(format!(
                    "mesh '{}' cannot be used as more than one LOD level", level_mesh.name
                )));
            }
            level_mesh.master_mesh = Some(master);
        }
        if let Some(master_mesh) = self.meshes.get_mut(master) {
            master_mesh.insert_lod_level(distance, level);
        }
        Ok(())
    }

    /// Remove the level showing `level`. Returns false when there was none.
    pub fn remove_lod_level(&mut self, master: MeshKey, level: Option<MeshKey>) -> bool {
        let Some(master_mesh) = self.meshes.get_mut(master) else { return false };
        if !master_mesh.remove_lod_level(level) {
            return false;
        }
        if let Some(level_mesh) = level.and_then(|key| self.meshes.get_mut(key)) {
            level_mesh.master_mesh = None;
        }
        true
    }

    /// Mesh drawn for `mesh` seen from `camera` (`None` when culled by an empty level)
    pub fn get_lod(&self, mesh: MeshKey, camera: CameraKey) -> Option<MeshKey> {
        let camera = self.cameras.get(camera)?;
        resolve_lod(&self.meshes, mesh, camera.global_position())
    }

    // ===== INTERSECTIONS =====

    /// Watch `mesh` against `other`; enter/exit events go to `on_intersection`
    pub fn register_intersection_trigger(&mut self, mesh: MeshKey, other: MeshKey, precise: bool) -> Result<()> {
        if !self.meshes.contains_key(other) {
            return Err(Error::NotFound(format!("Mesh {:?}", other)));
        }
        let Some(watcher) = self.meshes.get_mut(mesh) else {
            return Err(Error::NotFound(format!("Mesh {:?}", mesh)));
        };
        if !watcher.intersection_triggers.iter().any(|trigger| trigger.other == other) {
            watcher.intersection_triggers.push(IntersectionTrigger { other, precise, intersecting: false });
        }
        Ok(())
    }

    pub fn unregister_intersection_trigger(&mut self, mesh: MeshKey, other: MeshKey) -> bool {
        let Some(watcher) = self.meshes.get_mut(mesh) else { return false };
        let before = watcher.intersection_triggers.len();
        watcher.intersection_triggers.retain(|trigger| trigger.other != other);
        before != watcher.intersection_triggers.len()
    }

    // ========================================================================
    // Lights
    // ========================================================================

    pub fn add_light(&mut self, mut light: Light) -> LightKey {
        light.unique_id = self.allocate_unique_id();
        let key = self.lights.insert(light);
        self.light_order.push(key);
        key
    }

    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    /// Light keys in insertion order
    pub fn light_keys(&self) -> &[LightKey] {
        &self.light_order
    }

    /// Remove a light and dispose its shadow generator
    pub fn remove_light(&mut self, key: LightKey) -> Result<bool> {
        let Some(light) = self.lights.remove(key) else { return Ok(false) };
        self.light_order.retain(|k| *k != key);
        if let Some(generator) = light.shadow_generator {
            self.dispose_shadow_generator(generator)?;
        }
        Ok(true)
    }

    // ===== SHADOWS =====

    /// Create the shadow generator of a light, replacing any previous one
    ///
    /// # Arguments
    ///
    /// * `light` - Light casting the shadows (hemispheric lights are refused)
    /// * `map_size` - Shadow map size in texels
    /// * `use_full_float` - Prefer 32-bit float maps over half floats
    pub fn create_shadow_generator(
        &mut self,
        light: LightKey,
        map_size: u32,
        use_full_float: bool,
    ) -> Result<ShadowGeneratorKey> {
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        let caps = device.caps();

        let Some(light_ref) = self.lights.get(light) else {
            return Err(Error::NotFound(format!("Light {:?}", light)));
        };
        let generator = ShadowGenerator::new(map_size, light, light_ref, &caps, use_full_float)?;

        if let Some(previous) = light_ref.shadow_generator {
            if let Some(mut old) = self.shadow_generators.remove(previous) {
                old.dispose(&mut *device);
            }
        }
        let key = self.shadow_generators.insert(generator);
        if let Some(light) = self.lights.get_mut(light) {
            light.shadow_generator = Some(key);
        }
        Ok(key)
    }

    pub fn shadow_generator(&self, key: ShadowGeneratorKey) -> Option<&ShadowGenerator> {
        self.shadow_generators.get(key)
    }

    pub fn shadow_generator_mut(&mut self, key: ShadowGeneratorKey) -> Option<&mut ShadowGenerator> {
        self.shadow_generators.get_mut(key)
    }

    /// Dispose a shadow generator (unknown keys are a no-op)
    pub fn dispose_shadow_generator(&mut self, key: ShadowGeneratorKey) -> Result<bool> {
        let Some(mut generator) = self.shadow_generators.remove(key) else { return Ok(false) };
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        generator.dispose(&mut *device);
        if let Some(light) = self.lights.get_mut(generator.light()) {
            if light.shadow_generator == Some(key) {
                light.shadow_generator = None;
            }
        }
        self.frame_shadow_generators.retain(|k| *k != key);
        Ok(true)
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    /// Add a camera; the first camera becomes the active one
    pub fn add_camera(&mut self, mut camera: Camera) -> CameraKey {
        camera.unique_id = self.allocate_unique_id();
        let key = self.cameras.insert(camera);
        if self.active_camera.is_none() {
            self.active_camera = Some(key);
        }
        key
    }

    pub fn camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    pub fn camera_mut(&mut self, key: CameraKey) -> Option<&mut Camera> {
        self.cameras.get_mut(key)
    }

    pub fn active_camera(&self) -> Option<CameraKey> {
        self.active_camera
    }

    pub fn set_active_camera(&mut self, key: Option<CameraKey>) -> Result<()> {
        if let Some(key) = key {
            if !self.cameras.contains_key(key) {
                return Err(Error::NotFound(format!("Camera {:?}", key)));
            }
        }
        self.active_camera = key;
        Ok(())
    }

    /// Cameras rendered in turn (overrides the single active camera when not empty)
    pub fn active_cameras(&self) -> &[CameraKey] {
        &self.active_cameras
    }

    pub fn set_active_cameras(&mut self, keys: Vec<CameraKey>) -> Result<()> {
        if let Some(missing) = keys.iter().find(|key| !self.cameras.contains_key(**key)) {
            return Err(Error::NotFound(format!("Camera {:?}", missing)));
        }
        self.active_cameras = keys;
        Ok(())
    }

    /// Remove a camera and dispose its post-processes
    pub fn remove_camera(&mut self, key: CameraKey) -> Result<bool> {
        let Some(mut camera) = self.cameras.remove(key) else { return Ok(false) };
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        for post_process in &mut camera.post_processes {
            post_process.dispose(&mut *device);
        }
        if self.active_camera == Some(key) {
            self.active_camera = None;
        }
        self.active_cameras.retain(|k| *k != key);
        Ok(true)
    }

    /// Append a post-process to a camera's chain; returns its index
    pub fn add_post_process(&mut self, camera: CameraKey, post_process: PostProcess) -> Result<usize> {
        let Some(camera_ref) = self.cameras.get_mut(camera) else {
            return Err(Error::NotFound(format!("Camera {:?}", camera)));
        };
        Ok(camera_ref.add_post_process(post_process))
    }

    // ========================================================================
    // Materials & skeletons
    // ========================================================================

    pub fn add_material<M: Material + 'static>(&mut self, material: M) -> MaterialKey {
        self.materials.insert(Box::new(material))
    }

    pub fn material(&self, key: MaterialKey) -> Option<&dyn Material> {
        self.materials.get(key).map(|material| &**material)
    }

    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut (dyn Material + 'static)> {
        self.materials.get_mut(key).map(|material| &mut **material)
    }

    /// Material drawn for submeshes whose mesh has none
    pub fn set_default_material(&mut self, key: Option<MaterialKey>) {
        self.default_material = key;
    }

    pub fn default_material(&self) -> Option<MaterialKey> {
        self.default_material
    }

    /// Dispose a material. Meshes still naming it fall back to the default material.
    pub fn remove_material(&mut self, key: MaterialKey) -> Result<bool> {
        let Some(mut material) = self.materials.remove(key) else { return Ok(false) };
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        material.dispose(&mut *device);
        if self.default_material == Some(key) {
            self.default_material = None;
        }
        self.processed_materials.remove(&key);
        Ok(true)
    }

    pub fn add_skeleton(&mut self, mut skeleton: Skeleton) -> SkeletonKey {
        skeleton.unique_id = self.allocate_unique_id();
        self.skeletons.insert(skeleton)
    }

    pub fn skeleton(&self, key: SkeletonKey) -> Option<&Skeleton> {
        self.skeletons.get(key)
    }

    pub fn skeleton_mut(&mut self, key: SkeletonKey) -> Option<&mut Skeleton> {
        self.skeletons.get_mut(key)
    }

    // ========================================================================
    // Render targets
    // ========================================================================

    /// Add a render target sampled by materials or listed by cameras
    pub fn add_render_target(&mut self, target: RenderTargetTexture) -> RenderTargetKey {
        self.render_targets.insert(target)
    }

    /// Add a render target rendered once per frame before the cameras
    pub fn add_custom_render_target(&mut self, target: RenderTargetTexture) -> RenderTargetKey {
        let key = self.render_targets.insert(target);
        self.custom_render_targets.push(key);
        key
    }

    pub fn render_target(&self, key: RenderTargetKey) -> Option<&RenderTargetTexture> {
        self.render_targets.get(key)
    }

    pub fn render_target_mut(&mut self, key: RenderTargetKey) -> Option<&mut RenderTargetTexture> {
        self.render_targets.get_mut(key)
    }

    /// Dispose a render target and forget every reference to it
    pub fn remove_render_target(&mut self, key: RenderTargetKey) -> Result<bool> {
        let Some(mut target) = self.render_targets.remove(key) else { return Ok(false) };
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        target.dispose(&mut *device);
        self.custom_render_targets.retain(|k| *k != key);
        self.material_render_targets.retain(|k| *k != key);
        for camera in self.cameras.values_mut() {
            camera.custom_render_targets.retain(|k| *k != key);
        }
        Ok(true)
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    pub fn add_animatable<A: Animatable + 'static>(&mut self, animatable: A) {
        self.animatables.push(Box::new(animatable));
    }

    /// Animatables still running
    pub fn animatable_count(&self) -> usize {
        self.animatables.len()
    }

    pub fn set_physics_engine(&mut self, physics_engine: Option<Box<dyn PhysicsEngine>>) {
        self.physics_engine = physics_engine;
    }

    /// Add a particle system; returns its index
    pub fn add_particle_system<P: ParticleSystem + 'static>(&mut self, system: P) -> usize {
        self.particle_systems.push(Box::new(system));
        self.particle_systems.len() - 1
    }

    pub fn add_sprite_manager<S: SpriteManager + 'static>(&mut self, manager: S) -> usize {
        self.sprite_managers.push(Box::new(manager));
        self.sprite_managers.len() - 1
    }

    pub fn add_procedural_texture<P: ProceduralTexture + 'static>(&mut self, texture: P) {
        self.procedural_textures.push(Box::new(texture));
    }

    pub fn add_layer<L: Layer + 'static>(&mut self, layer: L) {
        self.layers.push(Box::new(layer));
    }

    pub fn add_lens_flare_system<L: LensFlareSystem + 'static>(&mut self, system: L) {
        self.lens_flare_systems.push(Box::new(system));
    }

    pub fn rendering_manager_mut(&mut self) -> &mut RenderingManager {
        &mut self.rendering_manager
    }

    pub fn bounding_box_renderer(&self) -> &BoundingBoxRenderer {
        &self.bounding_box_renderer
    }

    pub fn bounding_box_renderer_mut(&mut self) -> &mut BoundingBoxRenderer {
        &mut self.bounding_box_renderer
    }

    // ========================================================================
    // Counters
    // ========================================================================

    pub fn total_vertices(&self) -> &PerfCounter {
        &self.total_vertices
    }

    pub fn active_indices(&self) -> &PerfCounter {
        &self.active_indices
    }

    pub fn active_particles(&self) -> &PerfCounter {
        &self.active_particles
    }

    pub fn active_bones(&self) -> &PerfCounter {
        &self.active_bones
    }

    pub fn draw_calls(&self) -> &PerfCounter {
        &self.draw_calls
    }

    pub(crate) fn roll_counters(&mut self) {
        self.total_vertices.fetch_new_frame();
        self.active_indices.fetch_new_frame();
        self.active_particles.fetch_new_frame();
        self.active_bones.fetch_new_frame();
        self.draw_calls.fetch_new_frame();
    }

    // ========================================================================
    // Readiness & disposal
    // ========================================================================

    /// True when every enabled mesh and the effects of its materials are ready
    pub fn is_ready(&mut self) -> Result<bool> {
        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        let instanced_arrays = device.caps().instanced_arrays;

        for &key in &self.mesh_order {
            let Some(mesh) = self.meshes.get(key) else { continue };
            if !mesh.enabled || mesh.is_instance() {
                continue;
            }
            if !mesh.is_ready() {
                return Ok(false);
            }
            let skeleton = mesh
                .skeleton
                .filter(|_| mesh.compute_bones_using_shaders)
                .and_then(|skeleton| self.skeletons.get(skeleton));
            let use_instances = instanced_arrays && !mesh.instances.is_empty();
            for sub_mesh in mesh.sub_meshes() {
                let Some(material_key) = mesh.material_for(sub_mesh).or(self.default_material) else { continue };
                let Some(material) = self.materials.get_mut(material_key) else { continue };
                if !material.is_ready_for_submesh(mesh, sub_mesh, skeleton, use_instances, &mut *device) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Release every device resource the scene owns. Safe to call twice.
    ///
    /// Order: observers, instances, meshes (and their geometries), shadow
    /// generators, render targets, camera post-processes, materials, then
    /// the overlay and post-process helpers.
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.on_dispose.notify(&());

        let device_arc = Arc::clone(&self.graphics_device);
        let mut device = Self::lock_device(&device_arc)?;
        let device = &mut *device;

        let mut geometries: Vec<Arc<Geometry>> = Vec::new();
        for mesh in self.meshes.values() {
            if let Some(geometry) = mesh.geometry() {
                if !geometries.iter().any(|g| Arc::ptr_eq(g, geometry)) {
                    geometries.push(Arc::clone(geometry));
                }
            }
        }

        let (instances, masters): (Vec<MeshKey>, Vec<MeshKey>) = self
            .mesh_order
            .iter()
            .copied()
            .partition(|key| self.meshes[*key].is_instance());
        for key in instances.into_iter().chain(masters) {
            self.dispose_mesh(key, device);
        }
        for geometry in geometries {
            geometry.release(device);
        }

        for (_, mut generator) in self.shadow_generators.drain() {
            generator.dispose(device);
        }
        for light in self.lights.values_mut() {
            light.shadow_generator = None;
        }
        for (_, mut target) in self.render_targets.drain() {
            target.dispose(device);
        }
        self.custom_render_targets.clear();
        for camera in self.cameras.values_mut() {
            for post_process in &mut camera.post_processes {
                post_process.dispose(device);
            }
        }
        for (_, mut material) in self.materials.drain() {
            material.dispose(device);
        }
        self.default_material = None;

        self.bounding_box_renderer.dispose(device);
        self.post_process_manager.dispose(device);
        self.rendering_manager.reset();
        self.selection_octree = None;
        self.active_meshes.clear();
        self.material_render_targets.clear();
        self.frame_shadow_generators.clear();

        self.disposed = true;
        engine_info!("galaxy3d::Scene", "Scene disposed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
