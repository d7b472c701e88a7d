/// Mesh - a node of the scene drawing shared geometry.
///
/// Three variants share this type (`MeshKind`):
/// - `Mesh`: owns submeshes over a shared `Geometry`
/// - `Instance`: contributes only a world matrix to its source's batches
/// - `Lines`: a mesh drawn as lines with a flat color
///
/// Relations to other nodes (parent, source, master, LOD levels, skeleton,
/// materials) are keys into the scene's collections, never owning pointers.

use std::sync::Arc;
use glam::{Mat4, Quat, Vec3};
use crate::camera::DEFAULT_LAYER_MASK;
use crate::culling::{BoundingInfo, CullingStrategy, Frustum, Octree};
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::BufferHandle;
use crate::material::MaterialKey;
use super::geometry::Geometry;
use super::instances::InstanceDataStorage;
use super::skeleton::SkeletonKey;
use super::sub_mesh::SubMesh;

slotmap::new_key_type! {
    /// Stable key for a mesh (or instance) stored in the scene
    pub struct MeshKey;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshKind {
    Mesh,
    /// Shares geometry and materials with `source`
    Instance { source: MeshKey },
    /// Drawn with `FillMode::Lines` and a flat color
    Lines { color: Vec3, alpha: f32 },
}

/// One distance-indexed level of detail.
///
/// The level is used once the camera is farther than `distance`. A level
/// without mesh hides the master at that distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodLevel {
    pub distance: f32,
    pub mesh: Option<MeshKey>,
}

/// Intersection watched after each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionTrigger {
    pub other: MeshKey,
    /// Use the oriented-box test instead of sphere + world box
    pub precise: bool,
    pub(crate) intersecting: bool,
}

impl IntersectionTrigger {
    pub fn is_intersecting(&self) -> bool {
        self.intersecting
    }
}

pub struct Mesh {
    pub name: String,
    pub(crate) unique_id: u64,
    kind: MeshKind,

    // ===== TRANSFORM =====
    pub position: Vec3,
    pub rotation: Quat,
    pub scaling: Vec3,
    pub parent: Option<MeshKey>,
    world_matrix: Mat4,

    // ===== VISIBILITY =====
    pub is_visible: bool,
    /// 0 hides the mesh, below 1 makes it transparent
    pub visibility: f32,
    pub enabled: bool,
    pub layer_mask: u32,
    /// Skip culling: the mesh is active whenever it is ready and enabled
    pub always_select_as_active_mesh: bool,
    pub culling_strategy: CullingStrategy,
    /// Rendering group (0..MAX_RENDERING_GROUPS)
    pub rendering_group_id: usize,
    /// Ordering key of transparent submeshes (lower draws first)
    pub alpha_index: f32,
    pub show_bounding_box: bool,
    /// Use the submesh octree (when built) to preselect submeshes
    pub use_octree_for_rendering_selection: bool,

    // ===== RESOURCES =====
    /// Material per submesh `material_index` (index 0 is the fallback)
    pub materials: Vec<MaterialKey>,
    pub skeleton: Option<SkeletonKey>,
    /// Skin on the GPU (`mBones` uniform) instead of on the CPU
    pub compute_bones_using_shaders: bool,
    geometry: Option<Arc<Geometry>>,
    sub_meshes: Vec<SubMesh>,
    bounding_info: BoundingInfo,
    submeshes_octree: Option<Octree<usize>>,
    pub(crate) skinned_buffer: Option<BufferHandle>,

    // ===== RELATIONS =====
    lod_levels: Vec<LodLevel>,
    pub(crate) master_mesh: Option<MeshKey>,
    pub(crate) instances: Vec<MeshKey>,
    pub(crate) intersection_triggers: Vec<IntersectionTrigger>,

    // ===== PER-PASS STATE =====
    /// Render id of the last activation
    pub(crate) render_id: u64,
    pre_activate_id: u64,
    pub(crate) is_active: bool,
    pub(crate) is_active_intermediate: bool,
    pub(crate) only_for_instances: bool,
    pub(crate) only_for_instances_intermediate: bool,
    /// Render id of the last pass that dispatched the submeshes
    pub(crate) dispatch_id: u64,
    pub(crate) instance_data: InstanceDataStorage,
}

impl Mesh {
    fn with_kind(name: &str, kind: MeshKind, geometry: Option<Arc<Geometry>>) -> Self {
        let (minimum, maximum) = geometry
            .as_ref()
            .map(|g| g.data().extents())
            .unwrap_or((Vec3::ZERO, Vec3::ZERO));

        let mut mesh = Self {
            name: name.to_string(),
            unique_id: 0,
            kind,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scaling: Vec3::ONE,
            parent: None,
            world_matrix: Mat4::IDENTITY,
            is_visible: true,
            visibility: 1.0,
            enabled: true,
            layer_mask: DEFAULT_LAYER_MASK,
            always_select_as_active_mesh: false,
            culling_strategy: CullingStrategy::Standard,
            rendering_group_id: 0,
            alpha_index: f32::MAX,
            show_bounding_box: false,
            use_octree_for_rendering_selection: true,
            materials: Vec::new(),
            skeleton: None,
            compute_bones_using_shaders: true,
            geometry: None,
            sub_meshes: Vec::new(),
            bounding_info: BoundingInfo::new(minimum, maximum, &Mat4::IDENTITY),
            submeshes_octree: None,
            skinned_buffer: None,
            lod_levels: Vec::new(),
            master_mesh: None,
            instances: Vec::new(),
            intersection_triggers: Vec::new(),
            render_id: 0,
            pre_activate_id: 0,
            is_active: false,
            is_active_intermediate: false,
            only_for_instances: false,
            only_for_instances_intermediate: false,
            dispatch_id: 0,
            instance_data: InstanceDataStorage::new(),
        };

        if let Some(geometry) = geometry {
            mesh.set_geometry(geometry);
        }
        mesh
    }

    /// Mesh with a single submesh covering the whole geometry
    pub fn new(name: &str, geometry: Arc<Geometry>) -> Self {
        Self::with_kind(name, MeshKind::Mesh, Some(geometry))
    }

    /// Mesh drawn as lines with a flat color
    pub fn lines(name: &str, geometry: Arc<Geometry>, color: Vec3, alpha: f32) -> Self {
        Self::with_kind(name, MeshKind::Lines { color, alpha }, Some(geometry))
    }

    /// Node without geometry (transform parent, empty LOD host)
    pub fn empty(name: &str) -> Self {
        Self::with_kind(name, MeshKind::Mesh, None)
    }

    /// Instance of `source`. Bounds are copied from the source.
    pub(crate) fn instance(name: &str, source_key: MeshKey, source: &Mesh) -> Self {
        let mut instance = Self::with_kind(name, MeshKind::Instance { source: source_key }, None);
        instance.bounding_info = BoundingInfo::new(
            source.bounding_info.minimum(),
            source.bounding_info.maximum(),
            &Mat4::IDENTITY,
        );
        instance.layer_mask = source.layer_mask;
        instance.rendering_group_id = source.rendering_group_id;
        instance
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, MeshKind::Instance { .. })
    }

    /// Source of an instance
    pub fn source(&self) -> Option<MeshKey> {
        match self.kind {
            MeshKind::Instance { source } => Some(source),
            _ => None,
        }
    }

    /// Instances created from this mesh
    pub fn instances(&self) -> &[MeshKey] {
        &self.instances
    }

    /// Master of an LOD level (a mesh with a master is never selected on its own)
    pub fn master_mesh(&self) -> Option<MeshKey> {
        self.master_mesh
    }

    pub fn is_blocked(&self) -> bool {
        self.master_mesh.is_some()
    }

    // ===== GEOMETRY =====

    pub fn geometry(&self) -> Option<&Arc<Geometry>> {
        self.geometry.as_ref()
    }

    /// Replace the geometry; submeshes are reset to one covering it all
    pub fn set_geometry(&mut self, geometry: Arc<Geometry>) {
        let total_vertices = geometry.total_vertices();
        let total_indices = geometry.total_indices();
        let (minimum, maximum) = geometry.data().extents();
        self.geometry = Some(geometry);
        self.bounding_info.reconstruct(minimum, maximum, &self.world_matrix);
        self.sub_meshes = vec![SubMesh::new(
            0, 0, total_vertices, 0, total_indices, minimum, maximum, &self.world_matrix,
        )];
        self.submeshes_octree = None;
    }

    pub fn total_vertices(&self) -> u32 {
        self.geometry.as_ref().map_or(0, |g| g.total_vertices())
    }

    pub fn total_indices(&self) -> u32 {
        self.geometry.as_ref().map_or(0, |g| g.total_indices())
    }

    /// Geometry readiness (meshes without geometry are always ready)
    pub fn is_ready(&self) -> bool {
        self.geometry.as_ref().map_or(true, |g| g.is_ready())
    }

    /// Vertex buffer to bind: the CPU-skinned copy when there is one
    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.skinned_buffer.or_else(|| self.geometry.as_ref().map(|g| g.vertex_buffer()))
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.geometry.as_ref().and_then(|g| g.index_buffer())
    }

    // ===== SUBMESHES =====

    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    pub fn sub_meshes_mut(&mut self) -> &mut [SubMesh] {
        &mut self.sub_meshes
    }

    /// Remove every submesh
    pub fn clear_sub_meshes(&mut self) {
        self.sub_meshes.clear();
        self.submeshes_octree = None;
    }

    /// Add a submesh over a range of the geometry. Returns its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh has no geometry or the range exceeds it.
    pub fn add_sub_mesh(
        &mut self,
        material_index: usize,
        vertex_start: u32,
        vertex_count: u32,
        index_start: u32,
        index_count: u32,
    ) -> Result<usize> {
        let Some(geometry) = self.geometry.as_ref() else {
            engine_bail!("galaxy3d::Mesh", "Mesh '{}' has no geometry", self.name);
        };
        let vertex_end = vertex_start.checked_add(vertex_count);
        let index_end = index_start.checked_add(index_count);
        if !vertex_end.is_some_and(|end| end <= geometry.total_vertices())
            || !index_end.is_some_and(|end| end <= geometry.total_indices())
        {
            engine_bail!("galaxy3d::Mesh", "Submesh range out of bounds for mesh '{}'", self.name);
        }

        let (minimum, maximum) = geometry
            .data()
            .range_extents(vertex_start, vertex_count, index_start, index_count);
        self.sub_meshes.push(SubMesh::new(
            material_index, vertex_start, vertex_count, index_start, index_count,
            minimum, maximum, &self.world_matrix,
        ));
        self.submeshes_octree = None;
        Ok(self.sub_meshes.len() - 1)
    }

    /// Material key of a submesh (falls back to the first material)
    pub fn material_for(&self, sub_mesh: &SubMesh) -> Option<MaterialKey> {
        self.materials
            .get(sub_mesh.material_index)
            .or_else(|| self.materials.first())
            .copied()
    }

    /// Build (or rebuild) the octree preselecting submeshes
    pub fn create_or_update_submeshes_octree(&mut self, capacity: usize, max_depth: u32) {
        let world = self.bounding_info.bounding_box.world_aabb();
        let octree = self
            .submeshes_octree
            .get_or_insert_with(|| Octree::new(capacity, max_depth));
        octree.update(
            world.min,
            world.max,
            self.sub_meshes
                .iter()
                .enumerate()
                .map(|(i, sub)| (i, sub.bounding_info().culling_aabb())),
        );
    }

    pub fn submeshes_octree(&self) -> Option<&Octree<usize>> {
        self.submeshes_octree.as_ref()
    }

    // ===== TRANSFORM & BOUNDS =====

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scaling, self.rotation, self.position)
    }

    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// Recompute the world matrix from the local transform and the
    /// parent's world matrix, then refresh the world bounds.
    pub fn compute_world_matrix(&mut self, parent_world: Option<&Mat4>) -> Mat4 {
        let local = self.local_matrix();
        let world = match parent_world {
            Some(parent) => *parent * local,
            None => local,
        };
        self.set_world_matrix(world);
        world
    }

    /// Force a world matrix (LOD levels take their master's)
    pub fn set_world_matrix(&mut self, world: Mat4) {
        self.world_matrix = world;
        self.bounding_info.update(&world);
        for sub in &mut self.sub_meshes {
            sub.update_bounding_info(&world);
        }
    }

    /// Mirrored transforms flip the winding of front faces
    pub fn is_world_mirrored(&self) -> bool {
        self.world_matrix.determinant() < 0.0
    }

    pub fn bounding_info(&self) -> &BoundingInfo {
        &self.bounding_info
    }

    pub fn bounding_info_mut(&mut self) -> &mut BoundingInfo {
        &mut self.bounding_info
    }

    /// Recompute local extents from the geometry
    pub fn refresh_bounding_info(&mut self) {
        let Some(geometry) = self.geometry.as_ref() else { return };
        let (minimum, maximum) = geometry.data().extents();
        let world = self.world_matrix;
        self.bounding_info.reconstruct(minimum, maximum, &world);
        let data = geometry.data();
        for sub in &mut self.sub_meshes {
            let (min, max) = data.range_extents(
                sub.vertex_start, sub.vertex_count, sub.index_start, sub.index_count,
            );
            sub.bounding_info_mut().reconstruct(min, max, &world);
        }
    }

    /// Replace the local extents (instances copy them from their source)
    pub fn set_bounding_extents(&mut self, minimum: Vec3, maximum: Vec3) {
        let world = self.world_matrix;
        self.bounding_info.reconstruct(minimum, maximum, &world);
    }

    pub fn is_in_frustum(&self, frustum: &Frustum) -> bool {
        self.bounding_info.is_in_frustum(frustum, self.culling_strategy)
    }

    pub fn is_completely_in_frustum(&self, frustum: &Frustum) -> bool {
        self.bounding_info.is_completely_in_frustum(frustum)
    }

    pub fn intersects_mesh(&self, other: &Mesh, precise: bool) -> bool {
        self.bounding_info.intersects(&other.bounding_info, precise)
    }

    pub fn intersects_point(&self, point: Vec3) -> bool {
        self.bounding_info.intersects_point(point)
    }

    /// Intersection triggers watched after each frame
    pub fn intersection_triggers(&self) -> &[IntersectionTrigger] {
        &self.intersection_triggers
    }

    // ===== LOD =====

    /// Levels sorted by descending distance
    pub fn lod_levels(&self) -> &[LodLevel] {
        &self.lod_levels
    }

    pub(crate) fn insert_lod_level(&mut self, distance: f32, mesh: Option<MeshKey>) {
        self.lod_levels.push(LodLevel { distance, mesh });
        self.lod_levels.sort_by(|a, b| b.distance.total_cmp(&a.distance));
    }

    pub(crate) fn remove_lod_level(&mut self, mesh: Option<MeshKey>) -> bool {
        let before = self.lod_levels.len();
        self.lod_levels.retain(|level| level.mesh != mesh);
        before != self.lod_levels.len()
    }

    /// Level registered at exactly `distance`
    pub fn lod_level_at_distance(&self, distance: f32) -> Option<LodLevel> {
        self.lod_levels.iter().find(|level| level.distance == distance).copied()
    }

    /// Mesh to draw for a camera `distance` away.
    ///
    /// Returns `self_key` when no level applies, `None` when the applicable
    /// level is empty (the mesh is hidden at that distance).
    pub fn select_lod(&self, self_key: MeshKey, distance: f32) -> Option<MeshKey> {
        let Some(farthest_last) = self.lod_levels.last() else {
            return Some(self_key);
        };
        if farthest_last.distance > distance {
            return Some(self_key);
        }
        self.lod_levels
            .iter()
            .find(|level| level.distance < distance)
            .map_or(Some(self_key), |level| level.mesh)
    }

    // ===== ACTIVATION =====

    /// Start a new pass for this mesh: forget last pass's visible instances
    pub fn pre_activate(&mut self, render_id: u64) {
        if self.pre_activate_id == render_id {
            return;
        }
        self.pre_activate_id = render_id;
        self.instance_data.reset_visible_instances();
        self.is_active = false;
    }

    /// Mark the render id instance batches of an intermediate pass fall back to
    pub fn pre_activate_for_intermediate_rendering(&mut self, render_id: u64) {
        self.instance_data.set_intermediate_default_render_id(render_id);
    }

    /// Record an instance visible under `render_id`
    pub fn register_instance_for_render_id(&mut self, instance: MeshKey, render_id: u64) {
        let self_render_id = self.render_id;
        self.instance_data.register(instance, render_id, self_render_id);
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_active_intermediate(&self) -> bool {
        self.is_active_intermediate
    }

    /// Render id of the last activation
    pub fn render_id(&self) -> u64 {
        self.render_id
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
