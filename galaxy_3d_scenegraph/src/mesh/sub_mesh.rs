/// SubMesh - a drawable range of a mesh's geometry with its own material slot.

use glam::{Mat4, Vec3};
use crate::culling::{BoundingInfo, CullingStrategy, Frustum};
use super::mesh::MeshKey;

/// Reference to one submesh of a mesh, as queued for drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubMeshRef {
    pub mesh: MeshKey,
    pub index: usize,
}

impl SubMeshRef {
    pub fn new(mesh: MeshKey, index: usize) -> Self {
        Self { mesh, index }
    }
}

#[derive(Debug, Clone)]
pub struct SubMesh {
    /// Index into the mesh's material list
    pub material_index: usize,
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub index_start: u32,
    pub index_count: u32,
    bounding_info: BoundingInfo,
    /// Render id of the last pass that drew this submesh (0 = never)
    pub(crate) render_id: u64,
}

impl SubMesh {
    /// # Arguments
    ///
    /// * `minimum` / `maximum` - Local extents of the vertices in range
    /// * `world` - Current world matrix of the owning mesh
    pub fn new(
        material_index: usize,
        vertex_start: u32,
        vertex_count: u32,
        index_start: u32,
        index_count: u32,
        minimum: Vec3,
        maximum: Vec3,
        world: &Mat4,
    ) -> Self {
        Self {
            material_index,
            vertex_start,
            vertex_count,
            index_start,
            index_count,
            bounding_info: BoundingInfo::new(minimum, maximum, world),
            render_id: 0,
        }
    }

    pub fn bounding_info(&self) -> &BoundingInfo {
        &self.bounding_info
    }

    pub fn bounding_info_mut(&mut self) -> &mut BoundingInfo {
        &mut self.bounding_info
    }

    /// Render id of the last pass that drew this submesh
    pub fn render_id(&self) -> u64 {
        self.render_id
    }

    pub fn update_bounding_info(&mut self, world: &Mat4) {
        self.bounding_info.update(world);
    }

    pub fn is_in_frustum(&self, frustum: &Frustum, strategy: CullingStrategy) -> bool {
        self.bounding_info.is_in_frustum(frustum, strategy)
    }

    pub fn is_completely_in_frustum(&self, frustum: &Frustum) -> bool {
        self.bounding_info.is_completely_in_frustum(frustum)
    }
}
