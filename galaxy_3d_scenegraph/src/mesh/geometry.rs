//! Shared vertex and index data of meshes.
//!
//! A `Geometry` is created once and shared (`Arc`) by every mesh drawing
//! it; instances never own one. Device buffers are created eagerly with a
//! fixed interleaved layout:
//!
//! ```text
//! | position (3 x f32) | normal (3 x f32) | uv (2 x f32) |   32 bytes / vertex
//! ```
//!
//! Delay-loaded geometries start "not ready" and are skipped by the render
//! loop until `mark_loaded` is called.

use std::sync::atomic::{AtomicBool, Ordering};
use glam::{Vec2, Vec3};
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{BufferHandle, GraphicsDevice};

/// Floats per interleaved vertex
pub const VERTEX_STRIDE_FLOATS: usize = 8;

/// CPU-side vertex data of a geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    pub positions: Vec<Vec3>,
    /// Same length as `positions`, or empty
    pub normals: Vec<Vec3>,
    /// Same length as `positions`, or empty
    pub uvs: Vec<Vec2>,
    /// Empty for non-indexed geometry
    pub indices: Vec<u32>,
    /// Four bone indices per vertex (skinned geometry only)
    pub bone_indices: Vec<[u32; 4]>,
    /// Four bone weights per vertex (skinned geometry only)
    pub bone_weights: Vec<[f32; 4]>,
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_bones(&self) -> bool {
        !self.bone_indices.is_empty() && self.bone_indices.len() == self.bone_weights.len()
    }

    /// Local min/max of all positions (zero box when empty)
    pub fn extents(&self) -> (Vec3, Vec3) {
        Self::extents_of(self.positions.iter().copied())
    }

    /// Local min/max of the vertices referenced by a range
    ///
    /// Indexed geometry uses the index range, other geometry the vertex range.
    pub fn range_extents(&self, vertex_start: u32, vertex_count: u32, index_start: u32, index_count: u32) -> (Vec3, Vec3) {
        if self.is_indexed() {
            let start = (index_start as usize).min(self.indices.len());
            let end = (start + index_count as usize).min(self.indices.len());
            Self::extents_of(
                self.indices[start..end]
                    .iter()
                    .filter_map(|&i| self.positions.get(i as usize).copied()),
            )
        } else {
            let start = (vertex_start as usize).min(self.positions.len());
            let end = (start + vertex_count as usize).min(self.positions.len());
            Self::extents_of(self.positions[start..end].iter().copied())
        }
    }

    fn extents_of<I: Iterator<Item = Vec3>>(points: I) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;
        for p in points {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if any { (min, max) } else { (Vec3::ZERO, Vec3::ZERO) }
    }

    /// Interleave positions, normals and uvs into the vertex buffer layout
    pub fn interleave(positions: &[Vec3], normals: &[Vec3], uvs: &[Vec2]) -> Vec<f32> {
        let mut data = Vec::with_capacity(positions.len() * VERTEX_STRIDE_FLOATS);
        for (i, p) in positions.iter().enumerate() {
            let n = normals.get(i).copied().unwrap_or(Vec3::ZERO);
            let uv = uvs.get(i).copied().unwrap_or(Vec2::ZERO);
            data.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, uv.x, uv.y]);
        }
        data
    }
}

pub struct Geometry {
    name: String,
    data: VertexData,
    vertex_buffer: BufferHandle,
    index_buffer: Option<BufferHandle>,
    loaded: AtomicBool,
}

impl Geometry {
    /// Create a geometry and its device buffers
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, normals/uvs/bones do not match
    /// the vertex count, an index is out of range, or buffer creation fails.
    pub fn new(name: &str, data: VertexData, device: &mut dyn GraphicsDevice) -> Result<Self> {
        Self::validate(name, &data)?;

        let interleaved = VertexData::interleave(&data.positions, &data.normals, &data.uvs);
        let vertex_buffer = device.create_vertex_buffer(bytemuck::cast_slice(&interleaved))?;
        let index_buffer = if data.is_indexed() {
            Some(device.create_index_buffer(&data.indices)?)
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            data,
            vertex_buffer,
            index_buffer,
            loaded: AtomicBool::new(true),
        })
    }

    /// Create a geometry that reports not ready until `mark_loaded`
    pub fn new_delayed(name: &str, data: VertexData, device: &mut dyn GraphicsDevice) -> Result<Self> {
        let geometry = Self::new(name, data, device)?;
        geometry.loaded.store(false, Ordering::Release);
        Ok(geometry)
    }

    fn validate(name: &str, data: &VertexData) -> Result<()> {
        let count = data.vertex_count();
        if count == 0 {
            engine_bail!("galaxy3d::Geometry", "Geometry '{}' has no vertices", name);
        }
        if !data.normals.is_empty() && data.normals.len() != count {
            engine_bail!("galaxy3d::Geometry", "Geometry '{}': {} normals for {} vertices",
                name, data.normals.len(), count);
        }
        if !data.uvs.is_empty() && data.uvs.len() != count {
            engine_bail!("galaxy3d::Geometry", "Geometry '{}': {} uvs for {} vertices",
                name, data.uvs.len(), count);
        }
        if data.bone_indices.len() != data.bone_weights.len()
            || (!data.bone_indices.is_empty() && data.bone_indices.len() != count)
        {
            engine_bail!("galaxy3d::Geometry", "Geometry '{}': bone data does not match {} vertices",
                name, count);
        }
        if let Some(bad) = data.indices.iter().find(|&&i| i as usize >= count) {
            engine_bail!("galaxy3d::Geometry", "Geometry '{}': index {} out of range ({} vertices)",
                name, bad, count);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &VertexData {
        &self.data
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn total_vertices(&self) -> u32 {
        self.data.vertex_count() as u32
    }

    pub fn total_indices(&self) -> u32 {
        self.data.indices.len() as u32
    }

    /// Readiness poll used by the render loop
    pub fn is_ready(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Flag delayed data as available (callable from a loader thread)
    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Release the device buffers
    pub fn release(&self, device: &mut dyn GraphicsDevice) {
        device.release_buffer(self.vertex_buffer);
        if let Some(index) = self.index_buffer {
            device.release_buffer(index);
        }
    }
}
