/// CPU skinning of meshes that do not skin in their vertex shader.

use crate::error::Result;
use crate::graphics_device::GraphicsDevice;
use super::geometry::VertexData;
use super::mesh::Mesh;
use super::skeleton::Skeleton;

impl Mesh {
    /// Skin the geometry with `skeleton` into the mesh's own vertex buffer.
    ///
    /// Does nothing for meshes without bone data. The skinned buffer is
    /// created on first use and bound instead of the shared geometry buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the dynamic buffer cannot be created or updated.
    pub fn apply_skeleton(&mut self, skeleton: &Skeleton, device: &mut dyn GraphicsDevice) -> Result<()> {
        let Some(geometry) = self.geometry() else { return Ok(()) };
        let data = geometry.data();
        if !data.has_bones() {
            return Ok(());
        }

        let matrices = skeleton.transform_matrices();
        let mut positions = Vec::with_capacity(data.vertex_count());
        let mut normals = Vec::with_capacity(data.normals.len());

        for (i, position) in data.positions.iter().enumerate() {
            let indices = data.bone_indices[i];
            let weights = data.bone_weights[i];
            let mut skinned_position = glam::Vec3::ZERO;
            let mut skinned_normal = glam::Vec3::ZERO;
            for k in 0..4 {
                let weight = weights[k];
                if weight == 0.0 {
                    continue;
                }
                let Some(matrix) = matrices.get(indices[k] as usize) else { continue };
                skinned_position += matrix.transform_point3(*position) * weight;
                if let Some(normal) = data.normals.get(i) {
                    skinned_normal += matrix.transform_vector3(*normal) * weight;
                }
            }
            positions.push(skinned_position);
            if !data.normals.is_empty() {
                normals.push(skinned_normal.normalize_or_zero());
            }
        }

        let interleaved = VertexData::interleave(&positions, &normals, &data.uvs);
        let bytes: &[u8] = bytemuck::cast_slice(&interleaved);
        let buffer = match self.skinned_buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = device.create_dynamic_buffer(bytes.len())?;
                self.skinned_buffer = Some(buffer);
                buffer
            }
        };
        device.update_dynamic_buffer(buffer, 0, bytes)
    }

    /// Release the CPU-skinned vertex buffer
    pub fn release_skinned_buffer(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.skinned_buffer.take() {
            device.release_buffer(buffer);
        }
    }
}
