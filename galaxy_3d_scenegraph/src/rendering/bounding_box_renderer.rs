/// BoundingBoxRenderer - draws queued bounding boxes as lines over the
/// rendering groups.
///
/// Device resources (a unit cube line list and a flat color effect) are
/// created on the first render with queued boxes.

use glam::{Mat4, Vec3};
use crate::culling::BoundingBox;
use crate::engine_warn;
use crate::graphics_device::{
    BufferHandle, DrawCall, EffectDesc, EffectHandle, FillMode, GraphicsDevice, UniformValue,
};
use super::pass_context::PassState;

/// Corners of the unit cube centered on the origin
const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5],
];

/// Twelve edges as line pairs
const CUBE_LINES: [u32; 24] = [
    0, 1, 1, 2, 2, 3, 3, 0,
    4, 5, 5, 6, 6, 7, 7, 4,
    0, 4, 1, 5, 2, 6, 3, 7,
];

pub struct BoundingBoxRenderer {
    pub color: Vec3,
    boxes: Vec<BoundingBox>,
    effect: Option<EffectHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
}

impl BoundingBoxRenderer {
    pub fn new() -> Self {
        Self {
            color: Vec3::ONE,
            boxes: Vec::new(),
            effect: None,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    pub fn reset(&mut self) {
        self.boxes.clear();
    }

    /// Queue a box for this frame (its world data is captured now)
    pub fn queue(&mut self, bounding_box: &BoundingBox) {
        self.boxes.push(bounding_box.clone());
    }

    pub fn queued(&self) -> usize {
        self.boxes.len()
    }

    fn prepare_resources(&mut self, device: &mut dyn GraphicsDevice) -> Option<(EffectHandle, BufferHandle, BufferHandle)> {
        if self.effect.is_none() {
            let desc = EffectDesc::new("color", &[], &["world", "viewProjection", "color"], &[]);
            match device.create_effect(&desc) {
                Ok(effect) => self.effect = Some(effect),
                Err(e) => {
                    engine_warn!("galaxy3d::BoundingBoxRenderer", "Effect creation failed: {}", e);
                    return None;
                }
            }
        }
        if self.vertex_buffer.is_none() {
            self.vertex_buffer = device.create_vertex_buffer(bytemuck::cast_slice(&CUBE_POSITIONS)).ok();
        }
        if self.index_buffer.is_none() {
            self.index_buffer = device.create_index_buffer(&CUBE_LINES).ok();
        }
        Some((self.effect?, self.vertex_buffer?, self.index_buffer?))
    }

    /// Draw the queued boxes; returns the draw calls issued
    pub fn render(&mut self, device: &mut dyn GraphicsDevice, pass: &PassState) -> u64 {
        if self.boxes.is_empty() {
            return 0;
        }
        let Some((effect, vertex_buffer, index_buffer)) = self.prepare_resources(device) else {
            return 0;
        };
        if !device.is_effect_ready(effect) {
            return 0;
        }

        device.set_depth_write(false);
        device.enable_effect(effect);
        device.bind_buffers(vertex_buffer, Some(index_buffer), effect);
        device.set_uniform(effect, "viewProjection", UniformValue::Mat4(pass.transform));
        device.set_uniform(effect, "color", UniformValue::Vec4(self.color.extend(1.0)));

        for bounding_box in &self.boxes {
            let local = Mat4::from_scale_rotation_translation(
                bounding_box.extend_size * 2.0,
                glam::Quat::IDENTITY,
                bounding_box.center,
            );
            device.set_uniform(effect, "world", UniformValue::Mat4(*bounding_box.world() * local));
            device.draw(DrawCall {
                fill_mode: FillMode::Lines,
                indexed: true,
                start: 0,
                count: CUBE_LINES.len() as u32,
                instance_count: 1,
            });
        }
        device.set_depth_write(true);
        self.boxes.len() as u64
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        self.boxes.clear();
        if let Some(effect) = self.effect.take() {
            device.release_effect(effect);
        }
        if let Some(buffer) = self.vertex_buffer.take() {
            device.release_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            device.release_buffer(buffer);
        }
    }
}

impl Default for BoundingBoxRenderer {
    fn default() -> Self {
        Self::new()
    }
}
