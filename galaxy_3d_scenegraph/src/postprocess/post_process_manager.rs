/// PostProcessManager - runs post-process chains over a full-screen quad.

use crate::engine_warn;
use crate::graphics_device::{BufferHandle, DrawCall, FillMode, GraphicsDevice, TextureHandle};
use super::post_process::PostProcess;

const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

#[derive(Default)]
pub struct PostProcessManager {
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
}

impl PostProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn quad_buffers(&mut self, device: &mut dyn GraphicsDevice) -> Option<(BufferHandle, BufferHandle)> {
        if self.vertex_buffer.is_none() {
            match device.create_vertex_buffer(bytemuck::cast_slice(&QUAD_VERTICES)) {
                Ok(buffer) => self.vertex_buffer = Some(buffer),
                Err(e) => {
                    engine_warn!("galaxy3d::PostProcessManager", "Quad vertex buffer creation failed: {}", e);
                    return None;
                }
            }
        }
        if self.index_buffer.is_none() {
            match device.create_index_buffer(&QUAD_INDICES) {
                Ok(buffer) => self.index_buffer = Some(buffer),
                Err(e) => {
                    engine_warn!("galaxy3d::PostProcessManager", "Quad index buffer creation failed: {}", e);
                    return None;
                }
            }
        }
        Some((self.vertex_buffer?, self.index_buffer?))
    }

    /// Run a chain: each enabled post-process renders into the input of the
    /// next one, the last into `target` (`None`: the default framebuffer).
    /// Returns the draw calls issued.
    pub fn direct_render(
        &mut self,
        post_processes: &mut [PostProcess],
        target: Option<TextureHandle>,
        device: &mut dyn GraphicsDevice,
    ) -> u64 {
        let chain: Vec<usize> = post_processes
            .iter()
            .enumerate()
            .filter(|(_, pp)| pp.enabled)
            .map(|(index, _)| index)
            .collect();
        if chain.is_empty() {
            return 0;
        }
        let Some((vertex_buffer, index_buffer)) = self.quad_buffers(device) else {
            return 0;
        };

        let mut draws = 0;
        for (position, &index) in chain.iter().enumerate() {
            match chain.get(position + 1) {
                Some(&next) => {
                    if let Err(e) = post_processes[next].activate(device) {
                        engine_warn!("galaxy3d::PostProcessManager",
                            "Post-process '{}' cannot be activated: {}", post_processes[next].name, e);
                        break;
                    }
                }
                None => match target {
                    Some(texture) => device.bind_framebuffer(texture, None),
                    None => device.restore_default_framebuffer(),
                },
            }

            let Some(effect) = post_processes[index].apply(device) else { continue };
            device.bind_buffers(vertex_buffer, Some(index_buffer), effect);
            device.draw(DrawCall {
                fill_mode: FillMode::Triangles,
                indexed: true,
                start: 0,
                count: QUAD_INDICES.len() as u32,
                instance_count: 1,
            });
            draws += 1;
        }

        device.set_depth_buffer(true);
        device.set_depth_write(true);
        draws
    }

    /// Redirect the camera pass into the first post-process's input.
    /// Returns false when no post-process is enabled.
    pub fn prepare_frame(&mut self, post_processes: &mut [PostProcess], device: &mut dyn GraphicsDevice) -> bool {
        let Some(first) = post_processes.iter_mut().find(|pp| pp.enabled) else {
            return false;
        };
        match first.activate(device) {
            Ok(_) => true,
            Err(e) => {
                engine_warn!("galaxy3d::PostProcessManager",
                    "Post-process '{}' cannot be activated: {}", first.name, e);
                false
            }
        }
    }

    /// Run the camera chain to the default framebuffer
    pub fn finalize_frame(&mut self, post_processes: &mut [PostProcess], device: &mut dyn GraphicsDevice) -> u64 {
        self.direct_render(post_processes, None, device)
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.vertex_buffer.take() {
            device.release_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            device.release_buffer(buffer);
        }
    }
}

#[cfg(test)]
#[path = "post_process_manager_tests.rs"]
mod tests;
