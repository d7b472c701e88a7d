/// GraphicsDevice trait - the backend capability the scene graph draws through
///
/// The scene graph only calls these methods; ordering of calls within a frame
/// is defined by the render loop. Backends (Vulkan, GL, a recording mock) live
/// outside this crate.

use glam::Vec4;
use crate::error::Result;
use super::types::{
    AlphaMode, BufferHandle, ClearFlags, DeviceCaps, DrawCall, EffectDesc, EffectHandle,
    RasterState, RenderTargetDesc, SamplingMode, TextureHandle, UniformValue, Viewport,
};

/// Backend capability used by the render loop, mesh rendering and shadow passes.
pub trait GraphicsDevice: Send {
    /// Backend capabilities
    fn caps(&self) -> DeviceCaps;

    // ===== FRAMEBUFFER STATE =====

    /// Set the normalized viewport of the bound framebuffer
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clear the bound framebuffer
    ///
    /// # Arguments
    ///
    /// * `flags` - Which buffers to clear
    /// * `color` - Clear color (used when `flags` contains COLOR)
    fn clear(&mut self, flags: ClearFlags, color: Vec4);

    fn set_color_write(&mut self, enabled: bool);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_depth_buffer(&mut self, enabled: bool);
    fn set_stencil_buffer(&mut self, enabled: bool);
    fn set_state(&mut self, state: RasterState);
    fn set_alpha_mode(&mut self, mode: AlphaMode);

    /// Push a debug label (no-op on backends without markers)
    fn push_debug_group(&mut self, _label: &str) {}

    /// Pop the last debug label
    fn pop_debug_group(&mut self) {}

    // ===== EFFECTS =====

    /// Start compiling a shader variant
    ///
    /// Compilation may be asynchronous: poll `is_effect_ready`.
    fn create_effect(&mut self, desc: &EffectDesc) -> Result<EffectHandle>;

    /// Poll an effect for compilation completion
    fn is_effect_ready(&mut self, effect: EffectHandle) -> bool;

    /// Make an effect current for subsequent uniforms and draws
    fn enable_effect(&mut self, effect: EffectHandle);

    fn release_effect(&mut self, effect: EffectHandle);

    /// Set a uniform on an effect
    fn set_uniform(&mut self, effect: EffectHandle, name: &str, value: UniformValue);

    /// Bind a texture to a sampler of an effect
    fn set_texture(&mut self, effect: EffectHandle, sampler: &str, texture: TextureHandle);

    // ===== TEXTURES & RENDER TARGETS =====

    /// Poll a texture for load completion
    fn is_texture_ready(&self, texture: TextureHandle) -> bool;

    /// Create a (possibly cube) render target texture
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TextureHandle>;

    fn update_sampling_mode(&mut self, texture: TextureHandle, mode: SamplingMode);
    fn release_texture(&mut self, texture: TextureHandle);

    /// Bind a render target (and cube face) as the current framebuffer
    fn bind_framebuffer(&mut self, texture: TextureHandle, face: Option<u32>);

    /// Unbind a render target (resolves mips/MSAA on real backends)
    fn unbind_framebuffer(&mut self, texture: TextureHandle);

    /// Bind the default (swapchain) framebuffer
    fn restore_default_framebuffer(&mut self);

    // ===== BUFFERS =====

    /// Create a static vertex buffer
    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferHandle>;

    /// Create a static index buffer
    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<BufferHandle>;

    /// Create a dynamic buffer of `size` bytes (instance matrices, skinned positions)
    fn create_dynamic_buffer(&mut self, size: usize) -> Result<BufferHandle>;

    /// Write `data` into a dynamic buffer at `offset`
    fn update_dynamic_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> Result<()>;

    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Bind vertex (and optional index) buffers for an effect
    fn bind_buffers(&mut self, vertex: BufferHandle, index: Option<BufferHandle>, effect: EffectHandle);

    /// Bind a buffer of packed 4x4 world matrices as per-instance attributes
    fn bind_instance_buffer(&mut self, buffer: BufferHandle, effect: EffectHandle);

    /// Disable per-instance attributes after an instanced draw
    fn unbind_instance_attributes(&mut self);

    // ===== DRAWS =====

    /// Issue an indexed or non-indexed draw
    fn draw(&mut self, call: DrawCall);

    /// Issue a point-cloud draw
    fn draw_point_clouds(&mut self, start: u32, count: u32, instance_count: u32);
}
