/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every call is recorded as a `DeviceCommand` so tests can assert call order,
/// draw counts, instance counts and uploaded buffer contents.

use glam::Vec4;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::engine_bail;
use super::graphics_device::GraphicsDevice;
use super::types::{
    AlphaMode, BufferHandle, ClearFlags, DeviceCaps, DrawCall, EffectDesc, EffectHandle,
    RasterState, RenderTargetDesc, SamplingMode, TextureHandle, UniformValue, Viewport,
};

// ============================================================================
// Recorded commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetViewport(Viewport),
    Clear { flags: ClearFlags, color: Vec4 },
    SetColorWrite(bool),
    SetDepthWrite(bool),
    SetDepthBuffer(bool),
    SetStencilBuffer(bool),
    SetState(RasterState),
    SetAlphaMode(AlphaMode),
    PushDebugGroup(String),
    PopDebugGroup,
    CreateEffect { effect: EffectHandle, name: String, defines: String },
    EnableEffect(EffectHandle),
    ReleaseEffect(EffectHandle),
    SetUniform { effect: EffectHandle, name: String, value: UniformValue },
    SetTexture { effect: EffectHandle, sampler: String, texture: TextureHandle },
    CreateRenderTarget { texture: TextureHandle, desc: RenderTargetDesc },
    UpdateSamplingMode { texture: TextureHandle, mode: SamplingMode },
    ReleaseTexture(TextureHandle),
    BindFramebuffer { texture: TextureHandle, face: Option<u32> },
    UnbindFramebuffer(TextureHandle),
    RestoreDefaultFramebuffer,
    CreateBuffer { buffer: BufferHandle, size: usize },
    UpdateBuffer { buffer: BufferHandle, offset: usize, size: usize },
    ReleaseBuffer(BufferHandle),
    BindBuffers { vertex: BufferHandle, index: Option<BufferHandle>, effect: EffectHandle },
    BindInstanceBuffer { buffer: BufferHandle, effect: EffectHandle },
    UnbindInstanceAttributes,
    Draw(DrawCall),
    DrawPointClouds { start: u32, count: u32, instance_count: u32 },
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    pub caps: DeviceCaps,
    pub commands: Vec<DeviceCommand>,
    /// Polls an effect needs before it reports ready (0 = ready at once)
    pub effect_compile_polls: u32,
    /// Textures that report not ready until removed from this list
    pub pending_textures: Vec<TextureHandle>,
    /// Fail the next render target creation
    pub fail_render_target_creation: bool,
    next_id: u32,
    effect_polls: FxHashMap<EffectHandle, u32>,
    effects: FxHashMap<EffectHandle, EffectDesc>,
    buffers: FxHashMap<BufferHandle, Vec<u8>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            caps: DeviceCaps::default(),
            commands: Vec::new(),
            effect_compile_polls: 0,
            pending_textures: Vec::new(),
            fail_render_target_creation: false,
            next_id: 1,
            effect_polls: FxHashMap::default(),
            effects: FxHashMap::default(),
            buffers: FxHashMap::default(),
        }
    }

    pub fn with_caps(caps: DeviceCaps) -> Self {
        Self { caps, ..Self::new() }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// All draw calls recorded so far
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    /// Index of the first command matching a predicate
    pub fn position<F: Fn(&DeviceCommand) -> bool>(&self, predicate: F) -> Option<usize> {
        self.commands.iter().position(predicate)
    }

    /// Contents of a dynamic or static buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.as_slice())
    }

    /// Description of a created effect
    pub fn effect_desc(&self, effect: EffectHandle) -> Option<&EffectDesc> {
        self.effects.get(&effect)
    }

    /// Number of effects created so far (variant compilations)
    pub fn created_effect_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::CreateEffect { .. }))
            .count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(DeviceCommand::SetViewport(viewport));
    }

    fn clear(&mut self, flags: ClearFlags, color: Vec4) {
        self.commands.push(DeviceCommand::Clear { flags, color });
    }

    fn set_color_write(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetColorWrite(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetDepthWrite(enabled));
    }

    fn set_depth_buffer(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetDepthBuffer(enabled));
    }

    fn set_stencil_buffer(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetStencilBuffer(enabled));
    }

    fn set_state(&mut self, state: RasterState) {
        self.commands.push(DeviceCommand::SetState(state));
    }

    fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.commands.push(DeviceCommand::SetAlphaMode(mode));
    }

    fn push_debug_group(&mut self, label: &str) {
        self.commands.push(DeviceCommand::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(DeviceCommand::PopDebugGroup);
    }

    fn create_effect(&mut self, desc: &EffectDesc) -> Result<EffectHandle> {
        if desc.name.is_empty() {
            engine_bail!("galaxy3d::mock", "create_effect: empty shader name");
        }
        let effect = EffectHandle(self.allocate_id());
        self.effects.insert(effect, desc.clone());
        self.effect_polls.insert(effect, 0);
        self.commands.push(DeviceCommand::CreateEffect {
            effect,
            name: desc.name.clone(),
            defines: desc.defines.clone(),
        });
        Ok(effect)
    }

    fn is_effect_ready(&mut self, effect: EffectHandle) -> bool {
        match self.effect_polls.get_mut(&effect) {
            Some(polls) => {
                *polls += 1;
                *polls > self.effect_compile_polls
            }
            None => false,
        }
    }

    fn enable_effect(&mut self, effect: EffectHandle) {
        self.commands.push(DeviceCommand::EnableEffect(effect));
    }

    fn release_effect(&mut self, effect: EffectHandle) {
        self.effects.remove(&effect);
        self.effect_polls.remove(&effect);
        self.commands.push(DeviceCommand::ReleaseEffect(effect));
    }

    fn set_uniform(&mut self, effect: EffectHandle, name: &str, value: UniformValue) {
        self.commands.push(DeviceCommand::SetUniform { effect, name: name.to_string(), value });
    }

    fn set_texture(&mut self, effect: EffectHandle, sampler: &str, texture: TextureHandle) {
        self.commands.push(DeviceCommand::SetTexture {
            effect,
            sampler: sampler.to_string(),
            texture,
        });
    }

    fn is_texture_ready(&self, texture: TextureHandle) -> bool {
        !self.pending_textures.contains(&texture)
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<TextureHandle> {
        if self.fail_render_target_creation {
            self.fail_render_target_creation = false;
            engine_bail!("galaxy3d::mock", "create_render_target: forced failure for '{}'", desc.name);
        }
        if desc.width == 0 || desc.height == 0 {
            engine_bail!("galaxy3d::mock",
                "create_render_target: invalid size {}x{}", desc.width, desc.height);
        }
        let texture = TextureHandle(self.allocate_id());
        self.commands.push(DeviceCommand::CreateRenderTarget { texture, desc: desc.clone() });
        Ok(texture)
    }

    fn update_sampling_mode(&mut self, texture: TextureHandle, mode: SamplingMode) {
        self.commands.push(DeviceCommand::UpdateSamplingMode { texture, mode });
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.commands.push(DeviceCommand::ReleaseTexture(texture));
    }

    fn bind_framebuffer(&mut self, texture: TextureHandle, face: Option<u32>) {
        self.commands.push(DeviceCommand::BindFramebuffer { texture, face });
    }

    fn unbind_framebuffer(&mut self, texture: TextureHandle) {
        self.commands.push(DeviceCommand::UnbindFramebuffer(texture));
    }

    fn restore_default_framebuffer(&mut self) {
        self.commands.push(DeviceCommand::RestoreDefaultFramebuffer);
    }

    fn create_vertex_buffer(&mut self, data: &[u8]) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.allocate_id());
        self.buffers.insert(buffer, data.to_vec());
        self.commands.push(DeviceCommand::CreateBuffer { buffer, size: data.len() });
        Ok(buffer)
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> Result<BufferHandle> {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        self.create_vertex_buffer(bytes)
    }

    fn create_dynamic_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        let buffer = BufferHandle(self.allocate_id());
        self.buffers.insert(buffer, vec![0u8; size]);
        self.commands.push(DeviceCommand::CreateBuffer { buffer, size });
        Ok(buffer)
    }

    fn update_dynamic_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let Some(storage) = self.buffers.get_mut(&buffer) else {
            engine_bail!("galaxy3d::mock", "update_dynamic_buffer: unknown buffer {:?}", buffer);
        };
        if offset + data.len() > storage.len() {
            engine_bail!("galaxy3d::mock",
                "update_dynamic_buffer: {} bytes at offset {} overflow buffer of {} bytes",
                data.len(), offset, storage.len());
        }
        storage[offset..offset + data.len()].copy_from_slice(data);
        self.commands.push(DeviceCommand::UpdateBuffer { buffer, offset, size: data.len() });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.commands.push(DeviceCommand::ReleaseBuffer(buffer));
    }

    fn bind_buffers(&mut self, vertex: BufferHandle, index: Option<BufferHandle>, effect: EffectHandle) {
        self.commands.push(DeviceCommand::BindBuffers { vertex, index, effect });
    }

    fn bind_instance_buffer(&mut self, buffer: BufferHandle, effect: EffectHandle) {
        self.commands.push(DeviceCommand::BindInstanceBuffer { buffer, effect });
    }

    fn unbind_instance_attributes(&mut self) {
        self.commands.push(DeviceCommand::UnbindInstanceAttributes);
    }

    fn draw(&mut self, call: DrawCall) {
        self.commands.push(DeviceCommand::Draw(call));
    }

    fn draw_point_clouds(&mut self, start: u32, count: u32, instance_count: u32) {
        self.commands.push(DeviceCommand::DrawPointClouds { start, count, instance_count });
    }
}
