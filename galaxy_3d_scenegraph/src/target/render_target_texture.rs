/// RenderTargetTexture - an offscreen pass rendered before the camera pass.
///
/// The target owns its device texture (created lazily), a render list and a
/// rendering manager of its own. The scene fills the manager from the render
/// list (or from the camera's active meshes when there is no list) and
/// renders every face once `should_render` agrees.
///
/// Refresh rate: 0 renders once, N renders every N frames.

use glam::Vec4;
use crate::camera::CameraKey;
use crate::error::Result;
use crate::graphics_device::{
    GraphicsDevice, RenderTargetDesc, SamplingMode, TextureHandle, TextureType,
};
use crate::mesh::MeshKey;
use crate::rendering::RenderingManager;
use crate::utils::Observable;

slotmap::new_key_type! {
    /// Stable key for a custom render target stored in the scene
    pub struct RenderTargetKey;
}

pub const REFRESH_RATE_RENDER_ONCE: u32 = 0;
pub const REFRESH_RATE_RENDER_ON_EVERY_FRAME: u32 = 1;
pub const REFRESH_RATE_RENDER_ON_EVERY_TWO_FRAMES: u32 = 2;

pub struct RenderTargetTexture {
    pub name: String,
    size: u32,
    is_cube: bool,
    texture_type: TextureType,
    sampling_mode: SamplingMode,
    generate_depth_buffer: bool,
    generate_stencil_buffer: bool,
    depth_stencil_texture: bool,
    texture: Option<TextureHandle>,

    /// Meshes drawn into the target (`None`: the camera's active meshes)
    pub render_list: Option<Vec<MeshKey>>,
    /// Camera to render from (`None`: the scene's active camera)
    pub active_camera: Option<CameraKey>,
    /// Clear color (`None`: the scene's)
    pub clear_color: Option<Vec4>,
    pub render_particles: bool,
    pub render_sprites: bool,
    refresh_rate: u32,
    current_refresh_id: i64,
    pub(crate) rendering_manager: RenderingManager,

    /// Face index (0 for 2D targets)
    pub on_before_render: Observable<u32>,
    pub on_after_render: Observable<u32>,
    pub on_after_unbind: Observable<()>,
}

impl RenderTargetTexture {
    pub fn new(name: &str, size: u32, is_cube: bool) -> Self {
        Self {
            name: name.to_string(),
            size,
            is_cube,
            texture_type: TextureType::UnsignedByte,
            sampling_mode: SamplingMode::Bilinear,
            generate_depth_buffer: true,
            generate_stencil_buffer: false,
            depth_stencil_texture: false,
            texture: None,
            render_list: Some(Vec::new()),
            active_camera: None,
            clear_color: None,
            render_particles: true,
            render_sprites: false,
            refresh_rate: REFRESH_RATE_RENDER_ON_EVERY_FRAME,
            current_refresh_id: -1,
            rendering_manager: RenderingManager::new(),
            on_before_render: Observable::new(),
            on_after_render: Observable::new(),
            on_after_unbind: Observable::new(),
        }
    }

    pub fn with_texture_type(mut self, texture_type: TextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    pub fn with_sampling_mode(mut self, sampling_mode: SamplingMode) -> Self {
        self.sampling_mode = sampling_mode;
        self
    }

    pub fn with_stencil_buffer(mut self, generate_stencil_buffer: bool) -> Self {
        self.generate_stencil_buffer = generate_stencil_buffer;
        self
    }

    /// Sample depth through a combined depth-stencil texture
    pub fn with_depth_stencil_texture(mut self, depth_stencil_texture: bool) -> Self {
        self.depth_stencil_texture = depth_stencil_texture;
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_cube(&self) -> bool {
        self.is_cube
    }

    /// Faces rendered per update
    pub fn face_count(&self) -> u32 {
        if self.is_cube { 6 } else { 1 }
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampling_mode
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn rendering_manager(&self) -> &RenderingManager {
        &self.rendering_manager
    }

    pub fn rendering_manager_mut(&mut self) -> &mut RenderingManager {
        &mut self.rendering_manager
    }

    fn desc(&self) -> RenderTargetDesc {
        RenderTargetDesc {
            name: self.name.clone(),
            width: self.size,
            height: self.size,
            is_cube: self.is_cube,
            texture_type: self.texture_type,
            sampling_mode: self.sampling_mode,
            generate_depth_buffer: self.generate_depth_buffer,
            generate_stencil_buffer: self.generate_stencil_buffer,
            depth_stencil_texture: self.depth_stencil_texture,
        }
    }

    /// Create the device texture if it does not exist yet
    pub fn create(&mut self, device: &mut dyn GraphicsDevice) -> Result<TextureHandle> {
        if let Some(texture) = self.texture {
            return Ok(texture);
        }
        let texture = device.create_render_target(&self.desc())?;
        self.texture = Some(texture);
        Ok(texture)
    }

    /// Recreate the texture at a new size
    pub fn resize(&mut self, size: u32, device: &mut dyn GraphicsDevice) -> Result<TextureHandle> {
        self.release_texture(device);
        self.size = size;
        self.create(device)
    }

    pub fn set_sampling_mode(&mut self, sampling_mode: SamplingMode, device: &mut dyn GraphicsDevice) {
        self.sampling_mode = sampling_mode;
        if let Some(texture) = self.texture {
            device.update_sampling_mode(texture, sampling_mode);
        }
    }

    // ===== REFRESH =====

    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    /// Changing the rate renders the target on the next frame
    pub fn set_refresh_rate(&mut self, refresh_rate: u32) {
        self.refresh_rate = refresh_rate;
        self.reset_refresh_counter();
    }

    /// Render on the next `should_render` poll
    pub fn reset_refresh_counter(&mut self) {
        self.current_refresh_id = -1;
    }

    /// Advance the refresh counter; true when this frame renders the target
    pub fn should_render(&mut self) -> bool {
        if self.current_refresh_id == -1 {
            self.current_refresh_id = 1;
            return true;
        }
        if i64::from(self.refresh_rate) == self.current_refresh_id {
            self.current_refresh_id = 1;
            return true;
        }
        self.current_refresh_id += 1;
        false
    }

    // ===== RENDER LIST =====

    pub fn add_to_render_list(&mut self, mesh: MeshKey) {
        let list = self.render_list.get_or_insert_with(Vec::new);
        if !list.contains(&mesh) {
            list.push(mesh);
        }
    }

    pub fn remove_from_render_list(&mut self, mesh: MeshKey) -> bool {
        match self.render_list.as_mut() {
            Some(list) => {
                let before = list.len();
                list.retain(|m| *m != mesh);
                before != list.len()
            }
            None => false,
        }
    }

    fn release_texture(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            device.release_texture(texture);
        }
    }

    /// Release the texture. Safe to call on a target never created.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        self.release_texture(device);
        self.rendering_manager.reset();
        self.on_before_render.clear();
        self.on_after_render.clear();
        self.on_after_unbind.clear();
    }
}

#[cfg(test)]
#[path = "render_target_texture_tests.rs"]
mod tests;
