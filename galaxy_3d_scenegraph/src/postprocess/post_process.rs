/// PostProcess - a full-screen effect reading one texture and writing the
/// next target of its chain.
///
/// Each post-process owns the texture it reads from (the previous step of
/// the chain renders into it), unless an external input is set: the first
/// step of a shadow blur chain reads the shadow map directly.

use glam::{Vec2, Vec4};
use crate::engine_warn;
use crate::error::Result;
use crate::graphics_device::{
    ClearFlags, EffectDesc, EffectHandle, GraphicsDevice, RenderTargetDesc, SamplingMode,
    TextureHandle, TextureType, UniformValue,
};
use crate::utils::Observable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostProcessKind {
    /// User shader, uniforms set from `on_apply`
    Generic,
    /// Separable gaussian blur along `direction`
    KernelBlur { direction: Vec2, kernel: f32, packed_float: bool },
    /// Box blur over `2 * offset + 1` texels
    BoxBlur { offset: f32 },
}

pub struct PostProcess {
    pub name: String,
    shader: String,
    kind: PostProcessKind,
    width: u32,
    height: u32,
    texture_type: TextureType,
    sampling_mode: SamplingMode,
    effect: Option<EffectHandle>,
    texture: Option<TextureHandle>,
    external_input: Option<TextureHandle>,
    pub enabled: bool,
    pub auto_clear: bool,
    pub clear_color: Vec4,
    /// Called after the built-in uniforms are set
    pub on_apply: Observable<EffectHandle>,
}

impl PostProcess {
    pub fn new(name: &str, shader: &str, kind: PostProcessKind, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            shader: shader.to_string(),
            kind,
            width,
            height,
            texture_type: TextureType::UnsignedByte,
            sampling_mode: SamplingMode::Bilinear,
            effect: None,
            texture: None,
            external_input: None,
            enabled: true,
            auto_clear: true,
            clear_color: Vec4::ZERO,
            on_apply: Observable::new(),
        }
    }

    pub fn kernel_blur(name: &str, direction: Vec2, kernel: f32, width: u32, height: u32) -> Self {
        Self::new(
            name,
            "kernelBlur",
            PostProcessKind::KernelBlur { direction, kernel, packed_float: false },
            width,
            height,
        )
    }

    pub fn box_blur(name: &str, offset: f32, width: u32, height: u32) -> Self {
        Self::new(name, "depthBoxBlur", PostProcessKind::BoxBlur { offset }, width, height)
    }

    pub fn with_texture_type(mut self, texture_type: TextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    /// Pack depth into RGBA when float targets are unavailable
    pub fn with_packed_float(mut self, packed: bool) -> Self {
        if let PostProcessKind::KernelBlur { packed_float, .. } = &mut self.kind {
            *packed_float = packed;
        }
        self
    }

    pub fn kind(&self) -> PostProcessKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn effect(&self) -> Option<EffectHandle> {
        self.effect
    }

    /// Read from `texture` instead of the post-process's own input
    pub fn set_external_input(&mut self, texture: Option<TextureHandle>) {
        self.external_input = texture;
    }

    /// Texture sampled by `apply`
    pub fn input_texture(&self) -> Option<TextureHandle> {
        self.external_input.or(self.texture)
    }

    fn defines(&self) -> Vec<String> {
        match self.kind {
            PostProcessKind::KernelBlur { kernel, packed_float, .. } => {
                let mut defines = vec![format!("#define KERNEL {}", kernel.max(1.0).round() as u32)];
                if packed_float {
                    defines.push("#define PACKEDFLOAT 1".to_string());
                }
                defines
            }
            PostProcessKind::BoxBlur { .. } | PostProcessKind::Generic => Vec::new(),
        }
    }

    fn uniforms(&self) -> &'static [&'static str] {
        match self.kind {
            PostProcessKind::Generic => &[],
            PostProcessKind::KernelBlur { .. } => &["delta", "direction"],
            PostProcessKind::BoxBlur { .. } => &["screenSize", "boxOffset"],
        }
    }

    /// Create the effect if needed
    pub fn create(&mut self, device: &mut dyn GraphicsDevice) -> Result<EffectHandle> {
        if let Some(effect) = self.effect {
            return Ok(effect);
        }
        let desc = EffectDesc::new(&self.shader, &self.defines(), self.uniforms(), &["textureSampler"]);
        let effect = device.create_effect(&desc)?;
        self.effect = Some(effect);
        Ok(effect)
    }

    pub fn is_ready(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        match self.create(device) {
            Ok(effect) => device.is_effect_ready(effect),
            Err(_) => false,
        }
    }

    /// Make this post-process's input the current framebuffer (the previous
    /// step of the chain renders into it)
    pub fn activate(&mut self, device: &mut dyn GraphicsDevice) -> Result<TextureHandle> {
        let texture = match self.texture {
            Some(texture) => texture,
            None => {
                let desc = RenderTargetDesc {
                    name: self.name.clone(),
                    width: self.width,
                    height: self.height,
                    texture_type: self.texture_type,
                    sampling_mode: self.sampling_mode,
                    generate_depth_buffer: false,
                    ..RenderTargetDesc::square(&self.name, self.width)
                };
                let texture = device.create_render_target(&desc)?;
                self.texture = Some(texture);
                texture
            }
        };
        device.bind_framebuffer(texture, None);
        if self.auto_clear {
            device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, self.clear_color);
        }
        Ok(texture)
    }

    /// Enable the effect and bind the input and the built-in uniforms.
    /// Returns `None` (nothing to draw) while disabled or compiling.
    pub fn apply(&mut self, device: &mut dyn GraphicsDevice) -> Option<EffectHandle> {
        if !self.enabled {
            return None;
        }
        let effect = match self.create(device) {
            Ok(effect) => effect,
            Err(e) => {
                engine_warn!("galaxy3d::PostProcess", "Post-process '{}' has no effect: {}", self.name, e);
                return None;
            }
        };
        if !device.is_effect_ready(effect) {
            return None;
        }

        device.enable_effect(effect);
        if let Some(input) = self.input_texture() {
            device.set_texture(effect, "textureSampler", input);
        }
        let size = Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32);
        match self.kind {
            PostProcessKind::Generic => {}
            PostProcessKind::KernelBlur { direction, .. } => {
                device.set_uniform(effect, "direction", UniformValue::Vec2(direction));
                device.set_uniform(effect, "delta", UniformValue::Vec2(direction / size));
            }
            PostProcessKind::BoxBlur { offset } => {
                device.set_uniform(effect, "screenSize", UniformValue::Vec2(size));
                device.set_uniform(effect, "boxOffset", UniformValue::Float(offset));
            }
        }
        self.on_apply.notify(&effect);
        Some(effect)
    }

    /// Release the effect and the input texture (no-op when never created)
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(effect) = self.effect.take() {
            device.release_effect(effect);
        }
        if let Some(texture) = self.texture.take() {
            device.release_texture(texture);
        }
        self.external_input = None;
    }
}
