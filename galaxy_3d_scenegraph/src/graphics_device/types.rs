/// Plain data types exchanged with a GraphicsDevice.
///
/// Handles are opaque ids issued by the device. The scene graph never looks
/// inside them; it only passes them back.

use glam::{Mat4, Vec2, Vec3, Vec4};

// ===== HANDLES =====

/// Compiled (or compiling) GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectHandle(pub u32);

/// Texture or render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Vertex, index or instance buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

// ===== CAPABILITIES =====

/// What the backend supports. Queried once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Hardware instancing (instanced vertex attributes + instanced draws)
    pub instanced_arrays: bool,
    /// Combined depth-stencil textures usable as render targets
    pub depth_texture: bool,
    /// Float textures can be rendered to
    pub texture_float_render: bool,
    /// Half-float textures can be rendered to
    pub texture_half_float_render: bool,
    /// Largest texture edge in pixels
    pub max_texture_size: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            instanced_arrays: true,
            depth_texture: true,
            texture_float_render: true,
            texture_half_float_render: true,
            max_texture_size: 8192,
        }
    }
}

// ===== STATE =====

bitflags::bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Normalized viewport (0..1 of the current framebuffer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, width: 1.0, height: 1.0 }
    }
}

/// Primitive assembly for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Triangles,
    Wireframe,
    Points,
    Lines,
}

/// Rasterizer state set before each submesh draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    /// Face culling enabled
    pub culling: bool,
    /// Cull back faces (front faces when false)
    pub cull_back_faces: bool,
    /// Front faces are clockwise (mirrored world matrix)
    pub reverse_side: bool,
    /// Depth offset applied to the polygon
    pub z_offset: f32,
}

impl Default for RasterState {
    fn default() -> Self {
        Self { culling: true, cull_back_faces: true, reverse_side: false, z_offset: 0.0 }
    }
}

/// Blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Disabled,
    Combine,
    Add,
}

/// One draw submission.
///
/// `instance_count` 0 means a plain (non-instanced) draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub fill_mode: FillMode,
    pub indexed: bool,
    pub start: u32,
    pub count: u32,
    pub instance_count: u32,
}

// ===== EFFECTS =====

/// Description of a shader variant to compile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectDesc {
    /// Shader source name (e.g. "shadowMap", "default", "kernelBlur")
    pub name: String,
    /// Newline-joined `#define` lines selecting the variant
    pub defines: String,
    /// Uniform names
    pub uniforms: Vec<String>,
    /// Sampler names
    pub samplers: Vec<String>,
}

impl EffectDesc {
    pub fn new(name: &str, defines: &[String], uniforms: &[&str], samplers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            defines: defines.join("\n"),
            uniforms: uniforms.iter().map(|u| u.to_string()).collect(),
            samplers: samplers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Uniform payload
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Mat4Array(Vec<Mat4>),
}

// ===== TEXTURES =====

/// Texel storage of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    UnsignedByte,
    HalfFloat,
    Float,
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplingMode {
    Nearest,
    #[default]
    Bilinear,
    Trilinear,
}

/// Render target creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Six faces (+X, -X, +Y, -Y, +Z, -Z)
    pub is_cube: bool,
    pub texture_type: TextureType,
    pub sampling_mode: SamplingMode,
    pub generate_depth_buffer: bool,
    pub generate_stencil_buffer: bool,
    /// Use a sampleable combined depth-stencil texture
    pub depth_stencil_texture: bool,
}

impl RenderTargetDesc {
    /// Square, bilinear, unsigned-byte target with a depth buffer
    pub fn square(name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            width: size,
            height: size,
            is_cube: false,
            texture_type: TextureType::UnsignedByte,
            sampling_mode: SamplingMode::Bilinear,
            generate_depth_buffer: true,
            generate_stencil_buffer: false,
            depth_stencil_texture: false,
        }
    }
}
