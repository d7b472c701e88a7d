/// Shadow filtering modes and the render state each one implies.

use glam::Vec4;
use crate::graphics_device::{ClearFlags, DeviceCaps, SamplingMode, TextureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowFilter {
    /// Hard shadows, nearest sampling
    #[default]
    None,
    Poisson,
    /// Exponential shadow map
    Exponential,
    /// Exponential shadow map blurred after rendering
    BlurExponential,
    CloseExponential,
    BlurCloseExponential,
    /// Percentage closer filtering on a depth texture
    Pcf,
    /// Soft shadows with contact hardening on a depth texture
    ContactHardening,
}

impl ShadowFilter {
    /// Filter actually used for a light and device.
    ///
    /// Cube shadow maps cannot be blurred, and depth-texture filters need
    /// a 2D map on a device with depth textures; both fall back.
    pub fn downgrade(self, is_cube: bool, depth_texture: bool) -> Self {
        match self {
            ShadowFilter::BlurExponential if is_cube => ShadowFilter::Exponential,
            ShadowFilter::BlurCloseExponential if is_cube => ShadowFilter::CloseExponential,
            ShadowFilter::Pcf | ShadowFilter::ContactHardening if is_cube || !depth_texture => {
                ShadowFilter::Poisson
            }
            other => other,
        }
    }

    pub fn needs_blur(self) -> bool {
        matches!(self, ShadowFilter::BlurExponential | ShadowFilter::BlurCloseExponential)
    }

    /// Rendered into a sampleable depth texture, color writes off
    pub fn uses_depth_texture(self) -> bool {
        matches!(self, ShadowFilter::Pcf | ShadowFilter::ContactHardening)
    }

    pub fn is_exponential(self) -> bool {
        matches!(self, ShadowFilter::Exponential | ShadowFilter::BlurExponential)
    }

    pub fn sampling_mode(self) -> SamplingMode {
        match self {
            ShadowFilter::None | ShadowFilter::ContactHardening => SamplingMode::Nearest,
            _ => SamplingMode::Bilinear,
        }
    }

    /// Clear issued before each face
    pub fn clear(self) -> (ClearFlags, Vec4) {
        if self.uses_depth_texture() {
            (ClearFlags::DEPTH, Vec4::ONE)
        } else if self.is_exponential() {
            (ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ZERO)
        } else {
            (ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ONE)
        }
    }
}

/// Best texel format the device can render shadows into
pub fn shadow_texture_type(caps: &DeviceCaps, use_full_float: bool) -> TextureType {
    if use_full_float && caps.texture_float_render {
        TextureType::Float
    } else if caps.texture_half_float_render {
        TextureType::HalfFloat
    } else {
        TextureType::UnsignedByte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_lights_drop_blur() {
        assert_eq!(ShadowFilter::BlurExponential.downgrade(true, true), ShadowFilter::Exponential);
        assert_eq!(ShadowFilter::BlurCloseExponential.downgrade(true, true), ShadowFilter::CloseExponential);
        assert_eq!(ShadowFilter::BlurExponential.downgrade(false, true), ShadowFilter::BlurExponential);
    }

    #[test]
    fn test_depth_texture_filters_fall_back_to_poisson() {
        assert_eq!(ShadowFilter::Pcf.downgrade(false, false), ShadowFilter::Poisson);
        assert_eq!(ShadowFilter::ContactHardening.downgrade(true, true), ShadowFilter::Poisson);
        assert_eq!(ShadowFilter::Pcf.downgrade(false, true), ShadowFilter::Pcf);
    }

    #[test]
    fn test_clear_values() {
        assert_eq!(ShadowFilter::Pcf.clear(), (ClearFlags::DEPTH, Vec4::ONE));
        assert_eq!(ShadowFilter::BlurExponential.clear().1, Vec4::ZERO);
        assert_eq!(ShadowFilter::Poisson.clear(), (ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ONE));
    }

    #[test]
    fn test_texture_type_fallback() {
        let mut caps = DeviceCaps::default();
        assert_eq!(shadow_texture_type(&caps, true), TextureType::Float);
        assert_eq!(shadow_texture_type(&caps, false), TextureType::HalfFloat);
        caps.texture_float_render = false;
        assert_eq!(shadow_texture_type(&caps, true), TextureType::HalfFloat);
        caps.texture_half_float_render = false;
        assert_eq!(shadow_texture_type(&caps, true), TextureType::UnsignedByte);
    }

    #[test]
    fn test_sampling_modes() {
        assert_eq!(ShadowFilter::None.sampling_mode(), SamplingMode::Nearest);
        assert_eq!(ShadowFilter::ContactHardening.sampling_mode(), SamplingMode::Nearest);
        assert_eq!(ShadowFilter::BlurExponential.sampling_mode(), SamplingMode::Bilinear);
    }
}
