/// Shadows module - shadow map generation and filtering

mod shadow_filter;
mod shadow_generator;

pub use shadow_filter::{shadow_texture_type, ShadowFilter};
pub use shadow_generator::{
    ShadowBinding, ShadowGenerator, ShadowGeneratorKey, DEFAULT_BIAS, DEFAULT_BLUR_BOX_OFFSET,
    DEFAULT_BLUR_KERNEL, DEFAULT_BLUR_SCALE,
};
