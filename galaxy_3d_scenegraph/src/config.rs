/// Scene configuration.
///
/// Plain data, `Default`-constructible. Toggles here switch whole render-loop
/// stages on or off; they never change how a stage works.

use glam::Vec4;

/// Frame-loop switches and clear settings for a `Scene`
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Clear color, depth and stencil of the backbuffer before the camera passes
    pub auto_clear: bool,
    /// Clear depth and stencil of the backbuffer before the camera passes
    pub auto_clear_depth_and_stencil: bool,
    /// Backbuffer clear color (RGBA)
    pub clear_color: Vec4,

    pub animations_enabled: bool,
    /// Multiplier applied to elapsed time before animating
    pub animation_time_scale: f64,
    /// Animate with a fixed 16 ms step instead of wall-clock time
    pub use_constant_animation_delta_time: bool,
    /// Lower clamp of the frame delta (ms)
    pub min_delta_time_ms: f64,
    /// Upper clamp of the frame delta (ms)
    pub max_delta_time_ms: f64,

    pub physics_enabled: bool,
    pub render_targets_enabled: bool,
    pub procedural_textures_enabled: bool,
    pub shadows_enabled: bool,
    pub skeletons_enabled: bool,
    pub particles_enabled: bool,
    pub sprites_enabled: bool,
    pub lens_flares_enabled: bool,
    pub layers_enabled: bool,
    pub post_processes_enabled: bool,

    /// Queue the bounding box of every active mesh for the overlay
    pub force_show_bounding_boxes: bool,
    /// Run intersection triggers after each frame
    pub check_intersections: bool,
}

/// Fixed animation step used with `use_constant_animation_delta_time`
pub const CONSTANT_ANIMATION_DELTA_MS: f64 = 16.0;

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            auto_clear: true,
            auto_clear_depth_and_stencil: true,
            clear_color: Vec4::new(0.2, 0.2, 0.3, 1.0),
            animations_enabled: true,
            animation_time_scale: 1.0,
            use_constant_animation_delta_time: false,
            min_delta_time_ms: 1.0,
            max_delta_time_ms: 1000.0,
            physics_enabled: true,
            render_targets_enabled: true,
            procedural_textures_enabled: true,
            shadows_enabled: true,
            skeletons_enabled: true,
            particles_enabled: true,
            sprites_enabled: true,
            lens_flares_enabled: true,
            layers_enabled: true,
            post_processes_enabled: true,
            force_show_bounding_boxes: false,
            check_intersections: true,
        }
    }
}

impl SceneConfig {
    /// Clamp a raw frame delta to the configured range
    pub fn clamp_delta(&self, delta_ms: f64) -> f64 {
        delta_ms.max(self.min_delta_time_ms).min(self.max_delta_time_ms)
    }

    /// Delta handed to animatables for a raw frame delta
    pub fn animation_delta(&self, delta_ms: f64) -> f64 {
        if self.use_constant_animation_delta_time {
            CONSTANT_ANIMATION_DELTA_MS
        } else {
            self.clamp_delta(delta_ms) * self.animation_time_scale
        }
    }
}
