/// Camera module - viewpoints the scene renders from

mod camera;

pub use camera::{Camera, CameraKey, CameraMode, DEFAULT_LAYER_MASK};
