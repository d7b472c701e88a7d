/// Lights module - light sources and their shadow projections

mod light;

pub use light::{Light, LightKey, LightKind, CUBE_FACE_DIRECTIONS};
