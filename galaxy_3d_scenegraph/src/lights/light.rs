/// Light - a light source of the scene and the shadow projection it implies.
///
/// Point lights cast cube shadows (six faces), directional lights an
/// orthographic map fitted to the caster boxes, spot lights a perspective
/// map of the cone. Hemispheric lights cannot cast shadows.

use std::f32::consts::FRAC_PI_2;
use glam::{Mat4, Vec3};
use crate::camera::Camera;
use crate::culling::Aabb;
use crate::shadows::ShadowGeneratorKey;

slotmap::new_key_type! {
    /// Stable key for a light stored in the scene
    pub struct LightKey;
}

/// Shadow directions of the six cube faces (+X, -X, +Y, -Y, +Z, -Z)
pub const CUBE_FACE_DIRECTIONS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point,
    Directional,
    /// `angle` is the full cone angle in radians
    Spot { angle: f32, exponent: f32 },
    Hemispheric,
}

pub struct Light {
    pub name: String,
    pub(crate) unique_id: u64,
    kind: LightKind,
    pub position: Vec3,
    /// Direction for directional and spot lights (need not be normalized)
    pub direction: Vec3,
    pub enabled: bool,
    /// Shadows of this light are rendered and sampled
    pub shadow_enabled: bool,
    pub diffuse: Vec3,
    pub intensity: f32,
    /// Refit the directional ortho volume to the casters on every recompute
    pub auto_update_extends: bool,
    /// Derive near/far from the caster depth range (directional only)
    pub auto_calc_shadow_z_bounds: bool,
    /// Depth scale used by the shadow shaders
    pub depth_scale: f32,
    shadow_min_z: Option<f32>,
    shadow_max_z: Option<f32>,
    shadow_ortho_scale: f32,
    shadow_angle_scale: f32,
    need_projection_matrix_compute: bool,
    /// Last fitted ortho extents (left, right, bottom, top)
    ortho_extents: Option<[f32; 4]>,
    pub(crate) shadow_generator: Option<ShadowGeneratorKey>,
}

impl Light {
    pub fn new(name: &str, kind: LightKind) -> Self {
        Self {
            name: name.to_string(),
            unique_id: 0,
            kind,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            enabled: true,
            shadow_enabled: true,
            diffuse: Vec3::ONE,
            intensity: 1.0,
            auto_update_extends: true,
            auto_calc_shadow_z_bounds: false,
            depth_scale: 50.0,
            shadow_min_z: None,
            shadow_max_z: None,
            shadow_ortho_scale: 0.1,
            shadow_angle_scale: 1.0,
            need_projection_matrix_compute: true,
            ortho_extents: None,
            shadow_generator: None,
        }
    }

    pub fn point(name: &str, position: Vec3) -> Self {
        Self { position, ..Self::new(name, LightKind::Point) }
    }

    pub fn directional(name: &str, direction: Vec3) -> Self {
        Self { direction, ..Self::new(name, LightKind::Directional) }
    }

    pub fn spot(name: &str, position: Vec3, direction: Vec3, angle: f32, exponent: f32) -> Self {
        Self { position, direction, ..Self::new(name, LightKind::Spot { angle, exponent }) }
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: LightKind) {
        self.kind = kind;
        self.need_projection_matrix_compute = true;
    }

    /// Shadow generator attached to this light
    pub fn shadow_generator(&self) -> Option<ShadowGeneratorKey> {
        self.shadow_generator
    }

    pub fn can_cast_shadows(&self) -> bool {
        !matches!(self.kind, LightKind::Hemispheric)
    }

    /// Point lights render their shadow map as a cube
    pub fn need_cube(&self) -> bool {
        matches!(self.kind, LightKind::Point)
    }

    /// Direction the shadow map of `face` looks along
    pub fn shadow_direction(&self, face: u32) -> Vec3 {
        if self.need_cube() {
            CUBE_FACE_DIRECTIONS[face as usize % 6]
        } else {
            self.direction
        }
    }

    pub fn transformed_position(&self) -> Vec3 {
        self.position
    }

    // ===== SHADOW DEPTH RANGE =====

    pub fn shadow_min_z(&self) -> Option<f32> {
        self.shadow_min_z
    }

    pub fn shadow_max_z(&self) -> Option<f32> {
        self.shadow_max_z
    }

    pub fn set_shadow_min_z(&mut self, value: Option<f32>) {
        self.shadow_min_z = value;
        self.need_projection_matrix_compute = true;
    }

    pub fn set_shadow_max_z(&mut self, value: Option<f32>) {
        self.shadow_max_z = value;
        self.need_projection_matrix_compute = true;
    }

    pub fn shadow_ortho_scale(&self) -> f32 {
        self.shadow_ortho_scale
    }

    /// Relative padding added around the fitted directional volume
    pub fn set_shadow_ortho_scale(&mut self, value: f32) {
        self.shadow_ortho_scale = value;
        self.need_projection_matrix_compute = true;
    }

    pub fn shadow_angle_scale(&self) -> f32 {
        self.shadow_angle_scale
    }

    /// Multiplier applied to the spot angle for the shadow frustum
    pub fn set_shadow_angle_scale(&mut self, value: f32) {
        self.shadow_angle_scale = value;
        self.need_projection_matrix_compute = true;
    }

    /// Near plane of the shadow projection (falls back to the camera's)
    pub fn depth_min_z(&self, camera: &Camera) -> f32 {
        self.shadow_min_z.unwrap_or(camera.min_z)
    }

    /// Far plane of the shadow projection (falls back to the camera's)
    pub fn depth_max_z(&self, camera: &Camera) -> f32 {
        self.shadow_max_z.unwrap_or(camera.max_z)
    }

    pub fn need_projection_matrix_compute(&self) -> bool {
        self.need_projection_matrix_compute
    }

    pub fn force_projection_matrix_compute(&mut self) {
        self.need_projection_matrix_compute = true;
    }

    /// Last ortho extents fitted for a directional light
    pub fn ortho_extents(&self) -> Option<[f32; 4]> {
        self.ortho_extents
    }

    // ===== PROJECTION =====

    /// Compute the shadow projection for `view`.
    ///
    /// # Arguments
    ///
    /// * `view` - Light view matrix
    /// * `casters` - World boxes of the shadow casters
    /// * `camera` - Camera supplying the default depth range
    pub fn set_shadow_projection_matrix(&mut self, view: &Mat4, casters: &[Aabb], camera: &Camera) -> Mat4 {
        self.need_projection_matrix_compute = false;
        match self.kind {
            LightKind::Directional => self.directional_projection(view, casters, camera),
            LightKind::Spot { angle, .. } => Mat4::perspective_rh(
                angle * self.shadow_angle_scale,
                1.0,
                self.depth_min_z(camera),
                self.depth_max_z(camera),
            ),
            LightKind::Point => {
                Mat4::perspective_rh(FRAC_PI_2, 1.0, self.depth_min_z(camera), self.depth_max_z(camera))
            }
            LightKind::Hemispheric => Mat4::IDENTITY,
        }
    }

    fn directional_projection(&mut self, view: &Mat4, casters: &[Aabb], camera: &Camera) -> Mat4 {
        if self.auto_update_extends || self.ortho_extents.is_none() {
            let mut min = Vec3::splat(f32::MAX);
            let mut max = Vec3::splat(f32::MIN);
            for corner in casters.iter().flat_map(|b| b.corners()) {
                let p = view.transform_point3(corner);
                min = min.min(p);
                max = max.max(p);
            }

            if casters.is_empty() {
                self.ortho_extents = Some([-1.0, 1.0, -1.0, 1.0]);
            } else {
                self.ortho_extents = Some([min.x, max.x, min.y, max.y]);
                if self.auto_calc_shadow_z_bounds {
                    // View space looks down -Z: distances are negated depths
                    self.shadow_min_z = Some(-max.z);
                    self.shadow_max_z = Some(-min.z);
                }
            }
        }

        let [left, right, bottom, top] = self.ortho_extents.unwrap_or([-1.0, 1.0, -1.0, 1.0]);
        let x_offset = (right - left) * self.shadow_ortho_scale;
        let y_offset = (top - bottom) * self.shadow_ortho_scale;
        Mat4::orthographic_rh(
            left - x_offset,
            right + x_offset,
            bottom - y_offset,
            top + y_offset,
            self.depth_min_z(camera),
            self.depth_max_z(camera),
        )
    }
}

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
