/// Camera - a viewpoint of the scene.
///
/// Stores position, target and lens parameters; view, projection and
/// frustum are derived on demand. Matrices follow glam's right-handed
/// convention with a 0..1 depth range.
///
/// A camera owns its post-process chain. The scene references cameras by
/// `CameraKey`.

use glam::{Mat4, Vec3};
use crate::culling::Frustum;
use crate::graphics_device::Viewport;
use crate::postprocess::PostProcess;
use crate::target::RenderTargetKey;

slotmap::new_key_type! {
    /// Stable key for a camera stored in the scene
    pub struct CameraKey;
}

/// Layer mask given to new cameras and meshes
pub const DEFAULT_LAYER_MASK: u32 = 0x0FFF_FFFF;

/// Lens of a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMode {
    /// Vertical field of view in radians
    Perspective { fov: f32 },
    /// Orthographic volume in view space
    Orthographic { left: f32, right: f32, bottom: f32, top: f32 },
}

impl Default for CameraMode {
    fn default() -> Self {
        CameraMode::Perspective { fov: 0.8 }
    }
}

pub struct Camera {
    pub name: String,
    pub(crate) unique_id: u64,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub mode: CameraMode,
    /// Width / height of the render surface
    pub aspect_ratio: f32,
    /// Near plane distance
    pub min_z: f32,
    /// Far plane distance
    pub max_z: f32,
    pub viewport: Viewport,
    /// Meshes are drawn only when `mesh.layer_mask & camera.layer_mask != 0`
    pub layer_mask: u32,
    /// Render targets rendered before this camera's main pass
    pub custom_render_targets: Vec<RenderTargetKey>,
    pub(crate) post_processes: Vec<PostProcess>,
}

impl Camera {
    /// Perspective camera at `position` looking at `target`
    pub fn new(name: &str, position: Vec3, target: Vec3) -> Self {
        Self {
            name: name.to_string(),
            unique_id: 0,
            position,
            target,
            up: Vec3::Y,
            mode: CameraMode::default(),
            aspect_ratio: 1.0,
            min_z: 1.0,
            max_z: 10000.0,
            viewport: Viewport::default(),
            layer_mask: DEFAULT_LAYER_MASK,
            custom_render_targets: Vec::new(),
            post_processes: Vec::new(),
        }
    }

    /// Scene-wide unique id (0 until the camera is added to a scene)
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn global_position(&self) -> Vec3 {
        self.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.mode {
            CameraMode::Perspective { fov } => {
                Mat4::perspective_rh(fov, self.aspect_ratio, self.min_z, self.max_z)
            }
            CameraMode::Orthographic { left, right, bottom, top } => {
                Mat4::orthographic_rh(left, right, bottom, top, self.min_z, self.max_z)
            }
        }
    }

    /// Combined projection * view
    pub fn transform_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.transform_matrix())
    }

    // ===== POST PROCESSES =====

    /// Append a post-process to the camera chain. Returns its index.
    pub fn add_post_process(&mut self, post_process: PostProcess) -> usize {
        self.post_processes.push(post_process);
        self.post_processes.len() - 1
    }

    /// Detach a post-process. The caller disposes its device resources.
    pub fn remove_post_process(&mut self, index: usize) -> Option<PostProcess> {
        (index < self.post_processes.len()).then(|| self.post_processes.remove(index))
    }

    pub fn post_processes(&self) -> &[PostProcess] {
        &self.post_processes
    }

    pub fn post_processes_mut(&mut self) -> &mut [PostProcess] {
        &mut self.post_processes
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
