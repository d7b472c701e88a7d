/// Pass context - everything a render pass borrows from the scene.
///
/// A pass (camera, render target or shadow map) borrows the scene's
/// collections disjointly for its duration. `PassState` carries the
/// matrices and render id of the pass and is what materials bind from.

use glam::{Mat4, Vec3};
use slotmap::SlotMap;
use crate::camera::Camera;
use crate::graphics_device::{DeviceCaps, GraphicsDevice};
use crate::material::{Material, MaterialKey};
use crate::mesh::{Mesh, MeshKey, Skeleton, SkeletonKey};
use crate::shadows::ShadowBinding;
use super::collaborators::{ParticleSystem, SpriteManager};

/// Matrices and epoch of the current pass
#[derive(Debug, Clone)]
pub struct PassState {
    /// Scene render id of this pass
    pub render_id: u64,
    /// Render target or shadow pass (instance batches use intermediate ids)
    pub intermediate: bool,
    pub view: Mat4,
    pub projection: Mat4,
    /// projection * view
    pub transform: Mat4,
    pub eye_position: Vec3,
    pub caps: DeviceCaps,
    /// Shadow maps sampled by materials in this pass
    pub shadow_bindings: Vec<ShadowBinding>,
}

impl PassState {
    pub fn new(render_id: u64, caps: DeviceCaps) -> Self {
        Self {
            render_id,
            intermediate: false,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            eye_position: Vec3::ZERO,
            caps,
            shadow_bindings: Vec::new(),
        }
    }

    /// State seen from a camera
    pub fn for_camera(camera: &Camera, render_id: u64, caps: DeviceCaps) -> Self {
        let mut state = Self::new(render_id, caps);
        state.set_camera(camera);
        state
    }

    pub fn set_camera(&mut self, camera: &Camera) {
        self.set_matrices(camera.view_matrix(), camera.projection_matrix());
        self.eye_position = camera.global_position();
    }

    pub fn set_matrices(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.transform = projection * view;
    }
}

/// Counters accumulated by a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub draw_calls: u64,
}

pub struct PassContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub meshes: &'a mut SlotMap<MeshKey, Mesh>,
    pub materials: &'a mut SlotMap<MaterialKey, Box<dyn Material>>,
    /// Material of meshes without one
    pub default_material: Option<MaterialKey>,
    pub skeletons: &'a SlotMap<SkeletonKey, Skeleton>,
    pub particles: &'a mut Vec<Box<dyn ParticleSystem>>,
    pub sprites: &'a mut Vec<Box<dyn SpriteManager>>,
    pub state: PassState,
    pub stats: PassStats,
}
