/// Material trait - what the render loop needs from a material.
///
/// A material turns mesh and pass state into a compiled effect, binds its
/// uniforms for a submesh and classifies the submesh into a render queue.
/// Readiness is polled: `is_ready_for_submesh` returns false until the
/// effect variant (and any texture) is available, and the submesh is
/// skipped for that frame.

use glam::Mat4;
use crate::graphics_device::{AlphaMode, EffectHandle, FillMode, GraphicsDevice, TextureHandle};
use crate::mesh::{Mesh, Skeleton, SubMesh};
use crate::rendering::PassState;
use crate::target::RenderTargetKey;

slotmap::new_key_type! {
    /// Stable key for a material stored in the scene
    pub struct MaterialKey;
}

pub trait Material: Send {
    fn name(&self) -> &str;

    /// Prepare (and poll) the effect variant for a submesh
    ///
    /// # Arguments
    ///
    /// * `skeleton` - Skeleton of the mesh when it skins on the GPU
    /// * `use_instances` - The draw will use hardware instancing
    fn is_ready_for_submesh(
        &mut self,
        mesh: &Mesh,
        sub_mesh: &SubMesh,
        skeleton: Option<&Skeleton>,
        use_instances: bool,
        device: &mut dyn GraphicsDevice,
    ) -> bool;

    /// Effect selected by the last successful readiness check
    fn effect(&self) -> Option<EffectHandle>;

    /// Enable the effect and bind every uniform for a submesh draw
    fn bind_for_submesh(
        &mut self,
        world: &Mat4,
        mesh: &Mesh,
        sub_mesh: &SubMesh,
        skeleton: Option<&Skeleton>,
        pass: &PassState,
        device: &mut dyn GraphicsDevice,
    );

    /// Rebind only the world matrix (per-instance fallback draws)
    fn bind_only_world_matrix(&mut self, world: &Mat4, device: &mut dyn GraphicsDevice);

    /// Render targets the material samples (rendered before the main pass)
    fn render_target_textures(&self) -> &[RenderTargetKey] {
        &[]
    }

    fn need_alpha_blending_for_mesh(&self, mesh: &Mesh) -> bool;

    fn need_alpha_testing(&self) -> bool {
        false
    }

    /// Draw depth first with color writes off
    fn need_depth_pre_pass(&self) -> bool {
        false
    }

    /// Texture whose alpha channel is tested
    fn alpha_test_texture(&self) -> Option<TextureHandle> {
        None
    }

    fn alpha(&self) -> f32 {
        1.0
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Combine
    }

    fn back_face_culling(&self) -> bool {
        true
    }

    fn fill_mode(&self) -> FillMode {
        FillMode::Triangles
    }

    fn z_offset(&self) -> f32 {
        0.0
    }

    /// Material-specific depth effect for shadow passes
    ///
    /// `defines` are the shadow generator's defines; `None` falls back to
    /// the generator's own shader.
    fn shadow_depth_effect(&mut self, _defines: &[String], _device: &mut dyn GraphicsDevice) -> Option<EffectHandle> {
        None
    }

    /// Release device resources
    fn dispose(&mut self, device: &mut dyn GraphicsDevice);
}
