/// External collaborators driven by the frame loop.
///
/// The scene only decides when these run and where their output lands;
/// what they draw is theirs. All are called synchronously on the render
/// thread.

use crate::graphics_device::GraphicsDevice;
use crate::mesh::MeshKey;
use super::pass_context::PassState;

/// Something advanced by elapsed time (animations, tweens)
pub trait Animatable: Send {
    /// Advance by `delta_ms`. Returns false once finished; finished
    /// animatables are dropped by the scene.
    fn animate(&mut self, delta_ms: f64) -> bool;
}

pub trait PhysicsEngine: Send {
    /// Step the simulation by the clamped frame delta
    fn step(&mut self, delta_seconds: f64);
}

pub trait ParticleSystem: Send {
    fn is_started(&self) -> bool;

    /// Mesh emitting the particles (a disabled emitter stops the system)
    fn emitter(&self) -> Option<MeshKey>;

    fn rendering_group_id(&self) -> usize {
        0
    }

    fn layer_mask(&self) -> u32 {
        crate::camera::DEFAULT_LAYER_MASK
    }

    /// Advance the particles for the current frame
    fn animate(&mut self);

    fn active_count(&self) -> u64;

    /// Draw the particles; returns the draw calls issued
    fn render(&mut self, device: &mut dyn GraphicsDevice, pass: &PassState) -> u64;
}

pub trait SpriteManager: Send {
    fn rendering_group_id(&self) -> usize {
        0
    }

    fn layer_mask(&self) -> u32 {
        crate::camera::DEFAULT_LAYER_MASK
    }

    /// Draw the sprites; returns the draw calls issued
    fn render(&mut self, device: &mut dyn GraphicsDevice, pass: &PassState) -> u64;
}

pub trait ProceduralTexture: Send {
    /// Polled once per frame
    fn should_render(&mut self) -> bool;

    fn render(&mut self, device: &mut dyn GraphicsDevice);
}

/// Full-screen layer drawn before (background) or after (foreground) the
/// rendering groups of a camera
pub trait Layer: Send {
    fn is_background(&self) -> bool;

    fn layer_mask(&self) -> u32 {
        crate::camera::DEFAULT_LAYER_MASK
    }

    fn render(&mut self, device: &mut dyn GraphicsDevice, pass: &PassState);
}

pub trait LensFlareSystem: Send {
    fn is_enabled(&self) -> bool {
        true
    }

    fn layer_mask(&self) -> u32 {
        crate::camera::DEFAULT_LAYER_MASK
    }

    fn render(&mut self, device: &mut dyn GraphicsDevice, pass: &PassState);
}
