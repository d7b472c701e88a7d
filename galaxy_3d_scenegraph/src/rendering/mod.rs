/// Rendering module - render queues, pass context and frame collaborators

mod bounding_box_renderer;
mod collaborators;
mod pass_context;
mod rendering_group;
mod rendering_manager;

pub use bounding_box_renderer::BoundingBoxRenderer;
pub use collaborators::{
    Animatable, Layer, LensFlareSystem, ParticleSystem, PhysicsEngine, ProceduralTexture,
    SpriteManager,
};
pub use pass_context::{PassContext, PassState, PassStats};
pub use rendering_group::{
    render_depth_only, render_submeshes, CustomRenderFunction, RenderQueues, RenderingGroup,
};
pub use rendering_manager::{RenderingManager, MAX_RENDERING_GROUPS};
