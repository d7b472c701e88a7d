/// Render target module - offscreen passes rendered before the camera pass

mod render_target_pass;
mod render_target_texture;

pub(crate) use render_target_pass::{dispatch_render_list, render_target_texture};
pub use render_target_texture::{
    RenderTargetKey, RenderTargetTexture, REFRESH_RATE_RENDER_ONCE,
    REFRESH_RATE_RENDER_ON_EVERY_FRAME, REFRESH_RATE_RENDER_ON_EVERY_TWO_FRAMES,
};
