/// Post-process module - full-screen effect chains (camera effects, shadow blur)

mod post_process;
mod post_process_manager;

pub use post_process::{PostProcess, PostProcessKind};
pub use post_process_manager::PostProcessManager;
