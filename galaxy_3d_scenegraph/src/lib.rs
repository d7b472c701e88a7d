/*!
# Galaxy 3D Scene Graph

Retained-mode 3D scene graph over a pluggable graphics device.

A `Scene` owns meshes, lights, cameras, materials, skeletons and render
targets, and renders them with one call per frame. Drawing goes through the
`GraphicsDevice` trait; a backend implements it and is registered with the
`Engine`.

## Architecture

- **Scene**: Frame loop, active mesh evaluation, intersection triggers
- **Mesh**: Geometry, submeshes, instances, LOD levels, skinning
- **Culling**: Bounding volumes, frustum tests, block octrees
- **Rendering**: Rendering groups (opaque, alpha test, transparent) and the pass context
- **Target**: Offscreen render target textures (2D and cube)
- **Shadows**: Shadow map generation and filtering
- **PostProcess**: Full-screen effect chains
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod utils;
pub mod graphics_device;
pub mod culling;
pub mod camera;
pub mod lights;
pub mod material;
pub mod mesh;
pub mod rendering;
pub mod target;
pub mod postprocess;
pub mod shadows;
pub mod scene;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Graphics device trait
    pub use crate::graphics_device::GraphicsDevice;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod mesh {
        pub use crate::mesh::*;
    }

    pub mod camera {
        pub use crate::camera::*;
    }

    pub mod culling {
        pub use crate::culling::*;
    }

    pub mod lights {
        pub use crate::lights::*;
    }

    pub mod shadows {
        pub use crate::shadows::*;
    }

    pub mod material {
        pub use crate::material::*;
    }

    pub mod target {
        pub use crate::target::*;
    }

    pub mod postprocess {
        pub use crate::postprocess::*;
    }

    pub mod render {
        pub use crate::graphics_device::*;
        pub use crate::rendering::*;
    }
}

// Re-export math library at crate root
pub use glam;
