/// Graphics device module - the backend capability and its data types

mod graphics_device;
mod types;

pub use graphics_device::GraphicsDevice;
pub use types::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod mock_graphics_device_tests;
