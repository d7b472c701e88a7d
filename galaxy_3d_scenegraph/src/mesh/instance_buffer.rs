/// InstanceBuffer - dynamic device buffer of packed world matrices.
///
/// Capacity starts at 32 matrices and doubles until the requested matrices
/// fit. The device buffer is recreated only when the capacity changes;
/// otherwise it is updated in place.

use glam::Mat4;
use crate::error::Result;
use crate::graphics_device::{BufferHandle, GraphicsDevice};

/// Bytes of one packed 4x4 f32 matrix
pub const MATRIX_BYTES: usize = 16 * 4;

/// Initial capacity in bytes (32 matrices)
pub const INITIAL_INSTANCES_BUFFER_SIZE: usize = 32 * MATRIX_BYTES;

pub struct InstanceBuffer {
    buffer: Option<BufferHandle>,
    capacity: usize,
}

impl InstanceBuffer {
    pub fn new() -> Self {
        Self { buffer: None, capacity: INITIAL_INSTANCES_BUFFER_SIZE }
    }

    /// Current capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Upload `matrices` (column-major, in order) and return the buffer
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or update fails.
    pub fn upload(&mut self, matrices: &[Mat4], device: &mut dyn GraphicsDevice) -> Result<BufferHandle> {
        let needed = matrices.len() * MATRIX_BYTES;
        let previous = self.capacity;
        while self.capacity < needed {
            self.capacity *= 2;
        }

        let bytes: &[u8] = bytemuck::cast_slice(matrices);
        match self.buffer {
            Some(buffer) if previous == self.capacity => {
                device.update_dynamic_buffer(buffer, 0, bytes)?;
                Ok(buffer)
            }
            _ => {
                if let Some(old) = self.buffer.take() {
                    device.release_buffer(old);
                }
                let buffer = device.create_dynamic_buffer(self.capacity)?;
                device.update_dynamic_buffer(buffer, 0, bytes)?;
                self.buffer = Some(buffer);
                Ok(buffer)
            }
        }
    }

    /// Release the device buffer (capacity is kept)
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.release_buffer(buffer);
        }
    }
}

impl Default for InstanceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use crate::graphics_device::mock_graphics_device::{DeviceCommand, MockGraphicsDevice};
    use super::*;

    fn matrices(count: usize) -> Vec<Mat4> {
        (0..count).map(|i| Mat4::from_translation(Vec3::splat(i as f32))).collect()
    }

    #[test]
    fn test_first_upload_creates_buffer_with_initial_capacity() {
        let mut device = MockGraphicsDevice::new();
        let mut buffer = InstanceBuffer::new();
        let handle = buffer.upload(&matrices(3), &mut device).unwrap();

        assert_eq!(buffer.capacity(), INITIAL_INSTANCES_BUFFER_SIZE);
        assert_eq!(buffer.buffer(), Some(handle));
        assert!(device.commands.contains(&DeviceCommand::CreateBuffer {
            buffer: handle,
            size: INITIAL_INSTANCES_BUFFER_SIZE,
        }));
    }

    #[test]
    fn test_same_capacity_updates_in_place() {
        let mut device = MockGraphicsDevice::new();
        let mut buffer = InstanceBuffer::new();
        let first = buffer.upload(&matrices(3), &mut device).unwrap();
        let second = buffer.upload(&matrices(20), &mut device).unwrap();
        assert_eq!(first, second);
        assert!(!device.commands.iter().any(|c| matches!(c, DeviceCommand::ReleaseBuffer(_))));
    }

    #[test]
    fn test_capacity_doubles_and_recreates() {
        let mut device = MockGraphicsDevice::new();
        let mut buffer = InstanceBuffer::new();
        let first = buffer.upload(&matrices(3), &mut device).unwrap();
        let second = buffer.upload(&matrices(100), &mut device).unwrap();

        assert_eq!(buffer.capacity(), 128 * MATRIX_BYTES);
        assert_ne!(first, second);
        assert!(device.commands.contains(&DeviceCommand::ReleaseBuffer(first)));
    }

    #[test]
    fn test_matrices_are_packed_in_order() {
        let mut device = MockGraphicsDevice::new();
        let mut buffer = InstanceBuffer::new();
        let input = matrices(4);
        let handle = buffer.upload(&input, &mut device).unwrap();

        let data = device.buffer_data(handle).unwrap();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&data[..4 * MATRIX_BYTES]);
        for (i, m) in input.iter().enumerate() {
            assert_eq!(&floats[i * 16..(i + 1) * 16], &m.to_cols_array());
        }
    }
}
