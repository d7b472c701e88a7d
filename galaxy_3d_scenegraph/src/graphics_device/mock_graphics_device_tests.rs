/// Unit tests for MockGraphicsDevice.

use glam::Vec4;
use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    GraphicsDevice, ClearFlags, DrawCall, EffectDesc, FillMode, RenderTargetDesc,
};

// ============================================================================
// Effects
// ============================================================================

#[test]
fn test_effect_ready_after_configured_polls() {
    let mut device = MockGraphicsDevice::new();
    device.effect_compile_polls = 2;

    let effect = device
        .create_effect(&EffectDesc::new("shadowMap", &["#define INSTANCES".to_string()], &["world"], &[]))
        .unwrap();

    assert!(!device.is_effect_ready(effect));
    assert!(!device.is_effect_ready(effect));
    assert!(device.is_effect_ready(effect));
    assert_eq!(device.effect_desc(effect).unwrap().defines, "#define INSTANCES");
    assert_eq!(device.created_effect_count(), 1);
}

#[test]
fn test_create_effect_rejects_empty_name() {
    let mut device = MockGraphicsDevice::new();
    assert!(device.create_effect(&EffectDesc::new("", &[], &[], &[])).is_err());
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn test_dynamic_buffer_update_and_overflow() {
    let mut device = MockGraphicsDevice::new();
    let buffer = device.create_dynamic_buffer(8).unwrap();

    device.update_dynamic_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
    assert_eq!(device.buffer_data(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);

    assert!(device.update_dynamic_buffer(buffer, 6, &[9, 9, 9]).is_err());

    device.release_buffer(buffer);
    assert!(device.buffer_data(buffer).is_none());
}

// ============================================================================
// Render targets & commands
// ============================================================================

#[test]
fn test_render_target_creation_failure_is_one_shot() {
    let mut device = MockGraphicsDevice::new();
    device.fail_render_target_creation = true;

    let desc = RenderTargetDesc::square("shadowMap", 512);
    assert!(device.create_render_target(&desc).is_err());
    assert!(device.create_render_target(&desc).is_ok());
}

#[test]
fn test_commands_are_recorded_in_order() {
    let mut device = MockGraphicsDevice::new();
    device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ONE);
    device.draw(DrawCall { fill_mode: FillMode::Triangles, indexed: true, start: 0, count: 36, instance_count: 0 });
    device.restore_default_framebuffer();

    assert_eq!(device.commands.len(), 3);
    assert!(matches!(device.commands[0], DeviceCommand::Clear { .. }));
    assert_eq!(device.draw_calls().len(), 1);
    assert_eq!(device.position(|c| matches!(c, DeviceCommand::RestoreDefaultFramebuffer)), Some(2));
}
