use crate::graphics_device::mock_graphics_device::{DeviceCommand, MockGraphicsDevice};
use crate::graphics_device::{SamplingMode, TextureType};
use crate::mesh::MeshKey;
use slotmap::SlotMap;
use super::*;

// ============================================================================
// REFRESH RATE
// ============================================================================

#[test]
fn test_every_frame_renders_each_poll() {
    let mut target = RenderTargetTexture::new("rtt", 256, false);
    assert!((0..5).all(|_| target.should_render()));
}

#[test]
fn test_render_once() {
    let mut target = RenderTargetTexture::new("rtt", 256, false);
    target.set_refresh_rate(REFRESH_RATE_RENDER_ONCE);
    assert!(target.should_render());
    assert!((0..10).all(|_| !target.should_render()));

    target.reset_refresh_counter();
    assert!(target.should_render());
    assert!(!target.should_render());
}

#[test]
fn test_every_two_frames() {
    let mut target = RenderTargetTexture::new("rtt", 256, false);
    target.set_refresh_rate(REFRESH_RATE_RENDER_ON_EVERY_TWO_FRAMES);
    let pattern: Vec<bool> = (0..6).map(|_| target.should_render()).collect();
    assert_eq!(pattern, vec![true, false, true, false, true, false]);
}

// ============================================================================
// DEVICE TEXTURE
// ============================================================================

#[test]
fn test_create_is_lazy_and_idempotent() {
    let mut device = MockGraphicsDevice::new();
    let mut target = RenderTargetTexture::new("rtt", 128, true)
        .with_texture_type(TextureType::HalfFloat)
        .with_sampling_mode(SamplingMode::Nearest);
    assert!(target.texture().is_none());

    let first = target.create(&mut device).unwrap();
    let second = target.create(&mut device).unwrap();
    assert_eq!(first, second);

    let created: Vec<_> = device.commands.iter().filter_map(|c| match c {
        DeviceCommand::CreateRenderTarget { desc, .. } => Some(desc.clone()),
        _ => None,
    }).collect();
    assert_eq!(created.len(), 1);
    assert!(created[0].is_cube);
    assert_eq!(created[0].width, 128);
    assert_eq!(created[0].texture_type, TextureType::HalfFloat);
    assert_eq!(target.face_count(), 6);
}

#[test]
fn test_failed_creation_leaves_no_texture() {
    let mut device = MockGraphicsDevice::new();
    device.fail_render_target_creation = true;
    let mut target = RenderTargetTexture::new("rtt", 128, false);
    assert!(target.create(&mut device).is_err());
    assert!(target.texture().is_none());
}

#[test]
fn test_resize_releases_then_recreates() {
    let mut device = MockGraphicsDevice::new();
    let mut target = RenderTargetTexture::new("rtt", 128, false);
    let old = target.create(&mut device).unwrap();
    let new = target.resize(512, &mut device).unwrap();
    assert_ne!(old, new);
    assert_eq!(target.size(), 512);
    assert!(device.commands.contains(&DeviceCommand::ReleaseTexture(old)));
}

#[test]
fn test_dispose_is_idempotent() {
    let mut device = MockGraphicsDevice::new();
    let mut never_created = RenderTargetTexture::new("rtt", 64, false);
    never_created.dispose(&mut device);
    assert!(device.commands.is_empty());

    let mut target = RenderTargetTexture::new("rtt", 64, false);
    let texture = target.create(&mut device).unwrap();
    target.dispose(&mut device);
    target.dispose(&mut device);
    let releases = device.commands.iter()
        .filter(|c| **c == DeviceCommand::ReleaseTexture(texture))
        .count();
    assert_eq!(releases, 1);
}

// ============================================================================
// RENDER LIST
// ============================================================================

#[test]
fn test_render_list_has_no_duplicates() {
    let mut keys: SlotMap<MeshKey, ()> = SlotMap::with_key();
    let a = keys.insert(());
    let b = keys.insert(());

    let mut target = RenderTargetTexture::new("rtt", 64, false);
    target.add_to_render_list(a);
    target.add_to_render_list(a);
    target.add_to_render_list(b);
    assert_eq!(target.render_list.as_deref(), Some(&[a, b][..]));

    assert!(target.remove_from_render_list(a));
    assert!(!target.remove_from_render_list(a));

    target.render_list = None;
    target.add_to_render_list(b);
    assert_eq!(target.render_list.as_deref(), Some(&[b][..]));
}
