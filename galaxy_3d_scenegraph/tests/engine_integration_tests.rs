//! Integration tests for the Engine device registry
//!
//! These tests drive the Engine singleton through the public API with a
//! headless device. No GPU required.
//!
//! Run with: cargo test --test engine_integration_tests


use device_test_utils::HeadlessDevice;
use galaxy_3d_scenegraph::galaxy3d::{Engine, Error};
use serial_test::serial;

// ============================================================================
// ENGINE LIFECYCLE TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_engine_full_lifecycle() {
    Engine::initialize().unwrap();
    Engine::shutdown();
    assert_eq!(Engine::graphics_device_count(), 0);

    let (device, _log) = HeadlessDevice::new();
    let created = Engine::create_graphics_device("main", device);
    assert!(created.is_ok(), "Device registration should succeed");
    assert_eq!(Engine::graphics_device_count(), 1);

    let looked_up = Engine::graphics_device("main").unwrap();
    assert!(std::sync::Arc::ptr_eq(&created.unwrap(), &looked_up));

    Engine::destroy_graphics_device("main").unwrap();
    assert_eq!(Engine::graphics_device_count(), 0);
    assert!(matches!(Engine::graphics_device("main"), Err(Error::NotFound(_))));

    Engine::shutdown();
}

#[test]
#[serial]
fn test_integration_duplicate_device_name_is_rejected() {
    Engine::initialize().unwrap();
    Engine::shutdown();

    let (first, _) = HeadlessDevice::new();
    let (second, _) = HeadlessDevice::new();
    Engine::create_graphics_device("main", first).unwrap();
    let result = Engine::create_graphics_device("main", second);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert_eq!(Engine::graphics_device_count(), 1);

    // Unknown names are a no-op
    assert!(Engine::destroy_graphics_device("missing").is_ok());

    Engine::shutdown();
}

#[test]
#[serial]
fn test_integration_engine_reinitialize_after_shutdown() {
    Engine::initialize().unwrap();
    let (device, _) = HeadlessDevice::new();
    Engine::create_graphics_device("first", device).unwrap();
    Engine::shutdown();
    assert_eq!(Engine::graphics_device_count(), 0);

    Engine::initialize().unwrap();
    let (device, _) = HeadlessDevice::new();
    Engine::create_graphics_device("second", device).unwrap();
    assert_eq!(Engine::graphics_device_count(), 1);

    Engine::shutdown();
}
