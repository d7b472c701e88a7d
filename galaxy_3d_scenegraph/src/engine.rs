/// Galaxy3D Engine - process-wide registry for graphics devices and the logger
///
/// Devices are registered by name and shared as `Arc<Mutex<dyn GraphicsDevice>>`;
/// a `Scene` is created over one of them. The logger is global and used by all
/// `engine_*!` macros.

use std::sync::{OnceLock, RwLock, Arc, Mutex};
use std::time::SystemTime;
use rustc_hash::FxHashMap;
use crate::graphics_device::GraphicsDevice;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Internal state holding the named devices
struct EngineState {
    graphics_devices: RwLock<FxHashMap<String, Arc<Mutex<dyn GraphicsDevice>>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            graphics_devices: RwLock::new(FxHashMap::default()),
        }
    }
}

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())))
}

// ===== PUBLIC API =====

/// Engine singleton manager
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_scenegraph::galaxy3d::{Engine, scene::{Scene, SceneConfig}};
///
/// # fn doc<B: galaxy_3d_scenegraph::galaxy3d::GraphicsDevice + 'static>(my_backend: B) -> galaxy_3d_scenegraph::galaxy3d::Result<()> {
/// Engine::initialize()?;
/// let device = Engine::create_graphics_device("main", my_backend)?;
/// let mut scene = Scene::new(device, SceneConfig::default());
/// scene.render()?;
/// Engine::shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before returning them
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("galaxy3d::Engine", "Initialization failed: {}", msg);
            }
            Error::BackendError(msg) => {
                crate::engine_error!("galaxy3d::Engine", "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!("galaxy3d::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| Self::log_and_return_error(
            Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
        ))
    }

    /// Initialize the engine (idempotent)
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop every registered device
    ///
    /// Scenes keep their own `Arc` and stay usable until dropped.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut devices) = state.graphics_devices.write() {
                devices.clear();
            }
        }
    }

    /// Register a graphics device under a unique name
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not initialized, the name is taken,
    /// or the registry lock is poisoned.
    pub fn create_graphics_device<D: GraphicsDevice + 'static>(
        name: &str,
        device: D,
    ) -> Result<Arc<Mutex<dyn GraphicsDevice>>> {
        let state = Self::state()?;
        let mut devices = state.graphics_devices.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice registry lock poisoned".to_string())
            ))?;

        if devices.contains_key(name) {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                format!("GraphicsDevice '{}' already exists", name)
            )));
        }

        let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(device));
        devices.insert(name.to_string(), Arc::clone(&device));

        crate::engine_info!("galaxy3d::Engine", "GraphicsDevice '{}' created", name);
        Ok(device)
    }

    /// Look up a registered graphics device
    pub fn graphics_device(name: &str) -> Result<Arc<Mutex<dyn GraphicsDevice>>> {
        let state = Self::state()?;
        let devices = state.graphics_devices.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice registry lock poisoned".to_string())
            ))?;

        devices.get(name).cloned().ok_or_else(|| Self::log_and_return_error(
            Error::NotFound(format!("GraphicsDevice '{}'", name))
        ))
    }

    /// Unregister a graphics device (no-op when the name is unknown)
    pub fn destroy_graphics_device(name: &str) -> Result<()> {
        let state = Self::state()?;
        let mut devices = state.graphics_devices.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice registry lock poisoned".to_string())
            ))?;

        if devices.remove(name).is_some() {
            crate::engine_info!("galaxy3d::Engine", "GraphicsDevice '{}' destroyed", name);
        }
        Ok(())
    }

    /// Number of registered graphics devices
    pub fn graphics_device_count() -> usize {
        ENGINE_STATE.get()
            .and_then(|state| state.graphics_devices.read().ok().map(|d| d.len()))
            .unwrap_or(0)
    }

    /// Reset all registrations for testing
    #[cfg(test)]
    pub fn reset_for_testing() {
        Self::shutdown();
    }

    // ===== LOGGING API =====

    /// Replace the global logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset the global logger to `DefaultLogger`
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(DefaultLogger::new());
        }
    }

    /// Log without file:line (used by engine_trace!..engine_warn!)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Log with file:line (used by engine_error!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
