//! Error types for the Galaxy3D scene graph
//!
//! Per-frame problems (missing camera, resources not ready yet) are logged and
//! degrade the frame instead of surfacing here. `Error` covers construction
//! failures, device failures and refused API calls.

use std::fmt;

/// Result type for Galaxy3D operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Graphics backend error (device lock, resource creation, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, effect, geometry, ...)
    InvalidResource(String),

    /// Initialization failed (engine, device, subsystems)
    InitializationFailed(String),

    /// Operation refused because it would break a scene invariant
    InvalidOperation(String),

    /// A key or name does not refer to a live object
    NotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error and build an `Error::BackendError` from the same message
///
/// # Example
///
/// ```no_run
/// # use galaxy_3d_scenegraph::engine_err;
/// # let key = 0u32;
/// let err = engine_err!("galaxy3d::Scene", "Unknown mesh {:?}", key);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::galaxy3d::Error::BackendError(message)
    }};
}

/// Log an error and return early with an `Error::BackendError`
///
/// # Example
///
/// ```no_run
/// # use galaxy_3d_scenegraph::engine_bail;
/// # fn doc(id: u32) -> galaxy_3d_scenegraph::galaxy3d::Result<()> {
/// engine_bail!("galaxy3d::mock", "buffer {} out of range", id);
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
