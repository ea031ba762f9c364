//! Error types for the Ember engine
//!
//! Every fallible operation in the engine returns [`Result`]. The variants split
//! into two families:
//!
//! - **Retryable**: [`Error::SwapchainStale`]. The presentation chain no longer
//!   matches the surface and has to be rebuilt. The frame loop absorbs these.
//! - **Fatal**: everything else. They indicate device loss, host
//!   misconfiguration or a programming error and are propagated to the caller.

use std::fmt;

/// Result type for Ember engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a swapchain was reported stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The presentation engine can no longer present to the surface with this chain
    OutOfDate,
    /// The chain still works but no longer matches the surface exactly
    Suboptimal,
    /// The window reported a resize
    Resized,
    /// The surface currently has a zero-sized extent (minimized window)
    ZeroExtent,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::OutOfDate => write!(f, "out of date"),
            StaleReason::Suboptimal => write!(f, "suboptimal"),
            StaleReason::Resized => write!(f, "window resized"),
            StaleReason::ZeroExtent => write!(f, "zero-sized surface"),
        }
    }
}

/// Ember engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or invalid parameter
    InvalidResource(String),

    /// Initialization failed (instance, device, window)
    InitializationFailed(String),

    /// The surface cannot host a swapchain (no formats or no present modes)
    SurfaceIncompatible(String),

    /// A GPU object (chain, view, semaphore, fence, framebuffer...) could not be created
    ResourceCreationFailed(String),

    /// The graphics queue rejected a submission
    SubmissionFailed(String),

    /// The logical device was lost
    DeviceLost(String),

    /// The swapchain must be recreated before rendering can continue
    SwapchainStale(StaleReason),
}

impl Error {
    /// True when the error is absorbed by swapchain recreation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SwapchainStale(_))
    }

    /// True when the error terminates the render session
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::SurfaceIncompatible(msg) => write!(f, "Surface incompatible: {}", msg),
            Error::ResourceCreationFailed(msg) => write!(f, "Resource creation failed: {}", msg),
            Error::SubmissionFailed(msg) => write!(f, "Submission failed: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::SwapchainStale(reason) => write!(f, "Swapchain stale: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR (with file:line) and build an [`Error::BackendError`] from the same message
///
/// # Example
///
/// ```no_run
/// use ember_engine::engine_err;
///
/// let err = engine_err!("ember::vulkan", "Failed to wait idle: {}", "VK_ERROR_DEVICE_LOST");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::ember::Engine::log_detailed(
            $crate::ember::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::ember::Error::BackendError(message)
    }};
}

/// Log an ERROR and return early with an [`Error::BackendError`]
///
/// # Example
///
/// ```no_run
/// use ember_engine::engine_bail;
///
/// fn check(count: usize) -> ember_engine::ember::Result<()> {
///     if count == 0 {
///         engine_bail!("ember::Swapchain", "Swapchain reported {} images", count);
///     }
///     Ok(())
/// }
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
