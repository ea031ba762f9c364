//! Renderer configuration

use crate::error::{Error, Result};

/// Which validation layer messages are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugSeverity {
    ErrorsOnly,
    #[default]
    ErrorsAndWarnings,
    All,
}

/// Where validation layer messages go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DebugOutput {
    #[default]
    Console,
    /// Append to a log file
    File(String),
    /// Console and log file
    Both(String),
}

/// Validation message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters collected by the validation messenger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Renderer configuration
///
/// # Example
///
/// ```no_run
/// use ember_engine::ember::RendererConfig;
///
/// let config = RendererConfig::default()
///     .with_frames_in_flight(3)
///     .with_vsync(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Number of frames the CPU may record ahead of the GPU (synchronization ring size)
    pub frames_in_flight: usize,

    /// Timeout for image acquisition in nanoseconds (`u64::MAX` = wait forever)
    pub acquire_timeout_ns: u64,

    /// Force strict FIFO presentation
    pub vsync: bool,

    /// Enable validation/debug layers
    pub enable_validation: bool,

    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,

    /// Panic on the first validation error
    pub panic_on_validation_error: bool,

    /// Abort the process on a validation error (for debugger attachment)
    pub break_on_validation_error: bool,

    /// Count validation messages
    pub enable_validation_stats: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            acquire_timeout_ns: u64::MAX,
            vsync: false,
            enable_validation: cfg!(debug_assertions),
            app_name: "Ember Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: DebugSeverity::default(),
            debug_output: DebugOutput::default(),
            debug_message_filter: DebugMessageFilter::default(),
            panic_on_validation_error: false,
            break_on_validation_error: false,
            enable_validation_stats: cfg!(debug_assertions),
        }
    }
}

impl RendererConfig {
    pub fn with_frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight;
        self
    }

    pub fn with_acquire_timeout_ns(mut self, timeout_ns: u64) -> Self {
        self.acquire_timeout_ns = timeout_ns;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_app_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.app_version = (major, minor, patch);
        self
    }

    pub fn with_debug_severity(mut self, severity: DebugSeverity) -> Self {
        self.debug_severity = severity;
        self
    }

    pub fn with_debug_output(mut self, output: DebugOutput) -> Self {
        self.debug_output = output;
        self
    }

    pub fn with_panic_on_validation_error(mut self, panic: bool) -> Self {
        self.panic_on_validation_error = panic;
        self
    }

    /// Check the configuration before any GPU object is created
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InvalidResource(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.acquire_timeout_ns == 0 {
            return Err(Error::InvalidResource(
                "acquire_timeout_ns must be non-zero".to_string(),
            ));
        }
        match &self.debug_output {
            DebugOutput::File(path) | DebugOutput::Both(path) if path.is_empty() => {
                Err(Error::InvalidResource(
                    "debug output file path is empty".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
