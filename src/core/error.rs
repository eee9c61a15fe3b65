//! Engine error taxonomy
//!
//! Errors are surfaced to the host shell as observable state, never as
//! process termination. A failed `start()` leaves the engine stopped but
//! resumable; calling it again after the condition is fixed succeeds.

use thiserror::Error;

/// Errors the engine reports to the host shell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Accessibility trust or capture authorization is missing.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The notification-rendering process is not running.
    #[error("notification source unavailable: {0}")]
    SourceUnavailable(String),

    /// No usable capture device, or the device rejected an operation.
    #[error("capture resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The watch list or configuration could not be read or written.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl EngineError {
    /// True for errors fixed by granting an OS permission.
    pub fn is_permission(&self) -> bool {
        matches!(self, EngineError::PermissionDenied(_))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
