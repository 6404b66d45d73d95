//! Top-level error type

use crate::session::SessionState;
use camkit_core::{CoreError, ErrorCategory};
use camkit_media::MediaError;
use thiserror::Error;

/// Errors returned by [`CameraKit`](crate::CameraKit) and
/// [`CaptureSession`](crate::CaptureSession)
#[derive(Error, Debug)]
pub enum CameraKitError {
    /// Source, constraint or stream failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot, recording or storage failure
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Operation not allowed in the session's current state
    #[error("Session is {actual}, expected {expected}")]
    InvalidState {
        /// States the operation accepts
        expected: String,
        /// State the session was in
        actual: SessionState,
    },

    /// Logging could not be set up
    #[cfg(feature = "diagnostics")]
    #[error(transparent)]
    Logging(#[from] camkit_diagnostics::LoggingError),
}

/// Result type alias for camkit operations
pub type CameraKitResult<T> = Result<T, CameraKitError>;

impl CameraKitError {
    /// Check if error is recoverable without caller intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            CameraKitError::Core(e) => e.is_recoverable(),
            CameraKitError::Media(e) => e.is_recoverable(),
            CameraKitError::InvalidState { .. } => false,
            #[cfg(feature = "diagnostics")]
            CameraKitError::Logging(e) => e.is_recoverable(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CameraKitError::Core(e) => e.category(),
            CameraKitError::Media(e) => e.category(),
            CameraKitError::InvalidState { .. } => ErrorCategory::State,
            #[cfg(feature = "diagnostics")]
            CameraKitError::Logging(e) => e.category(),
        }
    }
}
