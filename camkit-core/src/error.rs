//! Error types for capture sources, constraints and streams
//!
//! Every failure surfaced to callers is a typed variant so UI layers can
//! branch on the kind of problem instead of parsing platform messages.

use crate::stream::StreamSource;
use thiserror::Error;

/// Failure reported by a [`SourceProvider`](crate::provider::SourceProvider)
/// when a stream request cannot be satisfied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The user or the platform refused access to the device
    #[error("permission denied")]
    PermissionDenied,

    /// No device matches the requested constraints
    #[error("no device matches the requested constraints")]
    NotFound,

    /// A constraint could not be satisfied by any device
    #[error("constraint `{constraint}` cannot be satisfied")]
    Overconstrained {
        /// Name of the offending constraint
        constraint: String,
    },

    /// Any other platform failure
    #[error("{0}")]
    Other(String),
}

/// Main error type for capture source and stream operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The platform device list could not be queried
    #[error("Device enumeration failed: {reason}")]
    DeviceEnumeration {
        /// Failure reason
        reason: String,
    },

    /// Permission was denied or no matching device is available
    #[error("Media access failed: {reason}")]
    MediaAccess {
        /// Underlying acquisition failure
        #[from]
        reason: AcquisitionError,
    },

    /// A symbolic selector other than `front` / `back` was supplied
    #[error("Invalid track selector: {selector}")]
    InvalidSelector {
        /// The rejected selector
        selector: String,
    },

    /// Neither a video nor an audio source was provided
    #[error("No media source provided to stream")]
    NoMediaSource,

    /// The selected stream carries no video track
    #[error("No video track on {stream} stream")]
    NoVideoTrack {
        /// Stream that was inspected
        stream: StreamSource,
    },

    /// The video feed has not produced a frame yet
    #[error("No frame available: feed reports {width}x{height}")]
    NoFrameAvailable {
        /// Reported feed width
        width: u32,
        /// Reported feed height
        height: u32,
    },

    /// A track rejected a constraint update
    #[error("Constraint could not be applied: {constraint} - {reason}")]
    Constraint {
        /// Constraint name
        constraint: String,
        /// Failure reason
        reason: String,
    },

    /// Operation attempted in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Check if error is recoverable without caller intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            CoreError::DeviceEnumeration { .. } => true,
            CoreError::NoFrameAvailable { .. } => true,
            CoreError::Constraint { .. } => true,
            CoreError::MediaAccess { reason } => {
                matches!(reason, AcquisitionError::Overconstrained { .. })
            }
            CoreError::InvalidSelector { .. } => false,
            CoreError::NoMediaSource => false,
            CoreError::NoVideoTrack { .. } => false,
            CoreError::InvalidState { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::DeviceEnumeration { .. } => ErrorCategory::Device,
            CoreError::MediaAccess { reason } => match reason {
                AcquisitionError::PermissionDenied => ErrorCategory::Permission,
                _ => ErrorCategory::Device,
            },
            CoreError::InvalidSelector { .. } => ErrorCategory::Configuration,
            CoreError::NoMediaSource => ErrorCategory::Configuration,
            CoreError::NoVideoTrack { .. } => ErrorCategory::Stream,
            CoreError::NoFrameAvailable { .. } => ErrorCategory::Stream,
            CoreError::Constraint { .. } => ErrorCategory::Stream,
            CoreError::InvalidState { .. } => ErrorCategory::State,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Device discovery and availability
    Device,
    /// Access refused by the user or platform
    Permission,
    /// Caller-supplied configuration or selectors
    Configuration,
    /// Live stream and track problems
    Stream,
    /// Lifecycle misuse
    State,
    /// Recording backends and encoders
    Recording,
    /// Persistence and side effects
    Storage,
}
