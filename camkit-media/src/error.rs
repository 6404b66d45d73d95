//! Media error types and handling
//!
//! Snapshot, storage, download and recording failures. Errors from the
//! capture layer are wrapped unchanged so callers keep the original kind.

use camkit_core::{CoreError, ErrorCategory};
use thiserror::Error;

/// Main error type for snapshot and recording operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// Capture-layer failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A recorder could not be constructed for the stream and MIME type
    #[error("Recorder initialization failed for {mime_type}: {reason}")]
    RecorderInit {
        /// Requested MIME type
        mime_type: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Still-image or video encoding failed
    #[error("Encoding failed: {format} - {reason}")]
    Encoding {
        /// Target format
        format: String,
        /// Failure reason
        reason: String,
    },

    /// Image storage could not be read or written
    #[error("Storage error: {message}")]
    Storage {
        /// Error message
        message: String,
    },

    /// JSON (de)serialization failed
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying serde failure
        #[from]
        source: serde_json::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O failure
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable without caller intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Core(e) => e.is_recoverable(),
            MediaError::RecorderInit { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::Encoding { .. } => true,
            MediaError::Storage { .. } => true,
            MediaError::Serialization { .. } => true,
            MediaError::Io { .. } => true,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Core(e) => e.category(),
            MediaError::RecorderInit { .. } => ErrorCategory::Recording,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::Encoding { .. } => ErrorCategory::Recording,
            MediaError::Storage { .. } => ErrorCategory::Storage,
            MediaError::Serialization { .. } => ErrorCategory::Storage,
            MediaError::Io { .. } => ErrorCategory::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camkit_core::StreamSource;

    #[test]
    fn test_core_errors_keep_their_category() {
        let error = MediaError::from(CoreError::NoVideoTrack {
            stream: StreamSource::Original,
        });
        assert_eq!(error.category(), ErrorCategory::Stream);
        assert_eq!(error.to_string(), "No video track on original stream");
    }

    #[test]
    fn test_recorder_init_is_fatal() {
        let error = MediaError::RecorderInit {
            mime_type: "video/mp4".to_string(),
            reason: "unsupported".to_string(),
        };
        assert_eq!(error.category(), ErrorCategory::Recording);
        assert!(!error.is_recoverable());
    }
}
