//! WebM finalization
//!
//! Recorders emit WebM incrementally, so the file has no duration and no
//! cue index and players cannot seek in it. [`make_seekable`] rebuilds the
//! segment metadata from the clusters; [`repair_recording`] applies it to a
//! finished recording and falls back to the original bytes on failure.

pub mod ebml;
mod repair;

pub use repair::{make_seekable, probe, CuePoint, WebmInfo};

use crate::recording::Recording;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure while parsing or rewriting a WebM file
///
/// Never surfaced to callers; a failed repair yields the unrepaired bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// The data does not start with an EBML header and a Segment
    #[error("Not a WebM file: {reason}")]
    NotWebm {
        /// What was found instead
        reason: String,
    },

    /// Data ended inside an element header
    #[error("Truncated element at offset {offset}")]
    Truncated {
        /// Offset of the incomplete header
        offset: usize,
    },

    /// A variable-length integer is malformed
    #[error("Invalid variable-length integer at offset {offset}")]
    InvalidVint {
        /// Offset of the integer
        offset: usize,
    },

    /// An element whose extent must be known has unknown size
    #[error("Element {id:#x} has unknown size")]
    UnknownSize {
        /// Element ID
        id: u32,
    },

    /// Structurally invalid content
    #[error("Malformed WebM: {reason}")]
    Malformed {
        /// Failure reason
        reason: String,
    },
}

/// Whether finalization applies to this MIME type
pub fn is_webm(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("video/webm") || essence.eq_ignore_ascii_case("audio/webm")
}

/// Make a finished recording seekable, keeping its MIME type
///
/// Non-WebM recordings and recordings that fail to parse are returned as-is.
pub fn repair_recording(recording: Recording) -> Recording {
    if !is_webm(&recording.mime_type) {
        return recording;
    }

    match make_seekable(&recording.data) {
        Ok(data) => {
            debug!(
                "Injected WebM metadata: {} -> {} bytes",
                recording.data.len(),
                data.len()
            );
            Recording {
                mime_type: recording.mime_type,
                data,
            }
        }
        Err(e) => {
            warn!("WebM metadata repair failed, keeping unrepaired recording: {}", e);
            recording
        }
    }
}
