//! # camkit core
//!
//! Capture sources, track constraints and the live media stream model.
//! This crate is the platform seam of the toolkit: everything that talks to
//! cameras and microphones goes through [`SourceProvider`] and
//! [`MediaTrack`], so the recording and session layers never touch a
//! platform API directly.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod constraints;
pub mod devices;
pub mod error;
pub mod mock;
pub mod provider;
pub mod stream;
pub mod track;

// Re-export main types
pub use constraints::{
    resolve, ConstrainValue, FacingMode, StreamConstraints, TrackConstraints, TrackSelector,
};
pub use devices::{
    list_sources, CaptureSource, ListOptions, SourceKind, SourceList, UNNAMED_AUDIO_INPUT,
    UNNAMED_VIDEO_INPUT,
};
pub use error::{AcquisitionError, CoreError, CoreResult, ErrorCategory};
pub use provider::{DeviceDescriptor, DeviceKind, SourceProvider};
pub use stream::{MediaStream, StreamSource, VideoFeed, VideoSpecs};
pub use track::{MediaTrack, TrackKind, TrackSettings, TrackState, VideoFrame};
