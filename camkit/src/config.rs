//! Configuration types and defaults

use crate::error::CameraKitResult;
use camkit_core::{StreamConstraints, TrackSelector};
use camkit_media::{FallbackConfig, PartialFallbackConfig, StorageMethod};
use serde::{Deserialize, Serialize};

/// Library-wide settings
///
/// Owned by [`CameraKit`](crate::CameraKit); sessions copy them when built,
/// so later changes only affect new sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Where snapshots are persisted; disabled by default
    pub storage_method: StorageMethod,
    /// Emit debug logging
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_method: StorageMethod::Disabled,
            debug: false,
        }
    }
}

/// Options for [`CameraKit::create_capture_session`](crate::CameraKit::create_capture_session)
#[derive(Debug, Clone, Default)]
pub struct CaptureSessionOptions {
    /// Video input
    pub video: TrackSelector,
    /// Audio input
    pub audio: TrackSelector,
    /// Overrides for the software-encoder recording path
    pub fallback_config: PartialFallbackConfig,
}

impl CaptureSessionOptions {
    /// Options requesting nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the video input
    pub fn video(mut self, selector: impl Into<TrackSelector>) -> Self {
        self.video = selector.into();
        self
    }

    /// Select the audio input
    pub fn audio(mut self, selector: impl Into<TrackSelector>) -> Self {
        self.audio = selector.into();
        self
    }

    /// Override fallback encoder settings
    pub fn fallback_config(mut self, config: PartialFallbackConfig) -> Self {
        self.fallback_config = config;
        self
    }

    /// Resolve the selectors and check the fallback overrides
    ///
    /// Returns the stream request the session will issue.
    pub fn validate(&self) -> CameraKitResult<StreamConstraints> {
        let constraints = StreamConstraints::from_selectors(&self.video, &self.audio)?;

        let mut fallback = FallbackConfig::default();
        self.fallback_config.apply_to(&mut fallback);
        fallback.validate()?;

        Ok(constraints)
    }
}
