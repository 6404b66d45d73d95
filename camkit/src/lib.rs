//! # camkit - camera capture toolkit
//!
//! camkit enumerates cameras and microphones, opens a capture session with a
//! primary stream and a preview clone, takes PNG snapshots and records
//! video. Recording uses the platform's native recorder when one exists and
//! falls back to an external software encoder otherwise; either way the
//! result is a seekable WebM.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camkit::{CameraKit, CaptureSessionOptions, ListOptions, Platform, StreamSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kit = CameraKit::new(Platform::mock().platform);
//!
//!     let devices = kit.get_devices(&ListOptions::default()).await?;
//!     let camera = devices.video_sources.first().cloned();
//!     let microphone = devices.audio_sources.first().cloned();
//!
//!     let mut session = kit
//!         .create_capture_session(CaptureSessionOptions::new().video(camera).audio(microphone))
//!         .await?;
//!
//!     let recorder = session.recorder_mut().expect("session is live");
//!     recorder.start(StreamSource::Original).await;
//!     let recording = recorder.stop().await;
//!     println!("Recorded {:?} bytes", recording.map(|r| r.len()));
//!
//!     session.destroy();
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use camkit_core::{
    list_sources, AcquisitionError, CaptureSource, ConstrainValue, CoreError, ErrorCategory,
    FacingMode, ListOptions, MediaStream, SourceKind, SourceList, StreamConstraints,
    StreamSource, TrackConstraints, TrackSelector, VideoSpecs,
};

pub use camkit_media::{
    BackendKind, CaptureOptions, DownloadPayload, EncodedImage, MediaError,
    PartialFallbackConfig, Recorder, Recording, RecordingStats, Shutter, StorageMethod,
};

#[cfg(feature = "diagnostics")]
pub use camkit_diagnostics::{DebugLogger, LoggingConfig};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod session;

// Re-export main API types
pub use config::{CaptureSessionOptions, Settings};
pub use error::{CameraKitError, CameraKitResult};
pub use event::{SessionEvent, SubscriptionId};
pub use platform::{MockPlatform, Platform};
pub use session::{CaptureSession, ResolutionRequest, SessionState, SourceRequest};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Main entry point for camkit
///
/// Cheap to clone; clones share settings and the installed logger.
#[derive(Debug, Clone)]
pub struct CameraKit {
    platform: Platform,
    settings: Arc<RwLock<Settings>>,
    #[cfg(feature = "diagnostics")]
    logger: Arc<RwLock<Option<DebugLogger>>>,
}

impl CameraKit {
    /// Create with default settings
    pub fn new(platform: Platform) -> Self {
        Self::with_settings(platform, Settings::default())
    }

    /// Create with custom settings
    pub fn with_settings(platform: Platform, settings: Settings) -> Self {
        Self {
            platform,
            settings: Arc::new(RwLock::new(settings)),
            #[cfg(feature = "diagnostics")]
            logger: Arc::new(RwLock::new(None)),
        }
    }

    /// Install the global `[CK-WEB]` subscriber, honouring the debug setting
    #[cfg(feature = "diagnostics")]
    pub fn init_logging(&self) -> CameraKitResult<()> {
        let config = LoggingConfig {
            debug: self.settings.read().debug,
            ..Default::default()
        };
        let logger = DebugLogger::init(&config)?;
        *self.logger.write() = Some(logger);
        Ok(())
    }

    /// Audio and video inputs visible to the platform
    pub async fn get_devices(&self, options: &ListOptions) -> CameraKitResult<SourceList> {
        Ok(list_sources(self.platform.sources.as_ref(), options).await?)
    }

    /// Build and initialize a capture session
    ///
    /// The session keeps a copy of the current settings.
    pub async fn create_capture_session(
        &self,
        options: CaptureSessionOptions,
    ) -> CameraKitResult<CaptureSession> {
        let mut session = CaptureSession::new(self.platform.clone(), self.settings(), options)?;
        session.init().await?;
        Ok(session)
    }

    /// Persist snapshots in future sessions; local storage when `None`
    pub fn enable_storage(&self, method: Option<StorageMethod>) {
        let method = method.unwrap_or(StorageMethod::Local);
        self.settings.write().storage_method = method;
        debug!("Image storage set to {:?}", method);
    }

    /// Stop persisting snapshots in future sessions
    pub fn disable_storage(&self) {
        self.settings.write().storage_method = StorageMethod::Disabled;
        debug!("Image storage disabled");
    }

    /// Switch debug logging on or off
    pub fn set_debug(&self, debug: bool) {
        self.settings.write().debug = debug;

        #[cfg(feature = "diagnostics")]
        {
            if let Some(logger) = self.logger.read().as_ref() {
                if let Err(e) = logger.set_debug(debug) {
                    tracing::warn!("Could not switch debug logging: {}", e);
                }
            }
        }
        let state = if debug { "enabled" } else { "disabled" };
        info!("Debug logging {}", state);
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Collaborators this instance runs against
    pub fn platform(&self) -> &Platform {
        &self.platform
    }
}
