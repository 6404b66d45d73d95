//! Capture session: one primary stream, its preview clone, and the shutter
//! and recorder bound to them

use crate::config::{CaptureSessionOptions, Settings};
use crate::error::{CameraKitError, CameraKitResult};
use crate::event::{EventListeners, SessionEvent, SubscriptionId};
use crate::platform::Platform;
use camkit_core::{
    ConstrainValue, CoreError, MediaStream, StreamConstraints, StreamSource, TrackConstraints,
    TrackSelector, VideoFeed,
};
use camkit_media::{PartialFallbackConfig, Recorder, Shutter};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`CaptureSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Built, no stream requested yet
    Uninitialized,
    /// Waiting for the platform to grant the stream
    Initializing,
    /// Streams open, shutter and recorder ready
    Live,
    /// Tracks released
    Destroyed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Live => write!(f, "live"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// New frame size for one of the session's streams
///
/// Values are applied as ideal constraints, so the platform may pick the
/// nearest supported mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionRequest {
    /// Frame width in pixels
    pub width: Option<u32>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Width divided by height
    pub aspect_ratio: Option<f64>,
    /// Stream to change
    pub source: StreamSource,
}

impl ResolutionRequest {
    fn constraints(&self) -> TrackConstraints {
        TrackConstraints {
            width: self.width.map(ConstrainValue::Ideal),
            height: self.height.map(ConstrainValue::Ideal),
            aspect_ratio: self.aspect_ratio.map(ConstrainValue::Ideal),
            ..Default::default()
        }
    }
}

/// Replacement inputs for one of the session's streams
#[derive(Debug, Clone, Default)]
pub struct SourceRequest {
    /// Video input
    pub video: TrackSelector,
    /// Audio input
    pub audio: TrackSelector,
    /// Stream to replace
    pub source: StreamSource,
}

/// Streams and the components reading them; present only while live
#[derive(Debug)]
struct LiveMedia {
    original: MediaStream,
    preview: MediaStream,
    shutter: Shutter,
    recorder: Recorder,
}

impl LiveMedia {
    fn stream(&self, source: StreamSource) -> &MediaStream {
        match source {
            StreamSource::Original => &self.original,
            StreamSource::Preview => &self.preview,
        }
    }
}

/// A live camera session
///
/// Dropping a live session releases its tracks.
#[derive(Debug)]
pub struct CaptureSession {
    id: String,
    platform: Platform,
    settings: Settings,
    constraints: StreamConstraints,
    fallback_config: PartialFallbackConfig,
    state: SessionState,
    media: Option<LiveMedia>,
    listeners: EventListeners,
}

impl CaptureSession {
    /// Validate `options` and build an uninitialized session
    ///
    /// Fails fast with `NoMediaSource` or `InvalidSelector`.
    pub fn new(
        platform: Platform,
        settings: Settings,
        options: CaptureSessionOptions,
    ) -> CameraKitResult<Self> {
        let constraints = options.validate()?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform,
            settings,
            constraints,
            fallback_config: options.fallback_config,
            state: SessionState::Uninitialized,
            media: None,
            listeners: EventListeners::default(),
        })
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Settings captured when the session was built
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Request the primary stream and build the preview, shutter and recorder
    ///
    /// Allowed from `Uninitialized` and `Destroyed`. On acquisition failure
    /// the session returns to the state it was in.
    pub async fn init(&mut self) -> CameraKitResult<()> {
        let prior = self.state;
        if !matches!(prior, SessionState::Uninitialized | SessionState::Destroyed) {
            return Err(CameraKitError::InvalidState {
                expected: "uninitialized or destroyed".to_string(),
                actual: prior,
            });
        }

        self.state = SessionState::Initializing;
        let original = match self.platform.sources.request_stream(&self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = prior;
                warn!("Session {} could not open its stream: {}", self.id, e);
                return Err(CoreError::from(e).into());
            }
        };
        let preview = original.clone_tracks();

        let shutter = Shutter::new(
            VideoFeed::attach(original.clone()),
            VideoFeed::attach(preview.clone()),
            self.platform.downloads.clone(),
        )
        .with_storage(self.platform.storage.clone(), self.settings.storage_method);

        let recorder = Recorder::new(
            self.platform.recording.clone(),
            original.clone(),
            preview.clone(),
            self.fallback_config.clone(),
            self.platform.downloads.clone(),
        );

        let stream_id = original.id().to_string();
        self.media = Some(LiveMedia {
            original,
            preview,
            shutter,
            recorder,
        });
        self.state = SessionState::Live;

        info!("Capture session {} live on stream {}", self.id, stream_id);
        self.listeners.emit(&SessionEvent::Initialized { stream_id });
        Ok(())
    }

    fn live(&self) -> CameraKitResult<&LiveMedia> {
        match &self.media {
            Some(media) if self.state == SessionState::Live => Ok(media),
            _ => Err(self.not_live()),
        }
    }

    fn live_mut(&mut self) -> CameraKitResult<&mut LiveMedia> {
        let state = self.state;
        match &mut self.media {
            Some(media) if state == SessionState::Live => Ok(media),
            _ => Err(CameraKitError::InvalidState {
                expected: SessionState::Live.to_string(),
                actual: state,
            }),
        }
    }

    fn not_live(&self) -> CameraKitError {
        CameraKitError::InvalidState {
            expected: SessionState::Live.to_string(),
            actual: self.state,
        }
    }

    /// Change the frame size of one stream's video track
    pub async fn set_resolution(&self, request: ResolutionRequest) -> CameraKitResult<()> {
        let media = self.live()?;
        let track = media
            .stream(request.source)
            .first_video_track()
            .ok_or(CoreError::NoVideoTrack {
                stream: request.source,
            })?;

        track.apply_constraints(&request.constraints()).await?;
        debug!(
            "Resolution of {} stream set to {:?}x{:?}",
            request.source, request.width, request.height
        );
        Ok(())
    }

    /// Replace one stream with a newly requested one
    ///
    /// The replaced stream's tracks are not stopped; callers holding it
    /// must release it themselves.
    pub async fn set_source(&mut self, request: SourceRequest) -> CameraKitResult<()> {
        self.live()?;
        let constraints = StreamConstraints::from_selectors(&request.video, &request.audio)?;
        let stream = self
            .platform
            .sources
            .request_stream(&constraints)
            .await
            .map_err(CoreError::from)?;

        let source = request.source;
        let stream_id = stream.id().to_string();
        let media = self.live_mut()?;
        match source {
            StreamSource::Original => media.original = stream.clone(),
            StreamSource::Preview => media.preview = stream.clone(),
        }
        media
            .shutter
            .set_feed(source, VideoFeed::attach(stream.clone()));
        media.recorder.set_stream(source, stream);

        if source == StreamSource::Original {
            self.constraints = constraints;
        }

        info!("Session {} {} source changed", self.id, source);
        self.listeners
            .emit(&SessionEvent::SourceChanged { source, stream_id });
        Ok(())
    }

    /// One of the session's streams
    pub fn media_stream(&self, source: StreamSource) -> Option<&MediaStream> {
        self.media.as_ref().map(|media| media.stream(source))
    }

    /// Audio-free copy of a stream for display
    ///
    /// The copy has its own tracks; the caller must stop them.
    pub fn preview(&self, source: StreamSource) -> CameraKitResult<MediaStream> {
        Ok(self.live()?.stream(source).video_only_clone())
    }

    /// Snapshot component
    pub fn shutter(&self) -> Option<&Shutter> {
        self.media.as_ref().map(|media| &media.shutter)
    }

    /// Snapshot component, mutably
    pub fn shutter_mut(&mut self) -> Option<&mut Shutter> {
        self.media.as_mut().map(|media| &mut media.shutter)
    }

    /// Recording component
    pub fn recorder(&self) -> Option<&Recorder> {
        self.media.as_ref().map(|media| &media.recorder)
    }

    /// Recording component, mutably
    pub fn recorder_mut(&mut self) -> Option<&mut Recorder> {
        self.media.as_mut().map(|media| &mut media.recorder)
    }

    /// Abort any recording and stop every track of both streams
    ///
    /// No-op unless the session is live.
    pub fn destroy(&mut self) {
        if self.state != SessionState::Live {
            return;
        }

        if let Some(mut media) = self.media.take() {
            media.recorder.abort();
            media.original.stop_all();
            media.preview.stop_all();
        }
        self.state = SessionState::Destroyed;

        info!("Capture session {} destroyed", self.id);
        self.listeners.emit(&SessionEvent::Destroyed);
    }

    /// Register a callback for lifecycle events
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(callback)
    }

    /// Remove a callback; `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.destroy();
    }
}
