//! One recording lifecycle over whichever backend the platform supports

use super::{
    BackendKind, PartialFallbackConfig, Recording, RecordingBackend, RecordingEnvironment,
    RecordingStats,
};
use crate::download::{download_audio, download_video, DownloadSink};
use camkit_core::{MediaStream, StreamSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay between a video download and its audio companion
pub const AUDIO_DOWNLOAD_DELAY: Duration = Duration::from_millis(200);

/// Records a session's original or preview stream
///
/// At most one backend exists at a time. A fresh [`start`](Self::start)
/// discards the previous backend and its buffer; starting while paused
/// resumes instead.
#[derive(Debug)]
pub struct Recorder {
    environment: RecordingEnvironment,
    original: MediaStream,
    preview: MediaStream,
    fallback_config: PartialFallbackConfig,
    mime_type: Option<String>,
    backend: Option<RecordingBackend>,
    downloads: Arc<dyn DownloadSink>,
}

impl Recorder {
    /// Create a recorder over a session's two streams
    pub fn new(
        environment: RecordingEnvironment,
        original: MediaStream,
        preview: MediaStream,
        fallback_config: PartialFallbackConfig,
        downloads: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            environment,
            original,
            preview,
            fallback_config,
            mime_type: None,
            backend: None,
            downloads,
        }
    }

    fn stream(&self, source: StreamSource) -> &MediaStream {
        match source {
            StreamSource::Original => &self.original,
            StreamSource::Preview => &self.preview,
        }
    }

    /// Rebind one stream for future recordings
    pub fn set_stream(&mut self, source: StreamSource, stream: MediaStream) {
        match source {
            StreamSource::Original => self.original = stream,
            StreamSource::Preview => self.preview = stream,
        }
    }

    /// Start recording `source`, or resume a paused recording
    ///
    /// Returns whether a recording is running afterwards. Backend
    /// construction failures are logged and leave no backend behind.
    pub async fn start(&mut self, source: StreamSource) -> bool {
        if let Some(backend) = &mut self.backend {
            if backend.is_paused() {
                backend.resume();
                info!("Recording resumed");
                return true;
            }
        }

        if let Some(mut previous) = self.backend.take() {
            previous.abort();
            debug!("Discarded previous {} recorder", previous.kind());
        }

        let kind = self.environment.select_backend();
        let stream = self.stream(source).clone();
        let mut backend = match self
            .environment
            .create_backend(stream, &self.fallback_config)
        {
            Ok(backend) => backend,
            Err(e) => {
                error!("Could not create {} recorder: {}", kind, e);
                return false;
            }
        };

        if let Some(mime_type) = &self.mime_type {
            if !backend.set_mime_type(mime_type) {
                warn!("{} recorder rejected {}, using {}", kind, mime_type, backend.mime_type());
            }
        }

        match backend.start() {
            Ok(()) => {
                info!("Recording {} stream with {} recorder", source, kind);
                self.backend = Some(backend);
                true
            }
            Err(e) => {
                error!("Could not start {} recorder: {}", kind, e);
                false
            }
        }
    }

    /// Pause the current recording
    pub fn pause(&mut self) {
        if let Some(backend) = &mut self.backend {
            backend.pause();
            debug!("Recording paused");
        }
    }

    /// Finish the current recording
    ///
    /// `None` when nothing was ever started or nothing is running.
    pub async fn stop(&mut self) -> Option<Recording> {
        let backend = self.backend.as_mut()?;
        if !backend.is_recording() {
            return None;
        }
        match backend.stop().await {
            Ok(output) => Some(output.video),
            Err(e) => {
                warn!("Stopping recorder failed: {}", e);
                None
            }
        }
    }

    /// Discard the current recording without finalizing it
    pub fn abort(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.abort();
            info!("Recording aborted");
        }
    }

    /// Last finished recording
    pub fn latest_recording(&self) -> Option<Recording> {
        self.backend.as_ref()?.latest_recording().cloned()
    }

    /// Audio recorded alongside the last recording
    pub fn latest_audio_recording(&self) -> Option<Recording> {
        self.backend.as_ref()?.latest_audio_recording().cloned()
    }

    /// Download the last recording; `false` if there is none
    ///
    /// A parallel audio recording follows after [`AUDIO_DOWNLOAD_DELAY`].
    pub fn download_latest_recording(&self, filename: Option<&str>) -> bool {
        let Some(video) = self.latest_recording() else {
            return false;
        };

        if let Some(audio) = self.latest_audio_recording() {
            let sink = self.downloads.clone();
            let filename = filename.map(str::to_string);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        tokio::time::sleep(AUDIO_DOWNLOAD_DELAY).await;
                        download_audio(sink.as_ref(), &audio.mime_type, audio.data, filename.as_deref());
                    });
                }
                Err(_) => {
                    download_audio(sink.as_ref(), &audio.mime_type, audio.data, filename.as_deref());
                }
            }
        }

        download_video(self.downloads.as_ref(), &video.mime_type, video.data, filename)
    }

    /// Record future videos as `mime_type`
    ///
    /// Accepted only if the backend class that would be selected now
    /// supports it; the choice then applies to the current and every later
    /// backend.
    pub fn set_mime_type(&mut self, mime_type: &str) -> bool {
        let kind = self.environment.select_backend();
        if !self.environment.is_type_supported(kind, mime_type) {
            debug!("{} recorder does not support {}", kind, mime_type);
            return false;
        }

        if let Some(backend) = &mut self.backend {
            if backend.kind() == kind {
                backend.set_mime_type(mime_type);
            }
        }
        self.mime_type = Some(mime_type.to_string());
        true
    }

    /// MIME type the next recording will use
    pub fn mime_type(&self) -> String {
        self.mime_type.clone().unwrap_or_else(|| {
            RecordingEnvironment::default_mime_type(self.environment.select_backend()).to_string()
        })
    }

    /// Whether pausing has an effect on the backend in use or next selected
    pub fn can_pause(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.supports_pause(),
            None => self
                .environment
                .supports_pause(self.environment.select_backend()),
        }
    }

    /// Whether a recording is running
    pub fn is_recording(&self) -> bool {
        self.backend.as_ref().is_some_and(RecordingBackend::is_recording)
    }

    /// Whether the recording is paused
    pub fn is_paused(&self) -> bool {
        self.backend.as_ref().is_some_and(RecordingBackend::is_paused)
    }

    /// Buffer counters of the current recording
    pub fn stats(&self) -> RecordingStats {
        self.backend
            .as_ref()
            .map(RecordingBackend::stats)
            .unwrap_or_default()
    }

    /// Class of the backend in use, for diagnostics
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(RecordingBackend::kind)
    }
}
