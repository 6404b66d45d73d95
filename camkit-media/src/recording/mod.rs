//! Recording backends and the recorder facade
//!
//! Two backends share one lifecycle: [`NativeBackend`] wraps the platform's
//! stream recorder, [`FallbackBackend`] drives a software encoder worker.
//! [`Recorder`] picks one per fresh start based on what the
//! [`RecordingEnvironment`] offers.

pub mod encoder;
pub mod fallback;
pub mod native;
pub mod recorder;

pub use encoder::{
    EncoderParams, EncoderState, EncoderWorker, EncoderWorkerFactory, HostMessage,
    ProtocolViolation, WorkerEndpoint, WorkerMessage, WorkerState,
};
pub use fallback::{FallbackBackend, FallbackConfig, PartialFallbackConfig, FALLBACK_MIME_TYPE};
pub use native::{
    NativeBackend, NativeRecorderFactory, NativeRecorderHandle, RecorderEvent, StreamRecorder,
    DEFAULT_NATIVE_MIME_TYPE,
};
pub use recorder::Recorder;

use crate::error::MediaResult;
use bytes::{Bytes, BytesMut};
use camkit_core::MediaStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A finished recording
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Content type
    pub mime_type: String,
    /// Recorded bytes
    pub data: Bytes,
}

impl Recording {
    /// Concatenate chunks in order
    pub fn from_chunks(mime_type: &str, chunks: &[Bytes]) -> Self {
        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        Self {
            mime_type: mime_type.to_string(),
            data: data.freeze(),
        }
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of stopping a backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutput {
    /// The video recording
    pub video: Recording,
    /// Audio recorded in parallel, if any
    pub audio: Option<Recording>,
}

/// Buffer counters of the current recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Chunks kept for the recording
    pub chunks_buffered: u64,
    /// Chunks discarded while paused
    pub chunks_dropped: u64,
    /// Frames handed to the encoder
    pub frames_sent: u64,
    /// Bytes kept for the recording
    pub bytes_buffered: usize,
}

/// Which backend class is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform recorder
    Native,
    /// Software encoder worker
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Recording capabilities offered by the platform
#[derive(Debug, Clone)]
pub struct RecordingEnvironment {
    /// Built-in stream recorder, if the platform has one
    pub native: Option<Arc<dyn NativeRecorderFactory>>,
    /// Software encoder used without a native recorder
    pub encoder: Arc<dyn EncoderWorkerFactory>,
    /// Audio-only recorder run alongside the software encoder
    pub audio: Option<Arc<dyn NativeRecorderFactory>>,
}

impl RecordingEnvironment {
    /// Native when an available recorder exists, otherwise fallback
    pub fn select_backend(&self) -> BackendKind {
        match &self.native {
            Some(factory) if factory.is_available() => BackendKind::Native,
            _ => BackendKind::Fallback,
        }
    }

    /// Whether backends of class `kind` can produce `mime_type`
    pub fn is_type_supported(&self, kind: BackendKind, mime_type: &str) -> bool {
        match kind {
            BackendKind::Native => self
                .native
                .as_ref()
                .is_some_and(|factory| factory.is_type_supported(mime_type)),
            BackendKind::Fallback => FallbackBackend::is_type_supported(mime_type),
        }
    }

    /// Whether backends of class `kind` can pause
    pub fn supports_pause(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Native => self
                .native
                .as_ref()
                .is_some_and(|factory| factory.supports_pause()),
            BackendKind::Fallback => true,
        }
    }

    /// Default MIME type of backends of class `kind`
    pub fn default_mime_type(kind: BackendKind) -> &'static str {
        match kind {
            BackendKind::Native => DEFAULT_NATIVE_MIME_TYPE,
            BackendKind::Fallback => FALLBACK_MIME_TYPE,
        }
    }

    /// Construct an idle backend of the currently selected class
    pub fn create_backend(
        &self,
        stream: MediaStream,
        fallback_config: &PartialFallbackConfig,
    ) -> MediaResult<RecordingBackend> {
        match (self.select_backend(), &self.native) {
            (BackendKind::Native, Some(factory)) => Ok(RecordingBackend::Native(NativeBackend::new(
                factory.clone(),
                stream,
            ))),
            _ => Ok(RecordingBackend::Fallback(FallbackBackend::new(
                self.encoder.clone(),
                self.audio.clone(),
                stream,
                fallback_config,
            )?)),
        }
    }
}

/// The one active backend behind a [`Recorder`]
#[derive(Debug)]
pub enum RecordingBackend {
    /// Platform recorder
    Native(NativeBackend),
    /// Software encoder worker
    Fallback(FallbackBackend),
}

impl RecordingBackend {
    /// Backend class
    pub fn kind(&self) -> BackendKind {
        match self {
            RecordingBackend::Native(_) => BackendKind::Native,
            RecordingBackend::Fallback(_) => BackendKind::Fallback,
        }
    }

    /// Start recording, or resume if paused
    pub fn start(&mut self) -> MediaResult<()> {
        match self {
            RecordingBackend::Native(b) => b.start(),
            RecordingBackend::Fallback(b) => b.start(),
        }
    }

    /// Pause recording
    pub fn pause(&mut self) {
        match self {
            RecordingBackend::Native(b) => b.pause(),
            RecordingBackend::Fallback(b) => b.pause(),
        }
    }

    /// Resume a paused recording
    pub fn resume(&mut self) {
        match self {
            RecordingBackend::Native(b) => b.resume(),
            RecordingBackend::Fallback(b) => b.resume(),
        }
    }

    /// Finish and return the recording
    pub async fn stop(&mut self) -> MediaResult<RecordingOutput> {
        match self {
            RecordingBackend::Native(b) => b.stop().await,
            RecordingBackend::Fallback(b) => b.stop().await,
        }
    }

    /// Discard without finalizing
    pub fn abort(&mut self) {
        match self {
            RecordingBackend::Native(b) => b.abort(),
            RecordingBackend::Fallback(b) => b.abort(),
        }
    }

    /// Use `mime_type` for the next recording
    pub fn set_mime_type(&mut self, mime_type: &str) -> bool {
        match self {
            RecordingBackend::Native(b) => b.set_mime_type(mime_type),
            RecordingBackend::Fallback(b) => b.set_mime_type(mime_type),
        }
    }

    /// MIME type of the next recording
    pub fn mime_type(&self) -> &str {
        match self {
            RecordingBackend::Native(b) => b.mime_type(),
            RecordingBackend::Fallback(b) => b.mime_type(),
        }
    }

    /// Last finished recording
    pub fn latest_recording(&self) -> Option<&Recording> {
        match self {
            RecordingBackend::Native(b) => b.latest_recording(),
            RecordingBackend::Fallback(b) => b.latest_recording(),
        }
    }

    /// Audio recorded alongside the last recording
    pub fn latest_audio_recording(&self) -> Option<&Recording> {
        match self {
            RecordingBackend::Native(_) => None,
            RecordingBackend::Fallback(b) => b.latest_audio_recording(),
        }
    }

    /// Whether a recording is in progress
    pub fn is_recording(&self) -> bool {
        match self {
            RecordingBackend::Native(b) => b.is_recording(),
            RecordingBackend::Fallback(b) => b.is_recording(),
        }
    }

    /// Whether the recording is paused
    pub fn is_paused(&self) -> bool {
        match self {
            RecordingBackend::Native(b) => b.is_paused(),
            RecordingBackend::Fallback(b) => b.is_paused(),
        }
    }

    /// Whether pausing has an effect
    pub fn supports_pause(&self) -> bool {
        match self {
            RecordingBackend::Native(b) => b.supports_pause(),
            RecordingBackend::Fallback(_) => true,
        }
    }

    /// Buffer counters
    pub fn stats(&self) -> RecordingStats {
        match self {
            RecordingBackend::Native(b) => b.stats(),
            RecordingBackend::Fallback(b) => b.stats(),
        }
    }
}
