//! Backend over the platform's built-in stream recorder

use super::{Recording, RecordingOutput, RecordingStats};
use crate::error::{MediaError, MediaResult};
use crate::webm::repair_recording;
use bytes::Bytes;
use camkit_core::{CoreError, MediaStream};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// MIME type used until another is set
pub const DEFAULT_NATIVE_MIME_TYPE: &str = "video/webm;codecs=vp8";
/// Interval at which the recorder delivers data
pub const NATIVE_TIMESLICE: Duration = Duration::from_millis(10);
/// How long `stop` waits for the recorder to finish
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Event delivered by a platform recorder
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// A chunk of recorded data, possibly empty
    Data(Bytes),
    /// Recording finished; no more data follows
    Stopped,
    /// Non-fatal recorder error
    Error(String),
}

/// A platform recorder bound to one stream and MIME type
pub trait StreamRecorder: Send + Sync + fmt::Debug {
    /// Begin recording, delivering data every `timeslice`
    fn start(&self, timeslice: Duration) -> Result<(), String>;

    /// Suspend recording
    fn pause(&self);

    /// Continue after [`pause`](StreamRecorder::pause)
    fn resume(&self);

    /// Finish; the recorder flushes its data and then sends `Stopped`
    fn stop(&self);
}

/// A fresh recorder and its event channel
#[derive(Debug)]
pub struct NativeRecorderHandle {
    /// Recorder controls
    pub recorder: Box<dyn StreamRecorder>,
    /// Data and lifecycle events
    pub events: mpsc::UnboundedReceiver<RecorderEvent>,
}

/// Platform capability to record streams
pub trait NativeRecorderFactory: Send + Sync + fmt::Debug {
    /// Whether the platform has a working recorder at all
    fn is_available(&self) -> bool;

    /// Whether recordings in `mime_type` can be produced
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Whether created recorders can pause
    fn supports_pause(&self) -> bool {
        true
    }

    /// Create a recorder for `stream`
    fn create(&self, stream: &MediaStream, mime_type: &str) -> Result<NativeRecorderHandle, String>;
}

#[derive(Debug, Default)]
struct Collected {
    chunks: Vec<Bytes>,
    stats: RecordingStats,
}

/// Records through a [`NativeRecorderFactory`]
#[derive(Debug)]
pub struct NativeBackend {
    factory: Arc<dyn NativeRecorderFactory>,
    stream: MediaStream,
    mime_type: String,
    recorder: Option<Box<dyn StreamRecorder>>,
    collector: Option<JoinHandle<()>>,
    collected: Arc<Mutex<Collected>>,
    paused: bool,
    latest: Option<Recording>,
}

impl NativeBackend {
    /// Create an idle backend for `stream`
    pub fn new(factory: Arc<dyn NativeRecorderFactory>, stream: MediaStream) -> Self {
        Self {
            factory,
            stream,
            mime_type: DEFAULT_NATIVE_MIME_TYPE.to_string(),
            recorder: None,
            collector: None,
            collected: Arc::new(Mutex::new(Collected::default())),
            paused: false,
            latest: None,
        }
    }

    /// Use `mime_type` for the next recording; `false` if unsupported
    pub fn set_mime_type(&mut self, mime_type: &str) -> bool {
        if !self.factory.is_type_supported(mime_type) {
            return false;
        }
        self.mime_type = mime_type.to_string();
        true
    }

    /// MIME type of the next recording
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Start recording, or resume if paused
    ///
    /// Construction failures are logged and reported as `RecorderInit`; no
    /// recorder is kept in that case.
    pub fn start(&mut self) -> MediaResult<()> {
        if self.paused {
            self.resume();
            return Ok(());
        }

        self.abort();
        self.latest = None;

        let NativeRecorderHandle { recorder, mut events } = self
            .factory
            .create(&self.stream, &self.mime_type)
            .map_err(|reason| {
                error!("Exception while creating recorder: {}", reason);
                MediaError::RecorderInit {
                    mime_type: self.mime_type.clone(),
                    reason,
                }
            })?;
        debug!("Created native recorder for {}", self.mime_type);

        let collected = self.collected.clone();
        let collector = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    RecorderEvent::Data(data) if data.is_empty() => {}
                    RecorderEvent::Data(data) => {
                        let mut collected = collected.lock();
                        collected.stats.chunks_buffered += 1;
                        collected.stats.bytes_buffered += data.len();
                        collected.chunks.push(data);
                    }
                    RecorderEvent::Stopped => {
                        debug!("Recorder stopped");
                        break;
                    }
                    RecorderEvent::Error(e) => warn!("Recorder error: {}", e),
                }
            }
        });

        if let Err(reason) = recorder.start(NATIVE_TIMESLICE) {
            collector.abort();
            error!("Recorder failed to start: {}", reason);
            return Err(MediaError::RecorderInit {
                mime_type: self.mime_type.clone(),
                reason,
            });
        }

        self.recorder = Some(recorder);
        self.collector = Some(collector);
        info!("Native recorder started ({})", self.mime_type);
        Ok(())
    }

    /// Suspend recording when the platform supports it
    pub fn pause(&mut self) {
        match &self.recorder {
            Some(recorder) if self.factory.supports_pause() => {
                recorder.pause();
                self.paused = true;
            }
            Some(_) => warn!("Native recorder cannot pause"),
            None => {}
        }
    }

    /// Continue a paused recording
    pub fn resume(&mut self) {
        if let Some(recorder) = &self.recorder {
            recorder.resume();
            self.paused = false;
        }
    }

    /// Finish the recording and return it
    pub async fn stop(&mut self) -> MediaResult<RecordingOutput> {
        let recorder = self.recorder.take().ok_or_else(|| CoreError::InvalidState {
            message: "native recorder is not running".to_string(),
        })?;
        recorder.stop();

        if let Some(mut collector) = self.collector.take() {
            if tokio::time::timeout(STOP_TIMEOUT, &mut collector).await.is_err() {
                warn!("Recorder did not report stop within {:?}", STOP_TIMEOUT);
                collector.abort();
            }
        }
        self.paused = false;

        let chunks = std::mem::take(&mut self.collected.lock().chunks);
        let recording = repair_recording(Recording::from_chunks(&self.mime_type, &chunks));
        info!(
            "Native recording finished: {} bytes of {}",
            recording.data.len(),
            recording.mime_type
        );

        self.latest = Some(recording.clone());
        Ok(RecordingOutput {
            video: recording,
            audio: None,
        })
    }

    /// Discard any in-flight recording without finalizing it
    pub fn abort(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            recorder.stop();
            debug!("Aborted native recording");
        }
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        self.paused = false;
        self.collected = Arc::new(Mutex::new(Collected::default()));
    }

    /// Last finished recording
    pub fn latest_recording(&self) -> Option<&Recording> {
        self.latest.as_ref()
    }

    /// Whether a recorder is running
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Whether the recording is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether [`pause`](Self::pause) has an effect
    pub fn supports_pause(&self) -> bool {
        self.factory.supports_pause()
    }

    /// Buffer counters
    pub fn stats(&self) -> RecordingStats {
        self.collected.lock().stats
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        self.abort();
    }
}
