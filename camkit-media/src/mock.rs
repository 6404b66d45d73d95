//! Scripted recorders and encoder workers for tests and headless use
//!
//! [`MockRecorderFactory`] stands in for a platform stream recorder; tests
//! push data through [`MockRecorderFactory::emit`]. [`ScriptedEncoderFactory`]
//! hands the worker end of each spawned encoder to the test, while
//! [`MockEncoderFactory`] runs a worker that answers every frame with a
//! chunk on its own.

use crate::error::{MediaError, MediaResult};
use crate::recording::encoder::{EncoderWorker, EncoderWorkerFactory, HostMessage, WorkerEndpoint};
use crate::recording::native::{
    NativeRecorderFactory, NativeRecorderHandle, RecorderEvent, StreamRecorder,
};
use bytes::Bytes;
use camkit_core::MediaStream;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle of a [`MockStreamRecorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRecorderStatus {
    /// Created, not started
    Inactive,
    /// Delivering data
    Recording,
    /// Suspended
    Paused,
    /// Finished
    Stopped,
}

#[derive(Debug)]
struct RecorderShared {
    mime_type: String,
    stream_id: String,
    status: Mutex<MockRecorderStatus>,
    timeslice: Mutex<Option<Duration>>,
    events: mpsc::UnboundedSender<RecorderEvent>,
}

/// Recorder created by [`MockRecorderFactory`]
#[derive(Debug)]
pub struct MockStreamRecorder {
    shared: Arc<RecorderShared>,
}

impl StreamRecorder for MockStreamRecorder {
    fn start(&self, timeslice: Duration) -> Result<(), String> {
        let mut status = self.shared.status.lock();
        if *status != MockRecorderStatus::Inactive {
            return Err(format!("recorder is {:?}", *status));
        }
        *status = MockRecorderStatus::Recording;
        *self.shared.timeslice.lock() = Some(timeslice);
        Ok(())
    }

    fn pause(&self) {
        let mut status = self.shared.status.lock();
        if *status == MockRecorderStatus::Recording {
            *status = MockRecorderStatus::Paused;
        }
    }

    fn resume(&self) {
        let mut status = self.shared.status.lock();
        if *status == MockRecorderStatus::Paused {
            *status = MockRecorderStatus::Recording;
        }
    }

    fn stop(&self) {
        let mut status = self.shared.status.lock();
        if *status != MockRecorderStatus::Stopped {
            *status = MockRecorderStatus::Stopped;
            let _ = self.shared.events.send(RecorderEvent::Stopped);
        }
    }
}

/// Configurable [`NativeRecorderFactory`]
#[derive(Debug)]
pub struct MockRecorderFactory {
    available: AtomicBool,
    pausable: AtomicBool,
    supported: RwLock<Vec<String>>,
    create_failure: Mutex<Option<String>>,
    recorders: Mutex<Vec<Arc<RecorderShared>>>,
}

impl Default for MockRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecorderFactory {
    /// Available recorder supporting the common WebM and WAV types
    pub fn new() -> Self {
        Self::with_types(&[
            "video/webm",
            "video/webm;codecs=vp8",
            "video/webm;codecs=vp9",
            "audio/webm",
            "audio/wav",
        ])
    }

    /// Available recorder supporting exactly `types`
    pub fn with_types(types: &[&str]) -> Self {
        Self {
            available: AtomicBool::new(true),
            pausable: AtomicBool::new(true),
            supported: RwLock::new(types.iter().map(|t| t.to_string()).collect()),
            create_failure: Mutex::new(None),
            recorders: Mutex::new(Vec::new()),
        }
    }

    /// Toggle platform availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Toggle pause support
    pub fn set_pausable(&self, pausable: bool) {
        self.pausable.store(pausable, Ordering::SeqCst);
    }

    /// Make the next `create` fail
    pub fn fail_next_create(&self, reason: &str) {
        *self.create_failure.lock() = Some(reason.to_string());
    }

    /// Deliver data from the most recent recorder
    ///
    /// Returns `false` when that recorder is not currently recording.
    pub fn emit(&self, data: impl Into<Bytes>) -> bool {
        let recorders = self.recorders.lock();
        let Some(recorder) = recorders.last() else {
            return false;
        };
        if *recorder.status.lock() != MockRecorderStatus::Recording {
            return false;
        }
        recorder.events.send(RecorderEvent::Data(data.into())).is_ok()
    }

    /// Number of recorders created
    pub fn created(&self) -> usize {
        self.recorders.lock().len()
    }

    /// Status of the most recent recorder
    pub fn last_status(&self) -> Option<MockRecorderStatus> {
        self.recorders.lock().last().map(|r| *r.status.lock())
    }

    /// MIME type of the most recent recorder
    pub fn last_mime_type(&self) -> Option<String> {
        self.recorders.lock().last().map(|r| r.mime_type.clone())
    }

    /// Stream the most recent recorder was created for
    pub fn last_stream_id(&self) -> Option<String> {
        self.recorders.lock().last().map(|r| r.stream_id.clone())
    }

    /// Timeslice the most recent recorder was started with
    pub fn last_timeslice(&self) -> Option<Duration> {
        self.recorders.lock().last().and_then(|r| *r.timeslice.lock())
    }
}

impl NativeRecorderFactory for MockRecorderFactory {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.read().iter().any(|t| t == mime_type)
    }

    fn supports_pause(&self) -> bool {
        self.pausable.load(Ordering::SeqCst)
    }

    fn create(&self, stream: &MediaStream, mime_type: &str) -> Result<NativeRecorderHandle, String> {
        if let Some(reason) = self.create_failure.lock().take() {
            return Err(reason);
        }
        if !self.is_type_supported(mime_type) {
            return Err(format!("unsupported MIME type {}", mime_type));
        }
        if stream.tracks().is_empty() {
            return Err("stream has no tracks".to_string());
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(RecorderShared {
            mime_type: mime_type.to_string(),
            stream_id: stream.id().to_string(),
            status: Mutex::new(MockRecorderStatus::Inactive),
            timeslice: Mutex::new(None),
            events,
        });
        self.recorders.lock().push(shared.clone());

        Ok(NativeRecorderHandle {
            recorder: Box::new(MockStreamRecorder { shared }),
            events: receiver,
        })
    }
}

/// Encoder factory whose workers are driven by the test
#[derive(Debug, Default)]
pub struct ScriptedEncoderFactory {
    endpoints: Mutex<VecDeque<WorkerEndpoint>>,
    scripts: Mutex<Vec<String>>,
    spawn_failure: Mutex<Option<String>>,
}

impl ScriptedEncoderFactory {
    /// Create a factory with no workers yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker end of the oldest spawned worker not yet taken
    pub fn take_endpoint(&self) -> Option<WorkerEndpoint> {
        self.endpoints.lock().pop_front()
    }

    /// Script URLs requested so far
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Make the next spawn fail
    pub fn fail_next_spawn(&self, reason: &str) {
        *self.spawn_failure.lock() = Some(reason.to_string());
    }
}

impl EncoderWorkerFactory for ScriptedEncoderFactory {
    fn spawn(&self, script_url: &str) -> MediaResult<EncoderWorker> {
        if let Some(reason) = self.spawn_failure.lock().take() {
            return Err(MediaError::RecorderInit {
                mime_type: "video/webm".to_string(),
                reason,
            });
        }
        let (worker, endpoint) = EncoderWorker::channel();
        self.scripts.lock().push(script_url.to_string());
        self.endpoints.lock().push_back(endpoint);
        Ok(worker)
    }
}

/// Encoder factory running self-driving workers
///
/// Each worker answers `Load` with `Ready` and every frame with one chunk
/// holding `frame-<n>`.
#[derive(Debug, Default)]
pub struct MockEncoderFactory {
    spawned: AtomicU64,
}

impl MockEncoderFactory {
    /// Create a factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workers started
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl EncoderWorkerFactory for MockEncoderFactory {
    fn spawn(&self, script_url: &str) -> MediaResult<EncoderWorker> {
        let (worker, mut endpoint) = EncoderWorker::channel();
        self.spawned.fetch_add(1, Ordering::SeqCst);
        debug!("Mock encoder worker spawned from {}", script_url);

        tokio::spawn(async move {
            let mut frames = 0u64;
            while let Some(message) = endpoint.recv().await {
                match message {
                    HostMessage::Load { .. } => {
                        endpoint.send_ready();
                    }
                    HostMessage::Configure(_) => {}
                    HostMessage::Frame(_) => {
                        frames += 1;
                        endpoint.send_chunk(format!("frame-{}", frames));
                    }
                    HostMessage::Terminate => break,
                }
            }
        });
        Ok(worker)
    }
}
