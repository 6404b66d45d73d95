//! Integration tests for the recorder facade and its two backends
//!
//! Native tests drive a mock platform recorder; fallback tests either script
//! the encoder worker by hand or use the self-driving mock encoder.

use bytes::Bytes;
use camkit_core::mock::MockSourceProvider;
use camkit_core::*;
use camkit_media::mock::{MockEncoderFactory, MockRecorderFactory, MockRecorderStatus, ScriptedEncoderFactory};
use camkit_media::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn av_stream(provider: &MockSourceProvider) -> MediaStream {
    provider
        .request_stream(&StreamConstraints::any(true, true))
        .await
        .unwrap()
}

fn native_environment(factory: &Arc<MockRecorderFactory>) -> RecordingEnvironment {
    let native: Arc<dyn NativeRecorderFactory> = factory.clone();
    RecordingEnvironment {
        native: Some(native),
        encoder: Arc::new(MockEncoderFactory::new()),
        audio: None,
    }
}

fn fallback_environment(encoder: Arc<dyn EncoderWorkerFactory>) -> RecordingEnvironment {
    RecordingEnvironment {
        native: None,
        encoder,
        audio: None,
    }
}

async fn recorder_with(environment: RecordingEnvironment) -> (Recorder, MediaStream, Arc<MemoryDownloads>) {
    let provider = MockSourceProvider::new();
    let original = av_stream(&provider).await;
    let preview = original.clone_tracks();
    let downloads = Arc::new(MemoryDownloads::new());
    let recorder = Recorder::new(
        environment,
        original,
        preview.clone(),
        PartialFallbackConfig::default(),
        downloads.clone(),
    );
    (recorder, preview, downloads)
}

async fn wait_for(recorder: &Recorder, condition: impl Fn(RecordingStats) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition(recorder.stats()) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("recorder never reached the expected state");
}

// ============================================================================
// NATIVE BACKEND
// ============================================================================

#[tokio::test]
async fn test_native_recording_uses_default_mime_type() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(recorder.backend_kind(), Some(BackendKind::Native));
    assert_eq!(factory.last_timeslice(), Some(Duration::from_millis(10)));

    assert!(factory.emit(Bytes::from_static(b"c1")));
    assert!(factory.emit(Bytes::new()));
    assert!(factory.emit(Bytes::from_static(b"c2")));

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.mime_type, "video/webm;codecs=vp8");
    assert_eq!(recording.data, Bytes::from_static(b"c1c2"));
    assert_eq!(factory.last_status(), Some(MockRecorderStatus::Stopped));
    assert_eq!(recorder.latest_recording(), Some(recording));
}

#[tokio::test]
async fn test_mime_type_follows_last_accepted_call() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.set_mime_type("video/webm;codecs=vp9"));
    assert!(!recorder.set_mime_type("video/mp4"));
    assert_eq!(recorder.mime_type(), "video/webm;codecs=vp9");

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(factory.last_mime_type().as_deref(), Some("video/webm;codecs=vp9"));
    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.mime_type, "video/webm;codecs=vp9");

    // Remembered across fresh starts
    assert!(recorder.start(StreamSource::Original).await);
    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.mime_type, "video/webm;codecs=vp9");
}

#[tokio::test]
async fn test_second_start_discards_first_buffer() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert!(factory.emit(Bytes::from_static(b"first")));

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(factory.created(), 2);
    assert!(factory.emit(Bytes::from_static(b"second")));

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.data, Bytes::from_static(b"second"));
}

#[tokio::test]
async fn test_native_pause_then_start_resumes() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert!(factory.emit(Bytes::from_static(b"before-")));

    recorder.pause();
    assert!(recorder.is_paused());
    assert!(!factory.emit(Bytes::from_static(b"lost")));

    assert!(recorder.start(StreamSource::Original).await);
    assert!(!recorder.is_paused());
    assert_eq!(factory.created(), 1);
    assert!(factory.emit(Bytes::from_static(b"after")));

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.data, Bytes::from_static(b"before-after"));
}

#[tokio::test]
async fn test_pause_capability_is_probed() {
    let factory = Arc::new(MockRecorderFactory::new());
    factory.set_pausable(false);
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(!recorder.can_pause());
    assert!(recorder.start(StreamSource::Original).await);
    recorder.pause();
    assert!(!recorder.is_paused());
    assert_eq!(factory.last_status(), Some(MockRecorderStatus::Recording));
}

#[tokio::test]
async fn test_construction_failure_leaves_no_backend() {
    let factory = Arc::new(MockRecorderFactory::new());
    factory.fail_next_create("NotSupportedError");
    let (mut recorder, _, downloads) = recorder_with(native_environment(&factory)).await;

    assert!(!recorder.start(StreamSource::Original).await);
    assert!(recorder.backend_kind().is_none());
    assert!(recorder.stop().await.is_none());
    assert!(recorder.latest_recording().is_none());
    assert!(!recorder.download_latest_recording(None));
    assert!(downloads.saved().is_empty());
}

#[tokio::test]
async fn test_nothing_started_is_noop() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    recorder.pause();
    assert!(recorder.stop().await.is_none());
    assert!(recorder.latest_recording().is_none());
    assert!(!recorder.download_latest_recording(Some("clip")));
    assert_eq!(recorder.stats(), RecordingStats::default());
}

#[tokio::test]
async fn test_preview_source_is_recorded() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, preview, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Preview).await);
    assert_eq!(factory.last_stream_id().as_deref(), Some(preview.id()));
}

#[tokio::test]
async fn test_download_latest_recording() {
    let factory = Arc::new(MockRecorderFactory::new());
    let (mut recorder, _, downloads) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Original).await);
    factory.emit(Bytes::from_static(b"video"));
    recorder.stop().await.unwrap();

    assert!(recorder.download_latest_recording(Some("clip.webm")));
    let saved = downloads.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "clip.webm");
    assert_eq!(
        saved[0].1,
        DownloadPayload::Blob {
            mime_type: "video/webm;codecs=vp8".to_string(),
            data: Bytes::from_static(b"video"),
        }
    );
}

#[tokio::test]
async fn test_backend_selection_is_reevaluated_per_start() {
    let factory = Arc::new(MockRecorderFactory::new());
    factory.set_available(false);
    let (mut recorder, _, _) = recorder_with(native_environment(&factory)).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(recorder.backend_kind(), Some(BackendKind::Fallback));
    recorder.stop().await.unwrap();

    factory.set_available(true);
    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(recorder.backend_kind(), Some(BackendKind::Native));
}

// ============================================================================
// FALLBACK BACKEND
// ============================================================================

#[tokio::test]
async fn test_fallback_drops_chunks_while_paused() {
    let encoder = Arc::new(ScriptedEncoderFactory::new());
    let (mut recorder, _, _) = recorder_with(fallback_environment(encoder.clone())).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(encoder.scripts(), vec!["webm-worker.js".to_string()]);
    let mut worker = encoder.take_endpoint().unwrap();

    assert_eq!(
        worker.recv().await,
        Some(HostMessage::Load {
            module_path: "webm-wasm.wasm".to_string()
        })
    );
    assert!(worker.send_ready());
    assert_eq!(
        worker.recv().await,
        Some(HostMessage::Configure(EncoderParams {
            width: 320,
            height: 240,
            bitrate: 1200,
            timebase_den: 30,
            realtime: true,
        }))
    );

    worker.send_chunk(Bytes::from_static(b"c1"));
    worker.send_chunk(Bytes::from_static(b"c2"));
    wait_for(&recorder, |s| s.chunks_buffered == 2).await;

    recorder.pause();
    worker.send_chunk(Bytes::from_static(b"c3"));
    wait_for(&recorder, |s| s.chunks_dropped == 1).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert!(!recorder.is_paused());
    worker.send_chunk(Bytes::from_static(b"c4"));
    wait_for(&recorder, |s| s.chunks_buffered == 3).await;

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.mime_type, "video/webm");
    assert_eq!(recording.data, Bytes::from_static(b"c1c2c4"));
    assert_eq!(encoder.scripts().len(), 1);

    // The worker sees frames, then the terminate signal, then the host leaves
    let last = tokio::time::timeout(Duration::from_secs(5), async {
        let mut last = None;
        while let Some(message) = worker.recv().await {
            last = Some(message);
        }
        last
    })
    .await
    .unwrap();
    assert_eq!(last, Some(HostMessage::Terminate));
    assert_eq!(worker.state(), WorkerState::Terminated);
}

#[tokio::test]
async fn test_fallback_second_start_discards_first_buffer() {
    let encoder = Arc::new(ScriptedEncoderFactory::new());
    let (mut recorder, _, _) = recorder_with(fallback_environment(encoder.clone())).await;

    assert!(recorder.start(StreamSource::Original).await);
    let mut first = encoder.take_endpoint().unwrap();
    first.recv().await.unwrap();
    first.send_ready();
    first.send_chunk(Bytes::from_static(b"c1"));
    wait_for(&recorder, |s| s.chunks_buffered == 1).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(recorder.stats(), RecordingStats::default());
    assert_eq!(encoder.scripts().len(), 2);

    // The replaced worker is told to shut down
    let last = tokio::time::timeout(Duration::from_secs(5), async {
        let mut last = None;
        while let Some(message) = first.recv().await {
            last = Some(message);
        }
        last
    })
    .await
    .unwrap();
    assert_eq!(last, Some(HostMessage::Terminate));
    first.send_chunk(Bytes::from_static(b"late"));

    let mut second = encoder.take_endpoint().unwrap();
    second.recv().await.unwrap();
    second.send_ready();
    second.send_chunk(Bytes::from_static(b"c2"));
    wait_for(&recorder, |s| s.chunks_buffered == 1).await;

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.data, Bytes::from_static(b"c2"));
}

/// Video track whose first frame has a buffer too short for its size
#[derive(Debug)]
struct GlitchyTrack {
    grabs: AtomicU64,
}

#[async_trait]
impl MediaTrack for GlitchyTrack {
    fn id(&self) -> &str {
        "glitchy"
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> &str {
        "Glitchy camera"
    }

    fn settings(&self) -> TrackSettings {
        TrackSettings {
            width: Some(4),
            height: Some(4),
            frame_rate: Some(50.0),
            ..Default::default()
        }
    }

    fn state(&self) -> TrackState {
        TrackState::Live
    }

    fn stop(&self) {}

    fn clone_track(&self) -> Arc<dyn MediaTrack> {
        Arc::new(GlitchyTrack {
            grabs: AtomicU64::new(0),
        })
    }

    fn grab_frame(&self) -> Option<VideoFrame> {
        let len = if self.grabs.fetch_add(1, Ordering::SeqCst) == 0 {
            16
        } else {
            64
        };
        Some(VideoFrame {
            width: 4,
            height: 4,
            data: Bytes::from(vec![0x7F; len]),
            timestamp: 0,
        })
    }

    async fn apply_constraints(&self, _constraints: &TrackConstraints) -> Result<(), CoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_fallback_skips_malformed_frames() {
    let encoder = Arc::new(ScriptedEncoderFactory::new());
    let track: Arc<dyn MediaTrack> = Arc::new(GlitchyTrack {
        grabs: AtomicU64::new(0),
    });
    let stream = MediaStream::new(vec![track]);
    let mut recorder = Recorder::new(
        fallback_environment(encoder.clone()),
        stream.clone(),
        stream,
        PartialFallbackConfig::default(),
        Arc::new(MemoryDownloads::new()),
    );

    assert!(recorder.start(StreamSource::Original).await);
    let mut worker = encoder.take_endpoint().unwrap();
    worker.recv().await.unwrap();
    worker.send_ready();
    assert!(matches!(
        worker.recv().await,
        Some(HostMessage::Configure(EncoderParams { width: 4, height: 4, .. }))
    ));

    // The short first frame is skipped and the pump keeps running
    match worker.recv().await.unwrap() {
        HostMessage::Frame(raster) => assert_eq!(raster.len(), 4 * 4 * 4),
        other => panic!("Expected a frame, got {:?}", other),
    }
    wait_for(&recorder, |s| s.frames_sent >= 2).await;
    assert!(recorder.is_recording());
}

#[tokio::test]
async fn test_fallback_frames_fit_the_configured_raster() {
    let encoder = Arc::new(ScriptedEncoderFactory::new());
    let provider = MockSourceProvider::new();
    let stream = av_stream(&provider).await;
    let overrides = PartialFallbackConfig {
        width: Some(100),
        height: Some(50),
        framerate: Some(50),
        ..Default::default()
    };
    let mut recorder = Recorder::new(
        fallback_environment(encoder.clone()),
        stream.clone(),
        stream,
        overrides,
        Arc::new(MemoryDownloads::new()),
    );

    assert!(recorder.start(StreamSource::Original).await);
    let mut worker = encoder.take_endpoint().unwrap();
    worker.recv().await.unwrap();
    worker.send_ready();

    let params = worker.recv().await.unwrap();
    assert!(matches!(
        params,
        HostMessage::Configure(EncoderParams {
            width: 100,
            height: 50,
            timebase_den: 50,
            ..
        })
    ));
    match worker.recv().await.unwrap() {
        HostMessage::Frame(raster) => assert_eq!(raster.len(), 100 * 50 * 4),
        other => panic!("Expected a frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_rejects_chunks_before_ready() {
    let encoder = Arc::new(ScriptedEncoderFactory::new());
    let (mut recorder, _, _) = recorder_with(fallback_environment(encoder.clone())).await;

    assert!(recorder.start(StreamSource::Original).await);
    let mut worker = encoder.take_endpoint().unwrap();
    worker.recv().await.unwrap();

    worker.send_chunk(Bytes::from_static(b"early"));
    worker.send_ready();
    worker.send_chunk(Bytes::from_static(b"ok"));
    wait_for(&recorder, |s| s.chunks_buffered == 1).await;

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.data, Bytes::from_static(b"ok"));
    assert_eq!(recorder.stats().chunks_dropped, 0);
}

#[tokio::test]
async fn test_fallback_end_to_end_with_mock_encoder() {
    let encoder = Arc::new(MockEncoderFactory::new());
    let (mut recorder, _, _) = recorder_with(fallback_environment(encoder.clone())).await;

    assert!(!recorder.set_mime_type("video/webm;codecs=vp8"));
    assert!(recorder.set_mime_type("video/webm"));

    assert!(recorder.start(StreamSource::Original).await);
    wait_for(&recorder, |s| s.frames_sent >= 3 && s.chunks_buffered >= 3).await;

    let recording = recorder.stop().await.unwrap();
    assert_eq!(recording.mime_type, "video/webm");
    assert!(recording.data.starts_with(b"frame-1frame-2frame-3"));
    assert_eq!(encoder.spawned(), 1);
}

#[tokio::test]
async fn test_fallback_records_audio_alongside() {
    let audio_factory = Arc::new(MockRecorderFactory::new());
    let audio: Arc<dyn NativeRecorderFactory> = audio_factory.clone();
    let environment = RecordingEnvironment {
        native: None,
        encoder: Arc::new(MockEncoderFactory::new()),
        audio: Some(audio),
    };
    let (mut recorder, _, downloads) = recorder_with(environment).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(audio_factory.last_mime_type().as_deref(), Some("audio/wav"));
    assert!(audio_factory.emit(Bytes::from_static(b"RIFF")));

    recorder.stop().await.unwrap();
    let audio = recorder.latest_audio_recording().unwrap();
    assert_eq!(audio.mime_type, "audio/wav");
    assert_eq!(audio.data, Bytes::from_static(b"RIFF"));

    assert!(recorder.download_latest_recording(None));
    assert_eq!(downloads.saved().len(), 1);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let saved = downloads.saved();
    assert_eq!(saved.len(), 2);
    assert!(saved[0].0.starts_with("CKW-"));
    assert_eq!(saved[1].0, "audio");
}

#[tokio::test]
async fn test_fallback_skips_unsupported_audio() {
    let audio_factory = Arc::new(MockRecorderFactory::with_types(&["audio/webm"]));
    let audio: Arc<dyn NativeRecorderFactory> = audio_factory.clone();
    let environment = RecordingEnvironment {
        native: None,
        encoder: Arc::new(MockEncoderFactory::new()),
        audio: Some(audio),
    };
    let (mut recorder, _, _) = recorder_with(environment).await;

    assert!(recorder.start(StreamSource::Original).await);
    assert_eq!(audio_factory.created(), 0);
    recorder.stop().await.unwrap();
    assert!(recorder.latest_audio_recording().is_none());
}

#[tokio::test]
async fn test_fallback_requires_video_track() {
    let provider = MockSourceProvider::new();
    let audio_only = provider
        .request_stream(&StreamConstraints::any(true, false))
        .await
        .unwrap();
    let mut recorder = Recorder::new(
        fallback_environment(Arc::new(MockEncoderFactory::new())),
        audio_only.clone(),
        audio_only,
        PartialFallbackConfig::default(),
        Arc::new(MemoryDownloads::new()),
    );

    assert!(!recorder.start(StreamSource::Original).await);
    assert!(recorder.stop().await.is_none());
}

#[tokio::test]
async fn test_abort_discards_recording() {
    let encoder = Arc::new(MockEncoderFactory::new());
    let (mut recorder, _, _) = recorder_with(fallback_environment(encoder)).await;

    assert!(recorder.start(StreamSource::Original).await);
    wait_for(&recorder, |s| s.chunks_buffered >= 1).await;

    recorder.abort();
    assert!(!recorder.is_recording());
    assert!(recorder.stop().await.is_none());
    assert!(recorder.latest_recording().is_none());
}
