//! Software recording through an external encoder worker
//!
//! Used when the platform has no native recorder. Frames are pulled from
//! the stream's video track at the configured rate, fitted into a fixed
//! raster and handed to the worker; encoded chunks flow back and are
//! buffered until `stop`.

use super::encoder::{
    EncoderParams, EncoderState, EncoderWorker, EncoderWorkerFactory, HostMessage, WorkerMessage,
    WASM_MODULE, WORKER_SCRIPT,
};
use super::native::{NativeBackend, NativeRecorderFactory};
use super::{Recording, RecordingOutput, RecordingStats};
use crate::error::{MediaError, MediaResult};
use crate::webm::repair_recording;
use bytes::Bytes;
use camkit_core::{CoreError, MediaStream, VideoSpecs};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The only MIME type the encoder produces
pub const FALLBACK_MIME_TYPE: &str = "video/webm";

/// Settings of the software encoder path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Directory or URL prefix holding the worker script and module
    pub base: String,
    /// Encoded frame width
    pub width: u32,
    /// Encoded frame height
    pub height: u32,
    /// Frames per second
    pub framerate: u32,
    /// Target bitrate in kbit/s
    pub bitrate: u32,
    /// MIME type for the parallel audio recording
    pub audio_mime_type: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base: String::new(),
            width: 640,
            height: 480,
            framerate: 30,
            bitrate: 1200,
            audio_mime_type: "audio/wav".to_string(),
        }
    }
}

/// Caller overrides for [`FallbackConfig`]; unset fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialFallbackConfig {
    /// Worker base path
    pub base: Option<String>,
    /// Encoded frame width
    pub width: Option<u32>,
    /// Encoded frame height
    pub height: Option<u32>,
    /// Frames per second
    pub framerate: Option<u32>,
    /// Target bitrate in kbit/s
    pub bitrate: Option<u32>,
    /// MIME type for the parallel audio recording
    pub audio_mime_type: Option<String>,
}

impl PartialFallbackConfig {
    /// Overlay the set fields onto `config`
    pub fn apply_to(&self, config: &mut FallbackConfig) {
        if let Some(base) = &self.base {
            config.base = base.clone();
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(framerate) = self.framerate {
            config.framerate = framerate;
        }
        if let Some(bitrate) = self.bitrate {
            config.bitrate = bitrate;
        }
        if let Some(mime) = &self.audio_mime_type {
            config.audio_mime_type = mime.clone();
        }
    }
}

impl FallbackConfig {
    /// Defaults, overlaid with the stream's video specs, then with `overrides`
    pub fn resolve(specs: Option<VideoSpecs>, overrides: &PartialFallbackConfig) -> Self {
        let mut config = Self::default();
        if let Some(specs) = specs {
            config.width = specs.width;
            config.height = specs.height;
            config.framerate = specs.framerate.round().max(1.0) as u32;
        }
        overrides.apply_to(&mut config);
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: format!("frame size {}x{} is empty", self.width, self.height),
            });
        }
        if self.framerate == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "framerate must be positive".to_string(),
            });
        }
        if self.bitrate == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "bitrate must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Delay between two frames
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.framerate.max(1)))
    }

    /// Parameters sent to the encoder after `Ready`
    pub fn encoder_params(&self) -> EncoderParams {
        EncoderParams {
            width: self.width,
            height: self.height,
            bitrate: self.bitrate,
            timebase_den: self.framerate,
            realtime: true,
        }
    }

    /// Location of an asset under [`base`](Self::base)
    pub fn asset_path(&self, name: &str) -> String {
        if self.base.is_empty() {
            name.to_string()
        } else if self.base.ends_with('/') {
            format!("{}{}", self.base, name)
        } else {
            format!("{}/{}", self.base, name)
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    protocol: EncoderState,
    buffers: Vec<Bytes>,
    paused: bool,
    stats: RecordingStats,
    pump: Option<JoinHandle<()>>,
}

/// Records by driving an encoder worker
#[derive(Debug)]
pub struct FallbackBackend {
    config: FallbackConfig,
    stream: MediaStream,
    encoder: Arc<dyn EncoderWorkerFactory>,
    audio_factory: Option<Arc<dyn NativeRecorderFactory>>,
    mime_type: String,
    state: Arc<Mutex<HostState>>,
    sender: Option<mpsc::UnboundedSender<HostMessage>>,
    listener: Option<JoinHandle<()>>,
    audio: Option<NativeBackend>,
    latest: Option<Recording>,
    latest_audio: Option<Recording>,
}

impl FallbackBackend {
    /// Create an idle backend; the effective config is validated here
    pub fn new(
        encoder: Arc<dyn EncoderWorkerFactory>,
        audio_factory: Option<Arc<dyn NativeRecorderFactory>>,
        stream: MediaStream,
        overrides: &PartialFallbackConfig,
    ) -> MediaResult<Self> {
        let config = FallbackConfig::resolve(stream.video_specs(), overrides);
        config.validate()?;
        if !stream.has_video() {
            return Err(MediaError::RecorderInit {
                mime_type: FALLBACK_MIME_TYPE.to_string(),
                reason: "stream has no video track".to_string(),
            });
        }

        Ok(Self {
            config,
            stream,
            encoder,
            audio_factory,
            mime_type: FALLBACK_MIME_TYPE.to_string(),
            state: Arc::new(Mutex::new(HostState::default())),
            sender: None,
            listener: None,
            audio: None,
            latest: None,
            latest_audio: None,
        })
    }

    /// Whether the encoder can produce `mime_type`
    pub fn is_type_supported(mime_type: &str) -> bool {
        mime_type == FALLBACK_MIME_TYPE
    }

    /// Effective configuration
    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Use `mime_type` for the next recording; `false` if unsupported
    pub fn set_mime_type(&mut self, mime_type: &str) -> bool {
        if !Self::is_type_supported(mime_type) {
            return false;
        }
        self.mime_type = mime_type.to_string();
        true
    }

    /// MIME type of the next recording
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Spawn the worker and begin the handshake, or resume if paused
    pub fn start(&mut self) -> MediaResult<()> {
        if self.is_paused() {
            self.resume();
            return Ok(());
        }

        self.abort();
        self.latest = None;
        self.latest_audio = None;

        let script = self.config.asset_path(WORKER_SCRIPT);
        let EncoderWorker { sender, receiver } = self.encoder.spawn(&script).map_err(|e| {
            error!("Could not start encoder worker {}: {}", script, e);
            e
        })?;

        let module_path = self.config.asset_path(WASM_MODULE);
        sender
            .send(HostMessage::Load { module_path })
            .map_err(|_| MediaError::Encoding {
                format: FALLBACK_MIME_TYPE.to_string(),
                reason: "encoder worker exited before loading".to_string(),
            })?;
        debug!("Encoder worker {} loading", script);

        self.listener = Some(tokio::spawn(listen(
            receiver,
            sender.clone(),
            self.state.clone(),
            self.stream.clone(),
            self.config.clone(),
        )));
        self.sender = Some(sender);
        self.start_audio();

        info!(
            "Fallback recorder started: {}x{} @ {} fps",
            self.config.width, self.config.height, self.config.framerate
        );
        Ok(())
    }

    fn start_audio(&mut self) {
        let Some(factory) = self.audio_factory.clone() else {
            return;
        };
        if !self.stream.has_audio() {
            debug!("No audio track, skipping audio recorder");
            return;
        }

        let mut audio = NativeBackend::new(factory, self.stream.audio_only());
        if !audio.set_mime_type(&self.config.audio_mime_type) {
            warn!(
                "Audio recorder does not support {}, recording video only",
                self.config.audio_mime_type
            );
            return;
        }
        match audio.start() {
            Ok(()) => self.audio = Some(audio),
            Err(e) => warn!("Audio recorder unavailable, recording video only: {}", e),
        }
    }

    /// Drop incoming chunks until resumed; frames keep flowing
    pub fn pause(&mut self) {
        self.state.lock().paused = true;
        if let Some(audio) = &mut self.audio {
            audio.pause();
        }
    }

    /// Buffer incoming chunks again
    pub fn resume(&mut self) {
        self.state.lock().paused = false;
        if let Some(audio) = &mut self.audio {
            audio.resume();
        }
    }

    /// Terminate the worker and return the finished recording
    pub async fn stop(&mut self) -> MediaResult<RecordingOutput> {
        let sender = self.sender.take().ok_or_else(|| CoreError::InvalidState {
            message: "fallback recorder is not running".to_string(),
        })?;

        self.terminate(sender);

        if let Some(mut audio) = self.audio.take() {
            match audio.stop().await {
                Ok(output) => self.latest_audio = Some(output.video),
                Err(e) => warn!("Audio recording failed: {}", e),
            }
        }

        let chunks = {
            let mut state = self.state.lock();
            state.paused = false;
            std::mem::take(&mut state.buffers)
        };
        let recording = repair_recording(Recording::from_chunks(&self.mime_type, &chunks));
        info!(
            "Fallback recording finished: {} chunks, {} bytes",
            chunks.len(),
            recording.data.len()
        );

        self.latest = Some(recording.clone());
        Ok(RecordingOutput {
            video: recording,
            audio: self.latest_audio.clone(),
        })
    }

    fn terminate(&mut self, sender: mpsc::UnboundedSender<HostMessage>) {
        let _ = sender.send(HostMessage::Terminate);
        drop(sender);

        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        let mut state = self.state.lock();
        state.protocol = EncoderState::Terminated;
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        debug!("Encoder worker terminated");
    }

    /// Discard any in-flight recording without finalizing it
    pub fn abort(&mut self) {
        if let Some(sender) = self.sender.take() {
            self.terminate(sender);
        }
        if let Some(mut audio) = self.audio.take() {
            audio.abort();
        }
        self.state = Arc::new(Mutex::new(HostState::default()));
    }

    /// Last finished recording
    pub fn latest_recording(&self) -> Option<&Recording> {
        self.latest.as_ref()
    }

    /// Audio recorded alongside the last recording
    pub fn latest_audio_recording(&self) -> Option<&Recording> {
        self.latest_audio.as_ref()
    }

    /// Whether a worker is running
    pub fn is_recording(&self) -> bool {
        self.sender.is_some()
    }

    /// Whether incoming chunks are dropped
    pub fn is_paused(&self) -> bool {
        self.sender.is_some() && self.state.lock().paused
    }

    /// Buffer and frame counters
    pub fn stats(&self) -> RecordingStats {
        self.state.lock().stats
    }
}

impl Drop for FallbackBackend {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn listen(
    mut receiver: mpsc::UnboundedReceiver<WorkerMessage>,
    sender: mpsc::UnboundedSender<HostMessage>,
    state: Arc<Mutex<HostState>>,
    stream: MediaStream,
    config: FallbackConfig,
) {
    while let Some(message) = receiver.recv().await {
        let mut host = state.lock();
        match host.protocol.on_worker_message(&message) {
            Ok(next) => host.protocol = next,
            Err(violation) => {
                warn!("Encoder protocol violation: {}", violation);
                continue;
            }
        }

        match message {
            WorkerMessage::Ready => {
                let params = config.encoder_params();
                if sender.send(HostMessage::Configure(params)).is_err() {
                    break;
                }
                debug!("Encoder configured: {:?}", params);
                host.pump = Some(tokio::spawn(pump_frames(
                    stream.clone(),
                    sender.clone(),
                    state.clone(),
                    config.clone(),
                )));
            }
            WorkerMessage::Chunk(chunk) => {
                if host.paused {
                    host.stats.chunks_dropped += 1;
                } else {
                    host.stats.chunks_buffered += 1;
                    host.stats.bytes_buffered += chunk.len();
                    host.buffers.push(chunk);
                }
            }
        }
    }
}

/// Self-rescheduling frame loop; no catch-up when a frame runs late
async fn pump_frames(
    stream: MediaStream,
    sender: mpsc::UnboundedSender<HostMessage>,
    state: Arc<Mutex<HostState>>,
    config: FallbackConfig,
) {
    let Some(track) = stream.first_video_track().cloned() else {
        warn!("No video track to encode");
        return;
    };
    let period = config.frame_period();

    loop {
        if let Some(frame) = track.grab_frame() {
            match frame.fit_to(config.width, config.height) {
                Ok(raster) => {
                    if sender.send(HostMessage::Frame(raster)).is_err() {
                        debug!("Encoder worker gone, frame pump exiting");
                        break;
                    }
                    state.lock().stats.frames_sent += 1;
                }
                Err(e) => warn!("Skipping unusable frame: {}", e),
            }
        }
        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_layering() {
        let specs = VideoSpecs {
            width: 1280,
            height: 720,
            framerate: 29.97,
        };
        let overrides = PartialFallbackConfig {
            bitrate: Some(2500),
            width: Some(320),
            ..Default::default()
        };
        let config = FallbackConfig::resolve(Some(specs), &overrides);

        assert_eq!(config.width, 320);
        assert_eq!(config.height, 720);
        assert_eq!(config.framerate, 30);
        assert_eq!(config.bitrate, 2500);
        assert_eq!(config.audio_mime_type, "audio/wav");
    }

    #[test]
    fn test_defaults_without_specs() {
        let config = FallbackConfig::resolve(None, &PartialFallbackConfig::default());
        assert_eq!(config, FallbackConfig::default());
        assert_eq!(config.frame_period(), Duration::from_micros(33_333));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_asset_paths() {
        let mut config = FallbackConfig::default();
        assert_eq!(config.asset_path(WORKER_SCRIPT), "webm-worker.js");
        config.base = "/static".to_string();
        assert_eq!(config.asset_path(WASM_MODULE), "/static/webm-wasm.wasm");
        config.base = "https://cdn.example/ck/".to_string();
        assert_eq!(config.asset_path(WORKER_SCRIPT), "https://cdn.example/ck/webm-worker.js");
    }

    #[test]
    fn test_zero_framerate_rejected() {
        let overrides = PartialFallbackConfig {
            framerate: Some(0),
            ..Default::default()
        };
        let config = FallbackConfig::resolve(None, &overrides);
        assert!(matches!(
            config.validate(),
            Err(MediaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_only_webm_supported() {
        assert!(FallbackBackend::is_type_supported("video/webm"));
        assert!(!FallbackBackend::is_type_supported("video/webm;codecs=vp8"));
        assert!(!FallbackBackend::is_type_supported("video/mp4"));
    }
}
