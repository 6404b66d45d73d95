//! In-memory source provider for tests and headless environments
//!
//! [`MockSourceProvider`] exposes a configurable device list and hands out
//! [`MockTrack`]s that produce synthetic RGBA frames. Failures can be
//! injected for enumeration and for the next stream request.

use crate::constraints::{ConstrainValue, FacingMode, StreamConstraints, TrackConstraints};
use crate::error::{AcquisitionError, CoreError};
use crate::provider::{DeviceDescriptor, DeviceKind, SourceProvider};
use crate::stream::MediaStream;
use crate::track::{MediaTrack, TrackKind, TrackSettings, TrackState, VideoFrame};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Largest frame dimension a mock camera accepts
pub const MAX_MOCK_DIMENSION: u32 = 4096;

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Track backed by no hardware, producing a synthetic gradient
#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    label: String,
    settings: RwLock<TrackSettings>,
    ended: AtomicBool,
    playing: Arc<AtomicBool>,
    frames: AtomicU64,
}

impl MockTrack {
    fn new(kind: TrackKind, label: &str, settings: TrackSettings, playing: Arc<AtomicBool>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.to_string(),
            settings: RwLock::new(settings),
            ended: AtomicBool::new(false),
            playing,
            frames: AtomicU64::new(0),
        }
    }

    fn synthesize(&self, width: u32, height: u32) -> VideoFrame {
        let sequence = self.frames.fetch_add(1, Ordering::Relaxed);
        let mut data = Vec::with_capacity(width as usize * height as usize * VideoFrame::BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, sequence as u8, 0xFF]);
            }
        }

        VideoFrame {
            width,
            height,
            data: Bytes::from(data),
            timestamp: sequence * 1000 / DEFAULT_FRAME_RATE as u64,
        }
    }
}

#[async_trait]
impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn settings(&self) -> TrackSettings {
        self.settings.read().clone()
    }

    fn state(&self) -> TrackState {
        if self.ended.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn stop(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    fn clone_track(&self) -> Arc<dyn MediaTrack> {
        Arc::new(MockTrack::new(
            self.kind,
            &self.label,
            self.settings(),
            self.playing.clone(),
        ))
    }

    fn grab_frame(&self) -> Option<VideoFrame> {
        if self.kind != TrackKind::Video
            || self.ended.load(Ordering::SeqCst)
            || !self.playing.load(Ordering::SeqCst)
        {
            return None;
        }

        let settings = self.settings.read();
        let width = settings.width.unwrap_or(DEFAULT_WIDTH);
        let height = settings.height.unwrap_or(DEFAULT_HEIGHT);
        drop(settings);
        Some(self.synthesize(width, height))
    }

    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), CoreError> {
        if self.ended.load(Ordering::SeqCst) {
            return Err(CoreError::InvalidState {
                message: format!("track {} has ended", self.id),
            });
        }

        for (name, value) in [("width", &constraints.width), ("height", &constraints.height)] {
            if let Some(ConstrainValue::Exact(v)) = value {
                if *v == 0 || *v > MAX_MOCK_DIMENSION {
                    return Err(CoreError::Constraint {
                        constraint: name.to_string(),
                        reason: format!("{} is outside 1..={}", v, MAX_MOCK_DIMENSION),
                    });
                }
            }
        }

        let mut settings = self.settings.write();
        let clamp = |v: &ConstrainValue<u32>| (*v.value()).clamp(1, MAX_MOCK_DIMENSION);
        if let Some(width) = &constraints.width {
            settings.width = Some(clamp(width));
        }
        if let Some(height) = &constraints.height {
            settings.height = Some(clamp(height));
        }
        if let Some(ratio) = &constraints.aspect_ratio {
            let ratio = *ratio.value();
            if constraints.height.is_none() && ratio > 0.0 {
                let width = settings.width.unwrap_or(DEFAULT_WIDTH);
                settings.height = Some(((width as f64 / ratio).round() as u32).max(1));
            }
        }
        if let Some(rate) = &constraints.frame_rate {
            settings.frame_rate = Some(*rate.value());
        }
        if let (Some(w), Some(h)) = (settings.width, settings.height) {
            settings.aspect_ratio = Some(w as f64 / h as f64);
        }
        Ok(())
    }
}

/// A device known to the mock provider
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// What enumeration reports
    pub descriptor: DeviceDescriptor,
    /// Facing direction for cameras
    pub facing_mode: Option<FacingMode>,
}

impl MockDevice {
    /// Camera with the given id and label
    pub fn camera(device_id: &str, label: &str, facing_mode: Option<FacingMode>) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                device_id: device_id.to_string(),
                group_id: format!("group-{}", device_id),
                kind: DeviceKind::VideoInput,
                label: label.to_string(),
            },
            facing_mode,
        }
    }

    /// Microphone with the given id and label
    pub fn microphone(device_id: &str, label: &str) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                device_id: device_id.to_string(),
                group_id: format!("group-{}", device_id),
                kind: DeviceKind::AudioInput,
                label: label.to_string(),
            },
            facing_mode: None,
        }
    }

    /// Any other platform entry
    pub fn other(device_id: &str, kind: DeviceKind) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                device_id: device_id.to_string(),
                group_id: format!("group-{}", device_id),
                kind,
                label: device_id.to_string(),
            },
            facing_mode: None,
        }
    }
}

/// Configurable in-memory [`SourceProvider`]
#[derive(Debug)]
pub struct MockSourceProvider {
    devices: RwLock<Vec<MockDevice>>,
    enumeration_failure: RwLock<Option<String>>,
    request_failure: Mutex<Option<AcquisitionError>>,
    withhold_labels: AtomicBool,
    permission_granted: AtomicBool,
    autoplay: AtomicBool,
    requests: Mutex<Vec<StreamConstraints>>,
    issued: Mutex<Vec<MediaStream>>,
    playback: Mutex<Vec<Arc<AtomicBool>>>,
}

impl Default for MockSourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourceProvider {
    /// Provider with a front camera, a back camera and a microphone
    pub fn new() -> Self {
        Self::with_devices(vec![
            MockDevice::camera("mock-front", "Mock Front Camera", Some(FacingMode::User)),
            MockDevice::camera("mock-back", "Mock Back Camera", Some(FacingMode::Environment)),
            MockDevice::microphone("mock-mic", "Mock Microphone"),
        ])
    }

    /// Provider with exactly these devices
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
            enumeration_failure: RwLock::new(None),
            request_failure: Mutex::new(None),
            withhold_labels: AtomicBool::new(false),
            permission_granted: AtomicBool::new(false),
            autoplay: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
            playback: Mutex::new(Vec::new()),
        }
    }

    /// Report empty labels until a stream has been granted
    pub fn withhold_labels(self) -> Self {
        self.withhold_labels.store(true, Ordering::SeqCst);
        self
    }

    /// Make every enumeration fail
    pub fn fail_enumeration(&self, reason: &str) {
        *self.enumeration_failure.write() = Some(reason.to_string());
    }

    /// Make the next stream request fail
    pub fn fail_next_request(&self, error: AcquisitionError) {
        *self.request_failure.lock() = Some(error);
    }

    /// Whether new video tracks deliver frames immediately
    pub fn set_autoplay(&self, autoplay: bool) {
        self.autoplay.store(autoplay, Ordering::SeqCst);
    }

    /// Start frame delivery on every video track handed out so far
    pub fn start_playback(&self) {
        for playing in self.playback.lock().iter() {
            playing.store(true, Ordering::SeqCst);
        }
    }

    /// Every constraint set requested so far
    pub fn requests(&self) -> Vec<StreamConstraints> {
        self.requests.lock().clone()
    }

    /// Every stream handed out so far
    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.issued.lock().clone()
    }

    /// Live tracks across all issued streams
    pub fn live_track_count(&self) -> usize {
        self.issued.lock().iter().map(|s| s.live_track_count()).sum()
    }

    fn pick(
        devices: &[MockDevice],
        kind: DeviceKind,
        constraints: &TrackConstraints,
    ) -> Result<MockDevice, AcquisitionError> {
        let candidates: Vec<&MockDevice> = devices
            .iter()
            .filter(|d| d.descriptor.kind == kind)
            .collect();

        if let Some(device_id) = &constraints.device_id {
            let found = candidates
                .iter()
                .find(|d| &d.descriptor.device_id == device_id.value());
            return match (found, device_id.is_exact()) {
                (Some(d), _) => Ok((*d).clone()),
                (None, true) => Err(AcquisitionError::NotFound),
                (None, false) => candidates
                    .first()
                    .map(|d| (*d).clone())
                    .ok_or(AcquisitionError::NotFound),
            };
        }

        if let Some(facing) = constraints.facing_mode {
            if let Some(d) = candidates.iter().find(|d| d.facing_mode == Some(facing)) {
                return Ok((*d).clone());
            }
        }

        candidates
            .first()
            .map(|d| (*d).clone())
            .ok_or(AcquisitionError::NotFound)
    }

    fn video_settings(
        device: &MockDevice,
        constraints: &TrackConstraints,
    ) -> Result<TrackSettings, AcquisitionError> {
        for (name, value) in [("width", &constraints.width), ("height", &constraints.height)] {
            if let Some(ConstrainValue::Exact(v)) = value {
                if *v == 0 || *v > MAX_MOCK_DIMENSION {
                    return Err(AcquisitionError::Overconstrained {
                        constraint: name.to_string(),
                    });
                }
            }
        }

        let width = constraints.width.as_ref().map_or(DEFAULT_WIDTH, |v| *v.value());
        let height = constraints.height.as_ref().map_or(DEFAULT_HEIGHT, |v| *v.value());
        Ok(TrackSettings {
            width: Some(width),
            height: Some(height),
            frame_rate: Some(
                constraints
                    .frame_rate
                    .as_ref()
                    .map_or(DEFAULT_FRAME_RATE, |v| *v.value()),
            ),
            aspect_ratio: Some(width as f64 / height as f64),
            device_id: Some(device.descriptor.device_id.clone()),
            facing_mode: device.facing_mode,
        })
    }
}

#[async_trait]
impl SourceProvider for MockSourceProvider {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, String> {
        if let Some(reason) = self.enumeration_failure.read().clone() {
            return Err(reason);
        }

        let hide = self.withhold_labels.load(Ordering::SeqCst)
            && !self.permission_granted.load(Ordering::SeqCst);

        Ok(self
            .devices
            .read()
            .iter()
            .map(|d| {
                let mut descriptor = d.descriptor.clone();
                if hide {
                    descriptor.label.clear();
                }
                descriptor
            })
            .collect())
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<MediaStream, AcquisitionError> {
        self.requests.lock().push(constraints.clone());

        if let Some(error) = self.request_failure.lock().take() {
            return Err(error);
        }

        let devices = self.devices.read().clone();
        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();

        if let Some(video) = &constraints.video {
            let device = Self::pick(&devices, DeviceKind::VideoInput, video)?;
            let settings = Self::video_settings(&device, video)?;
            let playing = Arc::new(AtomicBool::new(self.autoplay.load(Ordering::SeqCst)));
            self.playback.lock().push(playing.clone());
            tracks.push(Arc::new(MockTrack::new(
                TrackKind::Video,
                &device.descriptor.label,
                settings,
                playing,
            )));
        }

        if let Some(audio) = &constraints.audio {
            let device = Self::pick(&devices, DeviceKind::AudioInput, audio)?;
            let settings = TrackSettings {
                device_id: Some(device.descriptor.device_id.clone()),
                ..Default::default()
            };
            tracks.push(Arc::new(MockTrack::new(
                TrackKind::Audio,
                &device.descriptor.label,
                settings,
                Arc::new(AtomicBool::new(true)),
            )));
        }

        if tracks.is_empty() {
            return Err(AcquisitionError::Other("no track kinds requested".to_string()));
        }

        self.permission_granted.store(true, Ordering::SeqCst);
        let stream = MediaStream::new(tracks);
        self.issued.lock().push(stream.clone());
        Ok(stream)
    }
}
