//! Source catalog: enumerates and labels capture devices

use crate::constraints::StreamConstraints;
use crate::error::{CoreError, CoreResult};
use crate::provider::{DeviceDescriptor, DeviceKind, SourceProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Label used when the platform withholds a video device name
pub const UNNAMED_VIDEO_INPUT: &str = "Unnamed video input";
/// Label used when the platform withholds an audio device name
pub const UNNAMED_AUDIO_INPUT: &str = "Unnamed audio input";

/// Kind of capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Audio input
    Audio,
    /// Video input
    Video,
}

/// One physical input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSource {
    /// Platform device identifier
    pub device_id: String,
    /// Hardware group identifier
    pub group_id: String,
    /// Audio or video
    pub kind: SourceKind,
    /// Display label, never empty
    pub label: String,
}

impl CaptureSource {
    /// Build a source from a platform entry, or `None` for non-input kinds
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Option<Self> {
        let (kind, fallback) = match descriptor.kind {
            DeviceKind::VideoInput => (SourceKind::Video, UNNAMED_VIDEO_INPUT),
            DeviceKind::AudioInput => (SourceKind::Audio, UNNAMED_AUDIO_INPUT),
            _ => return None,
        };

        let label = if descriptor.label.is_empty() {
            fallback.to_string()
        } else {
            descriptor.label.clone()
        };

        Some(Self {
            device_id: descriptor.device_id.clone(),
            group_id: descriptor.group_id.clone(),
            kind,
            label,
        })
    }
}

/// Enumerated sources split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceList {
    /// Audio inputs
    pub audio_sources: Vec<CaptureSource>,
    /// Video inputs
    pub video_sources: Vec<CaptureSource>,
}

impl SourceList {
    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.audio_sources.is_empty() && self.video_sources.is_empty()
    }
}

/// Options for [`list_sources`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Briefly open a stream first when labels are withheld
    pub request_permission: bool,
}

/// Enumerate the audio and video inputs visible to the platform
///
/// Output devices and unknown kinds are dropped. With
/// [`ListOptions::request_permission`] set and labels missing, a throwaway
/// stream is opened and immediately released so the platform fills in the
/// labels, then the device list is read again.
pub async fn list_sources(
    provider: &dyn SourceProvider,
    options: &ListOptions,
) -> CoreResult<SourceList> {
    let mut devices = enumerate(provider).await?;

    if options.request_permission && labels_withheld(&devices) {
        let wants_audio = devices.iter().any(|d| d.kind == DeviceKind::AudioInput);
        let wants_video = devices.iter().any(|d| d.kind == DeviceKind::VideoInput);

        match provider
            .request_stream(&StreamConstraints::any(wants_audio, wants_video))
            .await
        {
            Ok(stream) => {
                stream.stop_all();
                devices = enumerate(provider).await?;
            }
            Err(e) => warn!("Permission prompt stream failed, labels stay generic: {}", e),
        }
    }

    let mut list = SourceList::default();
    for device in &devices {
        match CaptureSource::from_descriptor(device) {
            Some(source) if source.kind == SourceKind::Video => list.video_sources.push(source),
            Some(source) => list.audio_sources.push(source),
            None => debug!("Other input type detected: {}", device.kind),
        }
    }

    debug!(
        "Found {} audio and {} video sources",
        list.audio_sources.len(),
        list.video_sources.len()
    );
    Ok(list)
}

async fn enumerate(provider: &dyn SourceProvider) -> CoreResult<Vec<DeviceDescriptor>> {
    provider
        .enumerate_devices()
        .await
        .map_err(|reason| CoreError::DeviceEnumeration { reason })
}

fn labels_withheld(devices: &[DeviceDescriptor]) -> bool {
    devices.iter().any(|d| {
        matches!(d.kind, DeviceKind::AudioInput | DeviceKind::VideoInput) && d.label.is_empty()
    })
}
