//! Platform seam for device enumeration and stream acquisition

use crate::constraints::StreamConstraints;
use crate::error::AcquisitionError;
use crate::stream::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind reported by the platform for an enumerated device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Microphone or other audio input
    AudioInput,
    /// Camera or other video input
    VideoInput,
    /// Speaker or other audio output
    AudioOutput,
    /// Anything the platform reports that is not listed above
    Other(String),
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::AudioInput => write!(f, "audioinput"),
            DeviceKind::VideoInput => write!(f, "videoinput"),
            DeviceKind::AudioOutput => write!(f, "audiooutput"),
            DeviceKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Raw device entry as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Platform device identifier
    pub device_id: String,
    /// Identifier shared by devices on the same physical hardware
    pub group_id: String,
    /// Device kind
    pub kind: DeviceKind,
    /// Human-readable label, empty while permission is withheld
    pub label: String,
}

/// Source of live media streams and device lists
///
/// Every successful [`request_stream`](SourceProvider::request_stream) call
/// yields a new, independently owned stream, even for the same device.
#[async_trait]
pub trait SourceProvider: Send + Sync + fmt::Debug {
    /// List the devices currently visible to the platform
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, String>;

    /// Open a live stream satisfying the constraints
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<MediaStream, AcquisitionError>;
}
