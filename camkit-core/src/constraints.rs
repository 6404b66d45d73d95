//! Track selectors and the constraint resolver
//!
//! A [`TrackSelector`] is whatever the caller used to pick an input: an
//! enumerated [`CaptureSource`], a raw [`TrackConstraints`] value, the
//! symbolic names `"front"` / `"back"`, or nothing at all. [`resolve`] turns
//! it into the constraints a [`SourceProvider`](crate::SourceProvider) is
//! asked to satisfy.

use crate::devices::CaptureSource;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Camera facing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Facing the user (front camera)
    User,
    /// Facing away from the user (back camera)
    Environment,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// A constrained value, either required or preferred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstrainValue<T> {
    /// The track must match exactly
    Exact(T),
    /// The track should match if it can
    Ideal(T),
}

impl<T> ConstrainValue<T> {
    /// The constrained value regardless of strength
    pub fn value(&self) -> &T {
        match self {
            ConstrainValue::Exact(v) | ConstrainValue::Ideal(v) => v,
        }
    }

    /// Whether the constraint is mandatory
    pub fn is_exact(&self) -> bool {
        matches!(self, ConstrainValue::Exact(_))
    }
}

/// Constraints for a single audio or video track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConstraints {
    /// Device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<ConstrainValue<String>>,
    /// Camera facing direction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing_mode: Option<FacingMode>,
    /// Frame width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstrainValue<u32>>,
    /// Frame height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstrainValue<u32>>,
    /// Width divided by height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<ConstrainValue<f64>>,
    /// Frames per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<ConstrainValue<f64>>,
}

impl TrackConstraints {
    /// Constraints pinning one specific device
    pub fn exact_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(ConstrainValue::Exact(device_id.into())),
            ..Default::default()
        }
    }

    /// Constraints selecting a camera by facing direction
    pub fn facing(mode: FacingMode) -> Self {
        Self {
            facing_mode: Some(mode),
            ..Default::default()
        }
    }

    /// Whether no constraint is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Render in the W3C `MediaTrackConstraints` shape
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}

/// Any accepted way of choosing an input track
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TrackSelector {
    /// An enumerated device
    Source(CaptureSource),
    /// Raw constraints passed through unchanged
    Constraints(TrackConstraints),
    /// `"front"` or `"back"`
    Symbolic(String),
    /// Track not requested
    #[default]
    Absent,
}

impl TrackSelector {
    /// Whether this selector requests nothing
    pub fn is_absent(&self) -> bool {
        matches!(self, TrackSelector::Absent)
    }
}

impl From<CaptureSource> for TrackSelector {
    fn from(source: CaptureSource) -> Self {
        TrackSelector::Source(source)
    }
}

impl From<Option<CaptureSource>> for TrackSelector {
    fn from(source: Option<CaptureSource>) -> Self {
        source.map_or(TrackSelector::Absent, TrackSelector::Source)
    }
}

impl From<TrackConstraints> for TrackSelector {
    fn from(constraints: TrackConstraints) -> Self {
        TrackSelector::Constraints(constraints)
    }
}

impl From<&str> for TrackSelector {
    fn from(name: &str) -> Self {
        TrackSelector::Symbolic(name.to_string())
    }
}

/// Resolve a selector into concrete track constraints
///
/// `Absent` resolves to empty constraints. Symbolic names other than
/// `front` and `back` are rejected with [`CoreError::InvalidSelector`].
pub fn resolve(selector: &TrackSelector) -> CoreResult<TrackConstraints> {
    match selector {
        TrackSelector::Absent => Ok(TrackConstraints::default()),
        TrackSelector::Symbolic(name) => match name.as_str() {
            "front" => Ok(TrackConstraints::facing(FacingMode::User)),
            "back" => Ok(TrackConstraints::facing(FacingMode::Environment)),
            other => Err(CoreError::InvalidSelector {
                selector: other.to_string(),
            }),
        },
        TrackSelector::Source(source) => Ok(TrackConstraints::exact_device(&source.device_id)),
        TrackSelector::Constraints(constraints) => Ok(constraints.clone()),
    }
}

/// Constraints for a whole stream request
///
/// `None` leaves that kind of track out of the request. `Some` with empty
/// constraints asks for any device of that kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamConstraints {
    /// Audio track constraints
    pub audio: Option<TrackConstraints>,
    /// Video track constraints
    pub video: Option<TrackConstraints>,
}

impl StreamConstraints {
    /// Resolve a video and an audio selector into one stream request
    pub fn from_selectors(video: &TrackSelector, audio: &TrackSelector) -> CoreResult<Self> {
        if video.is_absent() && audio.is_absent() {
            return Err(CoreError::NoMediaSource);
        }

        let video = if video.is_absent() {
            None
        } else {
            Some(resolve(video)?)
        };
        let audio = if audio.is_absent() {
            None
        } else {
            Some(resolve(audio)?)
        };

        Ok(Self { audio, video })
    }

    /// Request any device for the listed kinds
    pub fn any(audio: bool, video: bool) -> Self {
        Self {
            audio: audio.then(TrackConstraints::default),
            video: video.then(TrackConstraints::default),
        }
    }

    /// Render in the W3C `MediaStreamConstraints` shape
    pub fn to_json(&self) -> Value {
        let render = |track: &Option<TrackConstraints>| match track {
            None => Value::Bool(false),
            Some(c) if c.is_empty() => Value::Bool(true),
            Some(c) => c.to_json(),
        };

        json!({
            "audio": render(&self.audio),
            "video": render(&self.video),
        })
    }
}
