//! Media streams and the video feeds bound to them

use crate::error::{CoreError, CoreResult};
use crate::track::{MediaTrack, TrackKind, TrackState, VideoFrame};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which of a session's two streams an operation targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    /// Full-resolution primary stream
    #[default]
    Original,
    /// Clone intended for on-screen display
    Preview,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Original => write!(f, "original"),
            StreamSource::Preview => write!(f, "preview"),
        }
    }
}

/// Width, height and frame rate of a stream's video track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSpecs {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub framerate: f64,
}

/// Live handle to a set of tracks
///
/// `Clone` shares the same tracks. Use [`clone_tracks`](Self::clone_tracks)
/// for an independent copy whose tracks must be released separately.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    /// Create a stream over the given tracks
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// Stream identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All tracks
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Video tracks in order
    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Audio tracks in order
    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// First video track, if any
    pub fn first_video_track(&self) -> Option<&Arc<dyn MediaTrack>> {
        self.video_tracks().next()
    }

    /// Whether the stream carries a video track
    pub fn has_video(&self) -> bool {
        self.first_video_track().is_some()
    }

    /// Whether the stream carries an audio track
    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    /// Independent copy with freshly cloned tracks
    pub fn clone_tracks(&self) -> MediaStream {
        MediaStream::new(self.tracks.iter().map(|t| t.clone_track()).collect())
    }

    /// Independent copy without audio, suitable for passive display
    pub fn video_only_clone(&self) -> MediaStream {
        MediaStream::new(self.video_tracks().map(|t| t.clone_track()).collect())
    }

    /// Handle sharing only this stream's audio tracks
    pub fn audio_only(&self) -> MediaStream {
        MediaStream::new(self.audio_tracks().cloned().collect())
    }

    /// Stop every track
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Number of tracks still live
    pub fn live_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.state() == TrackState::Live)
            .count()
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.live_track_count() > 0
    }

    /// Video dimensions and frame rate, when all are known
    pub fn video_specs(&self) -> Option<VideoSpecs> {
        let settings = self.first_video_track()?.settings();
        match (settings.width, settings.height, settings.frame_rate) {
            (Some(width), Some(height), Some(framerate)) if width > 0 && height > 0 && framerate > 0.0 => {
                Some(VideoSpecs {
                    width,
                    height,
                    framerate,
                })
            }
            _ => None,
        }
    }
}

/// Read-only view of a stream's first video track, like a playing video element
#[derive(Debug, Clone)]
pub struct VideoFeed {
    stream: MediaStream,
}

impl VideoFeed {
    /// Bind a feed to a stream
    pub fn attach(stream: MediaStream) -> Self {
        Self { stream }
    }

    /// The bound stream
    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    /// Native size of the frames currently delivered; `(0, 0)` before playback
    pub fn video_size(&self) -> (u32, u32) {
        self.stream
            .first_video_track()
            .and_then(|t| t.grab_frame())
            .map_or((0, 0), |f| (f.width, f.height))
    }

    /// Current frame at native resolution
    pub fn draw(&self) -> CoreResult<VideoFrame> {
        let frame = self
            .stream
            .first_video_track()
            .filter(|t| t.state() == TrackState::Live)
            .and_then(|t| t.grab_frame());

        match frame {
            Some(frame) if frame.width > 0 && frame.height > 0 => Ok(frame),
            Some(frame) => Err(CoreError::NoFrameAvailable {
                width: frame.width,
                height: frame.height,
            }),
            None => Err(CoreError::NoFrameAvailable {
                width: 0,
                height: 0,
            }),
        }
    }
}
