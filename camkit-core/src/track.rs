//! Track abstractions and raw video frames

use crate::constraints::{FacingMode, TrackConstraints};
use crate::error::CoreError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Track media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Whether a track still delivers media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Delivering media
    Live,
    /// Stopped; the hardware is released
    Ended,
}

/// Settings currently in effect on a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    /// Frame width in pixels
    pub width: Option<u32>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Frames per second
    pub frame_rate: Option<f64>,
    /// Width divided by height
    pub aspect_ratio: Option<f64>,
    /// Backing device
    pub device_id: Option<String>,
    /// Camera facing direction
    pub facing_mode: Option<FacingMode>,
}

/// Raw RGBA video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGBA8 pixel data, row-major
    pub data: Bytes,
    /// Timestamp in milliseconds
    pub timestamp: u64,
}

impl VideoFrame {
    /// Bytes per RGBA pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Create a frame, checking the buffer length against the dimensions
    pub fn new(width: u32, height: u32, data: Bytes, timestamp: u64) -> Result<Self, CoreError> {
        let frame = Self {
            width,
            height,
            data,
            timestamp,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check that the buffer holds exactly `width`×`height` RGBA pixels
    pub fn validate(&self) -> Result<(), CoreError> {
        let expected = self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL;
        if self.data.len() != expected {
            return Err(CoreError::InvalidState {
                message: format!(
                    "frame buffer holds {} bytes, {}x{} RGBA needs {}",
                    self.data.len(),
                    self.width,
                    self.height,
                    expected
                ),
            });
        }
        Ok(())
    }

    /// Draw the frame at the origin of a `width`×`height` raster
    ///
    /// Pixels outside the frame stay transparent black; frame pixels outside
    /// the raster are cropped. Fails when the buffer does not match the
    /// frame's own dimensions.
    pub fn fit_to(&self, width: u32, height: u32) -> Result<Bytes, CoreError> {
        self.validate()?;
        if width == self.width && height == self.height {
            return Ok(self.data.clone());
        }

        let bpp = Self::BYTES_PER_PIXEL;
        let dst_stride = width as usize * bpp;
        let src_stride = self.width as usize * bpp;
        let copy_len = dst_stride.min(src_stride);
        let rows = height.min(self.height) as usize;

        let mut raster = BytesMut::zeroed(dst_stride * height as usize);
        for row in 0..rows {
            let src = &self.data[row * src_stride..row * src_stride + copy_len];
            raster[row * dst_stride..row * dst_stride + copy_len].copy_from_slice(src);
        }
        Ok(raster.freeze())
    }
}

/// One live hardware track
///
/// Handles are shared through `Arc`; [`clone_track`](MediaTrack::clone_track)
/// creates an independent track that must be stopped on its own.
#[async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    /// Track identifier
    fn id(&self) -> &str;

    /// Audio or video
    fn kind(&self) -> TrackKind;

    /// Device label
    fn label(&self) -> &str;

    /// Settings currently in effect
    fn settings(&self) -> TrackSettings;

    /// Live or ended
    fn state(&self) -> TrackState;

    /// Release the hardware; idempotent
    fn stop(&self);

    /// Independent track on the same source
    fn clone_track(&self) -> Arc<dyn MediaTrack>;

    /// Current frame, or `None` before playback starts and for audio tracks
    fn grab_frame(&self) -> Option<VideoFrame>;

    /// Apply a constraint update to the live track
    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, fill: u8) -> VideoFrame {
        let data = Bytes::from(vec![fill; (width * height * 4) as usize]);
        VideoFrame::new(width, height, data, 0).unwrap()
    }

    #[test]
    fn test_frame_length_checked() {
        let result = VideoFrame::new(2, 2, Bytes::from_static(&[0u8; 15]), 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_fit_to_pads_and_crops() {
        let small = frame(2, 1, 9);
        let padded = small.fit_to(3, 2).unwrap();
        assert_eq!(padded.len(), 3 * 2 * 4);
        assert_eq!(&padded[..8], &[9u8; 8]);
        assert_eq!(&padded[8..12], &[0u8; 4]);
        assert!(padded[12..].iter().all(|b| *b == 0));

        let large = frame(4, 4, 7);
        let cropped = large.fit_to(2, 2).unwrap();
        assert_eq!(cropped.len(), 2 * 2 * 4);
        assert!(cropped.iter().all(|b| *b == 7));
    }

    #[test]
    fn test_fit_to_rejects_short_buffer() {
        // Built directly, bypassing the length check in `new`
        let short = VideoFrame {
            width: 4,
            height: 4,
            data: Bytes::from(vec![1u8; 16]),
            timestamp: 0,
        };
        assert!(matches!(short.fit_to(2, 2), Err(CoreError::InvalidState { .. })));
        assert!(short.fit_to(4, 4).is_err());
        assert!(short.fit_to(8, 8).is_err());
    }
}
