//! Still-image capture from live video feeds

use crate::download::{download_image, DownloadSink};
use crate::error::{MediaError, MediaResult};
use crate::storage::{ImageStorage, StorageMethod};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use camkit_core::{StreamSource, VideoFeed, VideoFrame};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MIME type of every captured image
pub const IMAGE_MIME_TYPE: &str = "image/png";

/// A captured still image
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// Image content type
    pub mime_type: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoded image bytes
    pub data: Bytes,
}

impl EncodedImage {
    /// Render as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

/// Encode an RGBA frame as PNG
pub fn encode_png(frame: &VideoFrame) -> MediaResult<EncodedImage> {
    let encoding_error = |e: png::EncodingError| MediaError::Encoding {
        format: IMAGE_MIME_TYPE.to_string(),
        reason: e.to_string(),
    };

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(encoding_error)?;
        writer.write_image_data(&frame.data).map_err(encoding_error)?;
        writer.finish().map_err(encoding_error)?;
    }

    Ok(EncodedImage {
        mime_type: IMAGE_MIME_TYPE.to_string(),
        width: frame.width,
        height: frame.height,
        data: Bytes::from(out),
    })
}

/// Options for [`Shutter::capture`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Feed to capture from
    pub source: StreamSource,
    /// Store the image even when storage is disabled in settings
    pub persist: bool,
}

/// Takes snapshots from a session's original or preview feed
#[derive(Debug)]
pub struct Shutter {
    original: VideoFeed,
    preview: VideoFeed,
    latest_capture: Option<EncodedImage>,
    storage: Option<ImageStorage>,
    storage_method: StorageMethod,
    downloads: Arc<dyn DownloadSink>,
}

impl Shutter {
    /// Create a shutter over the two feeds; storage is off until configured
    pub fn new(original: VideoFeed, preview: VideoFeed, downloads: Arc<dyn DownloadSink>) -> Self {
        Self {
            original,
            preview,
            latest_capture: None,
            storage: None,
            storage_method: StorageMethod::Disabled,
            downloads,
        }
    }

    /// Persist snapshots to `storage` using `method` by default
    pub fn with_storage(mut self, storage: ImageStorage, method: StorageMethod) -> Self {
        self.storage = Some(storage);
        self.storage_method = method;
        self
    }

    /// Change the default storage tier
    pub fn set_storage_method(&mut self, method: StorageMethod) {
        self.storage_method = method;
    }

    /// Current default storage tier
    pub fn storage_method(&self) -> StorageMethod {
        self.storage_method
    }

    /// Rebind one feed, e.g. after a source swap
    pub fn set_feed(&mut self, source: StreamSource, feed: VideoFeed) {
        match source {
            StreamSource::Original => self.original = feed,
            StreamSource::Preview => self.preview = feed,
        }
    }

    fn feed(&self, source: StreamSource) -> &VideoFeed {
        match source {
            StreamSource::Original => &self.original,
            StreamSource::Preview => &self.preview,
        }
    }

    /// Capture the current frame of the chosen feed
    ///
    /// Fails with `NoFrameAvailable` while the feed is not playing; the
    /// latest capture is left untouched in that case.
    pub fn capture(&mut self, options: CaptureOptions) -> MediaResult<EncodedImage> {
        let frame = self.feed(options.source).draw()?;
        let image = encode_png(&frame)?;
        debug!(
            "Captured {}x{} image from {} feed",
            image.width, image.height, options.source
        );

        if options.persist || self.storage_method.is_enabled() {
            let method = if self.storage_method.is_enabled() {
                self.storage_method
            } else {
                StorageMethod::Local
            };
            match &self.storage {
                Some(storage) => {
                    if let Err(e) = storage.save_image(&image.to_data_url(), method) {
                        warn!("Could not persist capture: {}", e);
                    }
                }
                None => debug!("No image storage configured, capture not persisted"),
            }
        }

        self.latest_capture = Some(image.clone());
        Ok(image)
    }

    /// Most recent successful capture
    pub fn latest_capture(&self) -> Option<&EncodedImage> {
        self.latest_capture.as_ref()
    }

    /// Download the most recent capture; `false` if nothing was captured
    pub fn download_latest_capture(&self, filename: Option<&str>) -> bool {
        match &self.latest_capture {
            Some(image) => {
                info!("Downloading latest capture");
                download_image(self.downloads.as_ref(), &image.to_data_url(), filename)
            }
            None => false,
        }
    }

    /// Capture, then download the result
    pub fn capture_and_download(
        &mut self,
        options: CaptureOptions,
        filename: Option<&str>,
    ) -> MediaResult<bool> {
        self.capture(options)?;
        Ok(self.download_latest_capture(filename))
    }
}
