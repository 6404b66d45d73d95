//! Save-as side effect for snapshots and recordings

use crate::error::MediaResult;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Filename used for audio artifacts when none is given
pub const DEFAULT_AUDIO_FILENAME: &str = "audio";

/// Content handed to a [`DownloadSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPayload {
    /// A `data:` URL, as produced for snapshots
    DataUrl(String),
    /// Raw bytes with a MIME type
    Blob {
        /// Content type
        mime_type: String,
        /// Content bytes
        data: Bytes,
    },
}

impl DownloadPayload {
    /// Whether there is nothing to save
    pub fn is_empty(&self) -> bool {
        match self {
            DownloadPayload::DataUrl(url) => url.is_empty(),
            DownloadPayload::Blob { data, .. } => data.is_empty(),
        }
    }

    /// Decoded content bytes
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            DownloadPayload::Blob { data, .. } => Some(data.clone()),
            DownloadPayload::DataUrl(url) => {
                let (_, encoded) = url.split_once(";base64,")?;
                STANDARD.decode(encoded).ok().map(Bytes::from)
            }
        }
    }
}

/// Destination of a save-as action
pub trait DownloadSink: Send + Sync + fmt::Debug {
    /// Save the payload under the given filename
    fn save(&self, payload: DownloadPayload, filename: &str) -> MediaResult<()>;
}

/// Default filename, `CKW-<local time>`
pub fn default_filename() -> String {
    format!("CKW-{}", chrono::Local::now().to_rfc2822())
}

/// Trigger a download; `false` only when there is no payload
///
/// Sink failures are logged, the side effect being fire-and-forget.
pub fn download(sink: &dyn DownloadSink, payload: Option<DownloadPayload>, filename: Option<&str>) -> bool {
    let Some(payload) = payload.filter(|p| !p.is_empty()) else {
        return false;
    };

    let filename = filename.map_or_else(default_filename, str::to_string);
    debug!("Downloading {}", filename);
    if let Err(e) = sink.save(payload, &filename) {
        warn!("Download of {} failed: {}", filename, e);
    }
    true
}

/// Download a snapshot data URL
pub fn download_image(sink: &dyn DownloadSink, image: &str, filename: Option<&str>) -> bool {
    download(sink, Some(DownloadPayload::DataUrl(image.to_string())), filename)
}

/// Download a recorded video
pub fn download_video(sink: &dyn DownloadSink, mime_type: &str, data: Bytes, filename: Option<&str>) -> bool {
    download(
        sink,
        Some(DownloadPayload::Blob {
            mime_type: mime_type.to_string(),
            data,
        }),
        filename,
    )
}

/// Download a recorded audio track, named `audio` by default
pub fn download_audio(sink: &dyn DownloadSink, mime_type: &str, data: Bytes, filename: Option<&str>) -> bool {
    download_video(
        sink,
        mime_type,
        data,
        Some(filename.unwrap_or(DEFAULT_AUDIO_FILENAME)),
    )
}

/// Sink that keeps every download in memory
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    saved: Mutex<Vec<(String, DownloadPayload)>>,
}

impl MemoryDownloads {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(filename, payload)` saved so far, in order
    pub fn saved(&self) -> Vec<(String, DownloadPayload)> {
        self.saved.lock().clone()
    }
}

impl DownloadSink for MemoryDownloads {
    fn save(&self, payload: DownloadPayload, filename: &str) -> MediaResult<()> {
        self.saved.lock().push((filename.to_string(), payload));
        Ok(())
    }
}

/// Sink writing each download as a file in a directory
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    /// Write downloads into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectoryDownloads {
    fn save(&self, payload: DownloadPayload, filename: &str) -> MediaResult<()> {
        let data = payload.to_bytes().ok_or_else(|| crate::MediaError::Encoding {
            format: "data-url".to_string(),
            reason: "payload is not a base64 data URL".to_string(),
        })?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(filename), &data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_without_payload_fails() {
        let sink = MemoryDownloads::new();
        assert!(!download(&sink, None, Some("x")));
        assert!(!download_image(&sink, "", None));
        assert!(sink.saved().is_empty());
    }

    #[test]
    fn test_default_filenames() {
        let sink = MemoryDownloads::new();
        assert!(download_image(&sink, "data:image/png;base64,AAAA", None));
        assert!(download_audio(&sink, "audio/wav", Bytes::from_static(b"RIFF"), None));

        let saved = sink.saved();
        assert!(saved[0].0.starts_with("CKW-"));
        assert_eq!(saved[1].0, DEFAULT_AUDIO_FILENAME);
    }

    #[test]
    fn test_data_url_decodes() {
        let payload = DownloadPayload::DataUrl("data:image/png;base64,aGk=".to_string());
        assert_eq!(payload.to_bytes().unwrap(), Bytes::from_static(b"hi"));
    }
}
