//! Host collaborators a [`CameraKit`](crate::CameraKit) runs against

use camkit_core::mock::MockSourceProvider;
use camkit_core::SourceProvider;
use camkit_media::mock::{MockEncoderFactory, MockRecorderFactory};
use camkit_media::{DownloadSink, ImageStorage, MemoryDownloads, NativeRecorderFactory, RecordingEnvironment};
use std::sync::Arc;

/// Everything the library needs from the host
#[derive(Debug, Clone)]
pub struct Platform {
    /// Device enumeration and stream acquisition
    pub sources: Arc<dyn SourceProvider>,
    /// Native recorder and software encoder
    pub recording: RecordingEnvironment,
    /// Local and session key/value tiers for snapshots
    pub storage: ImageStorage,
    /// Save-as side effect
    pub downloads: Arc<dyn DownloadSink>,
}

/// In-memory platform plus handles to drive and inspect its parts
#[derive(Debug, Clone)]
pub struct MockPlatform {
    /// The assembled platform
    pub platform: Platform,
    /// Mock cameras and microphone
    pub sources: Arc<MockSourceProvider>,
    /// Native recorder; also records audio alongside the fallback
    pub native: Arc<MockRecorderFactory>,
    /// Self-driving software encoder
    pub encoder: Arc<MockEncoderFactory>,
    /// Captured downloads
    pub downloads: Arc<MemoryDownloads>,
}

impl Platform {
    /// Fully in-memory platform for tests and headless use
    pub fn mock() -> MockPlatform {
        let sources = Arc::new(MockSourceProvider::new());
        let native = Arc::new(MockRecorderFactory::new());
        let encoder = Arc::new(MockEncoderFactory::new());
        let downloads = Arc::new(MemoryDownloads::new());

        let recorder: Arc<dyn NativeRecorderFactory> = native.clone();
        let platform = Platform {
            sources: sources.clone(),
            recording: RecordingEnvironment {
                native: Some(recorder.clone()),
                encoder: encoder.clone(),
                audio: Some(recorder),
            },
            storage: ImageStorage::in_memory(),
            downloads: downloads.clone(),
        };

        MockPlatform {
            platform,
            sources,
            native,
            encoder,
            downloads,
        }
    }
}
