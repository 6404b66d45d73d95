//! # camkit media
//!
//! Snapshots, recording and their side effects for camkit capture sessions.
//! This crate holds the [`Shutter`], the [`Recorder`] facade with its native
//! and software-encoder backends, WebM finalization, snapshot storage and
//! the download side effect.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod download;
pub mod error;
pub mod mock;
pub mod recording;
pub mod shutter;
pub mod storage;
pub mod webm;

// Re-export main types
pub use download::{
    default_filename, download, download_audio, download_image, download_video,
    DirectoryDownloads, DownloadPayload, DownloadSink, MemoryDownloads,
};
pub use error::{MediaError, MediaResult};
pub use recording::{
    BackendKind, EncoderParams, EncoderState, EncoderWorker, EncoderWorkerFactory,
    FallbackBackend, FallbackConfig, HostMessage, NativeBackend, NativeRecorderFactory,
    NativeRecorderHandle, PartialFallbackConfig, Recorder, RecorderEvent, Recording,
    RecordingBackend, RecordingEnvironment, RecordingOutput, RecordingStats, StreamRecorder,
    WorkerEndpoint, WorkerMessage, WorkerState,
};
pub use shutter::{encode_png, CaptureOptions, EncodedImage, Shutter};
pub use storage::{ImageStorage, KeyValueStore, MemoryStore, StorageMethod, IMAGE_STORAGE_KEY};
pub use webm::{make_seekable, probe, repair_recording, RepairError, WebmInfo};
