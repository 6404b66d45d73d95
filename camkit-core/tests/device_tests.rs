//! Unit tests for the source catalog

use camkit_core::mock::{MockDevice, MockSourceProvider};
use camkit_core::*;
use tokio_test::assert_err;

#[tokio::test]
async fn test_lists_cameras_and_microphones() {
    let provider = MockSourceProvider::with_devices(vec![
        MockDevice::camera("camA", "Camera A", None),
        MockDevice::camera("camB", "Camera B", None),
        MockDevice::microphone("mic", "Microphone"),
    ]);

    let list = list_sources(&provider, &ListOptions::default()).await.unwrap();

    assert_eq!(list.video_sources.len(), 2);
    assert_eq!(list.video_sources[0].device_id, "camA");
    assert_eq!(list.video_sources[1].device_id, "camB");
    assert!(list.video_sources.iter().all(|s| !s.label.is_empty()));
    assert_eq!(list.audio_sources.len(), 1);
    assert_eq!(list.audio_sources[0].kind, SourceKind::Audio);
}

#[tokio::test]
async fn test_withheld_labels_fall_back_to_placeholders() {
    let provider = MockSourceProvider::with_devices(vec![
        MockDevice::camera("camA", "Camera A", None),
        MockDevice::camera("camB", "Camera B", None),
        MockDevice::microphone("mic", "Microphone"),
    ])
    .withhold_labels();

    let list = list_sources(&provider, &ListOptions::default()).await.unwrap();

    assert_eq!(list.video_sources.len(), 2);
    for source in &list.video_sources {
        assert_eq!(source.label, UNNAMED_VIDEO_INPUT);
    }
    assert_eq!(list.audio_sources[0].label, UNNAMED_AUDIO_INPUT);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_permission_prompt_populates_labels() {
    let provider = MockSourceProvider::with_devices(vec![
        MockDevice::camera("camA", "Camera A", None),
        MockDevice::microphone("mic", "Microphone"),
    ])
    .withhold_labels();

    let options = ListOptions {
        request_permission: true,
    };
    let list = list_sources(&provider, &options).await.unwrap();

    assert_eq!(list.video_sources[0].label, "Camera A");
    assert_eq!(list.audio_sources[0].label, "Microphone");

    // The throwaway stream must not stay open
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(provider.live_track_count(), 0);
}

#[tokio::test]
async fn test_outputs_and_unknown_kinds_are_dropped() {
    let provider = MockSourceProvider::with_devices(vec![
        MockDevice::camera("cam", "Camera", None),
        MockDevice::other("speaker", DeviceKind::AudioOutput),
        MockDevice::other("thing", DeviceKind::Other("midiinput".to_string())),
    ]);

    let list = list_sources(&provider, &ListOptions::default()).await.unwrap();

    assert_eq!(list.video_sources.len(), 1);
    assert!(list.audio_sources.is_empty());
}

#[tokio::test]
async fn test_enumeration_failure_is_typed() {
    let provider = MockSourceProvider::new();
    provider.fail_enumeration("media devices unavailable");

    let error = assert_err!(list_sources(&provider, &ListOptions::default()).await);
    match error {
        CoreError::DeviceEnumeration { reason } => {
            assert_eq!(reason, "media devices unavailable")
        }
        other => panic!("Expected DeviceEnumeration, got {:?}", other),
    }
}

#[test]
fn test_capture_source_from_descriptor() {
    let descriptor = DeviceDescriptor {
        device_id: "x".to_string(),
        group_id: "g".to_string(),
        kind: DeviceKind::AudioOutput,
        label: "Speaker".to_string(),
    };
    assert!(CaptureSource::from_descriptor(&descriptor).is_none());
}
