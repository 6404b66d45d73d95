//! Unit tests for the track constraint resolver
//!
//! Covers every selector shape, idempotent resolution, and stream-level
//! constraint assembly.

use camkit_core::*;

fn camera(id: &str) -> CaptureSource {
    CaptureSource {
        device_id: id.to_string(),
        group_id: "group".to_string(),
        kind: SourceKind::Video,
        label: "Camera".to_string(),
    }
}

#[test]
fn test_absent_resolves_to_empty() {
    let constraints = resolve(&TrackSelector::Absent).unwrap();
    assert!(constraints.is_empty());
}

#[test]
fn test_symbolic_facing_modes() {
    let front = resolve(&TrackSelector::from("front")).unwrap();
    assert_eq!(front.facing_mode, Some(FacingMode::User));
    assert!(front.device_id.is_none());

    let back = resolve(&TrackSelector::from("back")).unwrap();
    assert_eq!(back.facing_mode, Some(FacingMode::Environment));
}

#[test]
fn test_unknown_symbol_rejected() {
    let result = resolve(&TrackSelector::from("sideways"));
    match result {
        Err(CoreError::InvalidSelector { selector }) => assert_eq!(selector, "sideways"),
        other => panic!("Expected InvalidSelector, got {:?}", other),
    }
}

#[test]
fn test_source_resolves_to_exact_device() {
    let constraints = resolve(&TrackSelector::from(camera("cam-a"))).unwrap();
    assert_eq!(
        constraints.device_id,
        Some(ConstrainValue::Exact("cam-a".to_string()))
    );
}

#[test]
fn test_raw_constraints_pass_through() {
    let raw = TrackConstraints {
        width: Some(ConstrainValue::Ideal(1920)),
        frame_rate: Some(ConstrainValue::Exact(60.0)),
        ..Default::default()
    };
    let resolved = resolve(&TrackSelector::from(raw.clone())).unwrap();
    assert_eq!(resolved, raw);
}

#[test]
fn test_resolution_is_idempotent() {
    let selectors = vec![
        TrackSelector::Absent,
        TrackSelector::from("front"),
        TrackSelector::from("back"),
        TrackSelector::from(camera("cam-b")),
        TrackSelector::from(TrackConstraints::exact_device("cam-c")),
    ];

    for selector in selectors {
        let first = resolve(&selector).unwrap();
        let second = resolve(&selector).unwrap();
        assert_eq!(first, second);

        let again = resolve(&TrackSelector::Constraints(first.clone())).unwrap();
        assert_eq!(again, first);
    }
}

#[test]
fn test_stream_constraints_require_a_source() {
    let result = StreamConstraints::from_selectors(&TrackSelector::Absent, &TrackSelector::Absent);
    assert!(matches!(result, Err(CoreError::NoMediaSource)));
}

#[test]
fn test_stream_constraints_leave_absent_kinds_out() {
    let request =
        StreamConstraints::from_selectors(&TrackSelector::from("back"), &TrackSelector::Absent)
            .unwrap();
    assert!(request.audio.is_none());
    assert_eq!(
        request.video.unwrap().facing_mode,
        Some(FacingMode::Environment)
    );
}

#[test]
fn test_stream_constraints_fail_fast_on_bad_symbol() {
    let result = StreamConstraints::from_selectors(
        &TrackSelector::from(camera("cam-a")),
        &TrackSelector::from("loud"),
    );
    assert!(matches!(result, Err(CoreError::InvalidSelector { .. })));
}
