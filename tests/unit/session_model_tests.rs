//! Unit tests for the session phase machine and the durable mirror.

use loomd::models::session::{PersistedState, SessionPhase, STATE_SCHEMA_VERSION};

#[test]
fn load_always_passes_through_loading() {
    assert!(SessionPhase::Unloaded.can_transition_to(SessionPhase::Loading));
    assert!(!SessionPhase::Unloaded.can_transition_to(SessionPhase::Ready));
}

#[test]
fn loading_resolves_to_ready_or_error() {
    assert!(SessionPhase::Loading.can_transition_to(SessionPhase::Ready));
    assert!(SessionPhase::Loading.can_transition_to(SessionPhase::Error));
    assert!(!SessionPhase::Loading.can_transition_to(SessionPhase::Unloaded));
}

#[test]
fn ready_and_error_unwind_to_unloaded() {
    assert!(SessionPhase::Ready.can_transition_to(SessionPhase::Unloaded));
    assert!(SessionPhase::Error.can_transition_to(SessionPhase::Unloaded));
    assert!(!SessionPhase::Ready.can_transition_to(SessionPhase::Loading));
    assert!(!SessionPhase::Error.can_transition_to(SessionPhase::Loading));
}

#[test]
fn phase_wire_labels_round_trip() {
    for phase in [
        SessionPhase::Unloaded,
        SessionPhase::Loading,
        SessionPhase::Ready,
        SessionPhase::Error,
    ] {
        assert_eq!(SessionPhase::parse(phase.as_str()), Some(phase));
    }
    assert_eq!(SessionPhase::parse("suspended"), None);
}

#[test]
fn phase_serializes_to_snake_case() {
    let json = serde_json::to_string(&SessionPhase::Unloaded).expect("serialize");
    assert_eq!(json, "\"unloaded\"");
}

#[test]
fn snapshot_is_stamped_with_current_schema() {
    let state = PersistedState::now(SessionPhase::Ready, Some("m".into()));
    assert_eq!(state.schema_version, STATE_SCHEMA_VERSION);
    assert!(state.saved_at_epoch_ms > 0);
}

#[test]
fn staleness_is_a_strict_bound() {
    let state = PersistedState {
        phase: SessionPhase::Ready,
        session_id: None,
        saved_at_epoch_ms: 1_000,
        schema_version: STATE_SCHEMA_VERSION,
    };
    // Exactly at the bound: not yet stale.
    assert!(!state.is_stale(500, 1_500));
    assert!(state.is_stale(500, 1_501));
}

#[test]
fn future_timestamps_are_not_stale() {
    let state = PersistedState {
        phase: SessionPhase::Unloaded,
        session_id: None,
        saved_at_epoch_ms: 2_000,
        schema_version: STATE_SCHEMA_VERSION,
    };
    assert!(!state.is_stale(500, 1_000));
}
