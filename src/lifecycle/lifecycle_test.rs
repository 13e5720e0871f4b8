//! Tests for lifecycle flags and phase transitions

use super::*;

#[test]
fn test_initial_state() {
    let state = LifecycleState::new();

    assert!(!state.is_ready());
    assert!(!state.is_started());
    assert!(!state.is_healthy());
    assert_eq!(state.phase(), DrainPhase::Running);
    assert!(!state.is_draining());
}

#[test]
fn test_flags_are_shared_between_clones() {
    let state = LifecycleState::new();
    let cloned = state.clone();

    state.mark_ready();
    state.mark_started();
    state.set_healthy(true);

    assert!(cloned.is_ready());
    assert!(cloned.is_started());
    assert!(cloned.is_healthy());
}

#[test]
fn test_begin_draining_clears_ready() {
    let state = LifecycleState::new();
    assert!(state.mark_ready());

    assert!(state.begin_draining());

    assert!(!state.is_ready());
    assert_eq!(state.phase(), DrainPhase::Draining);
}

#[test]
fn test_begin_draining_only_once() {
    let state = LifecycleState::new();

    assert!(state.begin_draining());
    assert!(!state.begin_draining());
    assert_eq!(state.phase(), DrainPhase::Draining);
}

#[test]
fn test_ready_refused_while_draining() {
    let state = LifecycleState::new();
    state.begin_draining();

    assert!(!state.mark_ready());
    assert!(!state.is_ready());
}

#[test]
fn test_finish_stopping_requires_draining() {
    let state = LifecycleState::new();

    assert!(
        !state.finish_stopping(),
        "cannot stop without draining first"
    );
    assert_eq!(state.phase(), DrainPhase::Running);

    state.begin_draining();
    assert!(state.finish_stopping());
    assert!(!state.finish_stopping());
    assert_eq!(state.phase(), DrainPhase::Stopped);
}

#[test]
fn test_stopped_clears_all_flags() {
    let state = LifecycleState::new();
    state.mark_started();
    state.set_healthy(true);
    state.begin_draining();

    state.finish_stopping();

    assert!(!state.is_ready());
    assert!(!state.is_started());
    assert!(!state.is_healthy());
    assert!(state.is_draining());
}
