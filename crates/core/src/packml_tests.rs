// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::*;
use proptest::prelude::*;

#[test]
fn state_values_match_vdi_numbering() {
    assert_eq!(PackMlState::Undefined.value(), 0);
    assert_eq!(PackMlState::Idle.value(), 1);
    assert_eq!(PackMlState::Execute.value(), 3);
    assert_eq!(PackMlState::Aborted.value(), 12);
    assert_eq!(PackMlState::Resetting.value(), 17);
}

#[test]
fn command_values_match_vdi_numbering() {
    assert_eq!(PackMlCommand::Reset.value(), 1);
    assert_eq!(PackMlCommand::Start.value(), 2);
    assert_eq!(PackMlCommand::Complete.value(), 10);
}

#[yare::parameterized(
    idle_start        = { PackMlState::Idle, PackMlCommand::Start, Some(PackMlState::Starting) },
    idle_stop         = { PackMlState::Idle, PackMlCommand::Stop, Some(PackMlState::Stopping) },
    idle_abort        = { PackMlState::Idle, PackMlCommand::Abort, Some(PackMlState::Aborting) },
    idle_hold         = { PackMlState::Idle, PackMlCommand::Hold, None },
    execute_hold      = { PackMlState::Execute, PackMlCommand::Hold, Some(PackMlState::Holding) },
    execute_suspend   = { PackMlState::Execute, PackMlCommand::Suspend, Some(PackMlState::Suspending) },
    execute_complete  = { PackMlState::Execute, PackMlCommand::Complete, Some(PackMlState::Completing) },
    held_unhold       = { PackMlState::Held, PackMlCommand::Unhold, Some(PackMlState::Unholding) },
    suspended_unsusp  = { PackMlState::Suspended, PackMlCommand::Unsuspend, Some(PackMlState::Unsuspending) },
    stopped_reset     = { PackMlState::Stopped, PackMlCommand::Reset, Some(PackMlState::Resetting) },
    completed_reset   = { PackMlState::Completed, PackMlCommand::Reset, Some(PackMlState::Resetting) },
    completed_stop    = { PackMlState::Completed, PackMlCommand::Stop, Some(PackMlState::Stopping) },
    aborted_clear     = { PackMlState::Aborted, PackMlCommand::Clear, Some(PackMlState::Clearing) },
    aborted_start     = { PackMlState::Aborted, PackMlCommand::Start, None },
    stopping_abort    = { PackMlState::Stopping, PackMlCommand::Abort, Some(PackMlState::Aborting) },
    aborting_abort    = { PackMlState::Aborting, PackMlCommand::Abort, None },
    aborting_stop     = { PackMlState::Aborting, PackMlCommand::Stop, None },
)]
fn command_table(state: PackMlState, command: PackMlCommand, expected: Option<PackMlState>) {
    assert_eq!(command_transition(state, command), expected);
}

#[yare::parameterized(
    starting     = { PackMlState::Starting, PackMlState::Execute },
    completing   = { PackMlState::Completing, PackMlState::Completed },
    holding      = { PackMlState::Holding, PackMlState::Held },
    unholding    = { PackMlState::Unholding, PackMlState::Execute },
    stopping     = { PackMlState::Stopping, PackMlState::Stopped },
    aborting     = { PackMlState::Aborting, PackMlState::Aborted },
    clearing     = { PackMlState::Clearing, PackMlState::Stopped },
    suspending   = { PackMlState::Suspending, PackMlState::Suspended },
    unsuspending = { PackMlState::Unsuspending, PackMlState::Execute },
    resetting    = { PackMlState::Resetting, PackMlState::Idle },
)]
fn acting_targets(state: PackMlState, target: PackMlState) {
    assert_eq!(acting_target(state), Some(target));
    assert!(state.is_acting());
}

#[test]
fn stable_states_are_not_acting() {
    for state in [
        PackMlState::Undefined,
        PackMlState::Idle,
        PackMlState::Execute,
        PackMlState::Completed,
        PackMlState::Held,
        PackMlState::Stopped,
        PackMlState::Aborted,
        PackMlState::Suspended,
    ] {
        assert!(!state.is_acting(), "{state} should be stable");
        assert_eq!(acting_target(state), None);
    }
}

#[test]
fn exactly_ten_acting_states() {
    let count = (0..=17)
        .filter_map(PackMlState::from_value)
        .filter(|s| s.is_acting())
        .count();
    assert_eq!(count, 10);
}

#[test]
fn every_acting_state_except_aborting_accepts_abort() {
    for state in (0..=17).filter_map(PackMlState::from_value).filter(|s| s.is_acting()) {
        let accepts = command_transition(state, PackMlCommand::Abort).is_some();
        if state == PackMlState::Aborting {
            assert!(!accepts);
        } else {
            assert!(accepts, "{state} should accept ABORT");
        }
    }
}

#[test]
fn from_name_roundtrip() {
    for state in (0..=17).filter_map(PackMlState::from_value) {
        assert_eq!(PackMlState::from_name(&state.to_string()), Some(state));
    }
    assert_eq!(PackMlState::from_name("BOGUS"), None);
}

#[test]
fn transition_result_constructors() {
    let ok = TransitionResult::ok(PackMlState::Idle, PackMlState::Starting);
    assert!(ok.success);
    assert_eq!(ok.to_state, Some(PackMlState::Starting));

    let rejected = TransitionResult::rejected(PackMlState::Idle, "nope");
    assert!(!rejected.success);
    assert_eq!(rejected.to_state, None);
    assert_eq!(rejected.from_state, PackMlState::Idle);
}

proptest! {
    #[test]
    fn state_value_roundtrip(state in arb_state()) {
        prop_assert_eq!(PackMlState::from_value(state.value()), Some(state));
    }

    #[test]
    fn command_value_roundtrip(command in arb_command()) {
        prop_assert_eq!(PackMlCommand::from_value(command.value()), Some(command));
    }

    // A successful transition never leaves the state in place.
    #[test]
    fn transitions_always_move(state in arb_state(), command in arb_command()) {
        if let Some(next) = command_transition(state, command) {
            prop_assert_ne!(state, next);
        }
    }
}
