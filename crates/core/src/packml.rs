// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PackML 17-state model per VDI 2658 / ISA-88.
//!
//! This module owns the pure tables: which command is valid in which state,
//! and where each acting state lands when it completes. The async state
//! machine that drives hooks lives in the engine crate.

use serde::{Deserialize, Serialize};

/// PackML states. Integer values match OPC UA StateCur conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackMlState {
    Undefined,
    Idle,
    Starting,
    Execute,
    Completing,
    Completed,
    Holding,
    Held,
    Unholding,
    Stopping,
    Stopped,
    Aborting,
    Aborted,
    Clearing,
    Suspending,
    Suspended,
    Unsuspending,
    Resetting,
}

crate::simple_display! {
    PackMlState {
        Undefined => "UNDEFINED",
        Idle => "IDLE",
        Starting => "STARTING",
        Execute => "EXECUTE",
        Completing => "COMPLETING",
        Completed => "COMPLETED",
        Holding => "HOLDING",
        Held => "HELD",
        Unholding => "UNHOLDING",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        Aborting => "ABORTING",
        Aborted => "ABORTED",
        Clearing => "CLEARING",
        Suspending => "SUSPENDING",
        Suspended => "SUSPENDED",
        Unsuspending => "UNSUSPENDING",
        Resetting => "RESETTING",
    }
}

impl PackMlState {
    /// Numeric value as exposed on StateCur.
    pub fn value(self) -> u32 {
        match self {
            PackMlState::Undefined => 0,
            PackMlState::Idle => 1,
            PackMlState::Starting => 2,
            PackMlState::Execute => 3,
            PackMlState::Completing => 4,
            PackMlState::Completed => 5,
            PackMlState::Holding => 6,
            PackMlState::Held => 7,
            PackMlState::Unholding => 8,
            PackMlState::Stopping => 9,
            PackMlState::Stopped => 10,
            PackMlState::Aborting => 11,
            PackMlState::Aborted => 12,
            PackMlState::Clearing => 13,
            PackMlState::Suspending => 14,
            PackMlState::Suspended => 15,
            PackMlState::Unsuspending => 16,
            PackMlState::Resetting => 17,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            0 => PackMlState::Undefined,
            1 => PackMlState::Idle,
            2 => PackMlState::Starting,
            3 => PackMlState::Execute,
            4 => PackMlState::Completing,
            5 => PackMlState::Completed,
            6 => PackMlState::Holding,
            7 => PackMlState::Held,
            8 => PackMlState::Unholding,
            9 => PackMlState::Stopping,
            10 => PackMlState::Stopped,
            11 => PackMlState::Aborting,
            12 => PackMlState::Aborted,
            13 => PackMlState::Clearing,
            14 => PackMlState::Suspending,
            15 => PackMlState::Suspended,
            16 => PackMlState::Unsuspending,
            17 => PackMlState::Resetting,
            _ => return None,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UNDEFINED" => PackMlState::Undefined,
            "IDLE" => PackMlState::Idle,
            "STARTING" => PackMlState::Starting,
            "EXECUTE" => PackMlState::Execute,
            "COMPLETING" => PackMlState::Completing,
            "COMPLETED" => PackMlState::Completed,
            "HOLDING" => PackMlState::Holding,
            "HELD" => PackMlState::Held,
            "UNHOLDING" => PackMlState::Unholding,
            "STOPPING" => PackMlState::Stopping,
            "STOPPED" => PackMlState::Stopped,
            "ABORTING" => PackMlState::Aborting,
            "ABORTED" => PackMlState::Aborted,
            "CLEARING" => PackMlState::Clearing,
            "SUSPENDING" => PackMlState::Suspending,
            "SUSPENDED" => PackMlState::Suspended,
            "UNSUSPENDING" => PackMlState::Unsuspending,
            "RESETTING" => PackMlState::Resetting,
            _ => return None,
        })
    }

    /// The ten transient -ING states.
    pub fn is_acting(self) -> bool {
        acting_target(self).is_some()
    }
}

/// PackML commands. Integer values match the CommandOp encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackMlCommand {
    Reset,
    Start,
    Stop,
    Hold,
    Unhold,
    Suspend,
    Unsuspend,
    Abort,
    Clear,
    Complete,
}

crate::simple_display! {
    PackMlCommand {
        Reset => "RESET",
        Start => "START",
        Stop => "STOP",
        Hold => "HOLD",
        Unhold => "UNHOLD",
        Suspend => "SUSPEND",
        Unsuspend => "UNSUSPEND",
        Abort => "ABORT",
        Clear => "CLEAR",
        Complete => "COMPLETE",
    }
}

impl PackMlCommand {
    pub fn value(self) -> u32 {
        match self {
            PackMlCommand::Reset => 1,
            PackMlCommand::Start => 2,
            PackMlCommand::Stop => 3,
            PackMlCommand::Hold => 4,
            PackMlCommand::Unhold => 5,
            PackMlCommand::Suspend => 6,
            PackMlCommand::Unsuspend => 7,
            PackMlCommand::Abort => 8,
            PackMlCommand::Clear => 9,
            PackMlCommand::Complete => 10,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            1 => PackMlCommand::Reset,
            2 => PackMlCommand::Start,
            3 => PackMlCommand::Stop,
            4 => PackMlCommand::Hold,
            5 => PackMlCommand::Unhold,
            6 => PackMlCommand::Suspend,
            7 => PackMlCommand::Unsuspend,
            8 => PackMlCommand::Abort,
            9 => PackMlCommand::Clear,
            10 => PackMlCommand::Complete,
            _ => return None,
        })
    }
}

/// Valid `(state, command) → state` transitions per the PackML diagram.
pub fn command_transition(state: PackMlState, command: PackMlCommand) -> Option<PackMlState> {
    use PackMlCommand as C;
    use PackMlState as S;

    Some(match (state, command) {
        // From IDLE
        (S::Idle, C::Start) => S::Starting,
        (S::Idle, C::Stop) => S::Stopping,
        (S::Idle, C::Abort) => S::Aborting,
        // From EXECUTE
        (S::Execute, C::Hold) => S::Holding,
        (S::Execute, C::Suspend) => S::Suspending,
        (S::Execute, C::Stop) => S::Stopping,
        (S::Execute, C::Abort) => S::Aborting,
        (S::Execute, C::Complete) => S::Completing,
        // From HELD
        (S::Held, C::Unhold) => S::Unholding,
        (S::Held, C::Stop) => S::Stopping,
        (S::Held, C::Abort) => S::Aborting,
        // From SUSPENDED
        (S::Suspended, C::Unsuspend) => S::Unsuspending,
        (S::Suspended, C::Stop) => S::Stopping,
        (S::Suspended, C::Abort) => S::Aborting,
        // From STOPPED
        (S::Stopped, C::Reset) => S::Resetting,
        (S::Stopped, C::Abort) => S::Aborting,
        // From COMPLETED
        (S::Completed, C::Reset) => S::Resetting,
        (S::Completed, C::Stop) => S::Stopping,
        (S::Completed, C::Abort) => S::Aborting,
        // From ABORTED
        (S::Aborted, C::Clear) => S::Clearing,
        // Acting states accept ABORT, and STOP where it makes sense.
        // ABORTING itself accepts nothing (an ABORT there is rejected).
        (S::Starting, C::Abort) => S::Aborting,
        (S::Starting, C::Stop) => S::Stopping,
        (S::Completing, C::Abort) => S::Aborting,
        (S::Completing, C::Stop) => S::Stopping,
        (S::Holding, C::Abort) => S::Aborting,
        (S::Holding, C::Stop) => S::Stopping,
        (S::Unholding, C::Abort) => S::Aborting,
        (S::Unholding, C::Stop) => S::Stopping,
        (S::Suspending, C::Abort) => S::Aborting,
        (S::Suspending, C::Stop) => S::Stopping,
        (S::Unsuspending, C::Abort) => S::Aborting,
        (S::Unsuspending, C::Stop) => S::Stopping,
        (S::Stopping, C::Abort) => S::Aborting,
        (S::Resetting, C::Abort) => S::Aborting,
        (S::Resetting, C::Stop) => S::Stopping,
        (S::Clearing, C::Abort) => S::Aborting,
        _ => return None,
    })
}

/// Acting-state completion targets: acting state → stable state.
pub fn acting_target(state: PackMlState) -> Option<PackMlState> {
    use PackMlState as S;

    Some(match state {
        S::Starting => S::Execute,
        S::Completing => S::Completed,
        S::Holding => S::Held,
        S::Unholding => S::Execute,
        S::Stopping => S::Stopped,
        S::Aborting => S::Aborted,
        S::Clearing => S::Stopped,
        S::Suspending => S::Suspended,
        S::Unsuspending => S::Execute,
        S::Resetting => S::Idle,
        _ => return None,
    })
}

/// Result of a state transition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub success: bool,
    pub from_state: PackMlState,
    pub to_state: Option<PackMlState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransitionResult {
    pub fn ok(from_state: PackMlState, to_state: PackMlState) -> Self {
        Self { success: true, from_state, to_state: Some(to_state), error: None }
    }

    pub fn rejected(from_state: PackMlState, error: impl Into<String>) -> Self {
        Self { success: false, from_state, to_state: None, error: Some(error.into()) }
    }
}

#[cfg(test)]
#[path = "packml_tests.rs"]
mod tests;
