// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-core: domain model for the MTP gateway.
//!
//! Tags and quality, the PackML state/command tables, service definitions,
//! alarms, safety and interlock rules, and audit records. Everything here is
//! synchronous and transport-free; the engine and adapter crates build the
//! runtime on top of it.

pub mod macros;

pub mod alarm;
pub mod audit;
pub mod clock;
pub mod interlock;
pub mod packml;
pub mod safety;
pub mod service;
pub mod tag;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use alarm::{Alarm, AlarmError, AlarmState};
pub use audit::{mask_secret, AuditDetail, AuditEntry};
pub use clock::{Clock, FakeClock, SystemClock};
pub use interlock::{InterlockBinding, InterlockEvaluator, InterlockResult};
pub use packml::{
    acting_target, command_transition, PackMlCommand, PackMlState, TransitionResult,
};
pub use safety::{SafetyConfig, SafetyController, WriteValidation};
pub use service::{
    ActingStateCondition, ComparisonOp, CompletionCondition, CompletionSpec, ProcedureDefinition,
    ProcedureParameter, ProxyMode, ServiceDefinition, StateHooks, StateTimeoutSpec, TimeoutAction,
    WriteAction,
};
pub use tag::{
    ByteOrder, DataType, Quality, ScaleConfig, TagDefinition, TagState, TagValue, Value,
};
#[cfg(any(test, feature = "test-support"))]
pub use tag::TagDefinitionBuilder;
