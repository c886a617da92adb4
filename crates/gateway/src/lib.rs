// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-gateway: the running gateway process.
//!
//! Web UI REST API under `/api/v1`, the WebSocket fan-out with
//! rate-limited broadcasting, the ISA-18.2 alarm detector, the history
//! recorder, and the lifecycle that wires connectors, managers, the
//! northbound address space, and the HTTP server together.

pub mod alarm_detector;
pub mod auth;
pub mod broadcast;
pub mod history_recorder;
pub mod lifecycle;
pub mod webui;
pub mod ws;

pub use alarm_detector::AlarmDetector;
pub use auth::{AuthState, AuthUser, Role};
pub use broadcast::Broadcaster;
pub use history_recorder::HistoryRecorder;
pub use lifecycle::{Gateway, GatewayError};
pub use ws::{Channel, WsManager};
