// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-engine: the gateway's application core.
//!
//! The tag manager polls connectors and fans out value changes; the PackML
//! machine serializes per-service transitions and runs state hooks; the
//! service manager routes commands across proxy modes, monitors
//! completion, enforces interlocks, and recovers from snapshots.

pub mod packml;
pub mod service_manager;
pub mod tag_manager;

pub use packml::{PackMlMachine, StateHook};
pub use service_manager::{ServiceManager, ServiceManagerConfig, ServiceStatus};
pub use tag_manager::{Safety, SubscriptionId, TagManager, TagSnapshot};

/// How long cooperative shutdown waits for loops before force-aborting.
pub const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Poll period of PLC sync loops and completion monitors.
pub const MONITOR_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);
