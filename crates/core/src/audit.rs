// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit records for commands, state transitions, and security events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an audit entry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDetail {
    Command {
        command: String,
        procedure_id: Option<u32>,
        result: String,
    },
    StateTransition {
        from_state: String,
        to_state: String,
    },
    Security {
        action: String,
        target: String,
        reason: String,
    },
}

/// One audit log entry. `service` is the affected service or the literal
/// `ALL_SERVICES` for gateway-wide actions such as emergency stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    #[serde(flatten)]
    pub detail: AuditDetail,
}

impl AuditEntry {
    pub fn command(
        timestamp: DateTime<Utc>,
        service: impl Into<String>,
        command: impl Into<String>,
        procedure_id: Option<u32>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            service: service.into(),
            detail: AuditDetail::Command {
                command: command.into(),
                procedure_id,
                result: result.into(),
            },
        }
    }

    pub fn state_transition(
        timestamp: DateTime<Utc>,
        service: impl Into<String>,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            service: service.into(),
            detail: AuditDetail::StateTransition {
                from_state: from_state.into(),
                to_state: to_state.into(),
            },
        }
    }

    pub fn security(
        timestamp: DateTime<Utc>,
        service: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            service: service.into(),
            detail: AuditDetail::Security {
                action: action.into(),
                target: target.into(),
                reason: reason.into(),
            },
        }
    }
}

/// Mask a sensitive value before it reaches a log or audit record.
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
