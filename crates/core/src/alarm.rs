// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm records and the ISA-18.2 alarm lifecycle.
//!
//! `active → acknowledged → cleared`; active or acknowledged alarms can be
//! shelved and return to active when the shelve period expires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Active,
    Acknowledged,
    Cleared,
    Shelved,
}

crate::simple_display! {
    AlarmState {
        Active => "active",
        Acknowledged => "acknowledged",
        Cleared => "cleared",
        Shelved => "shelved",
    }
}

/// Errors from invalid alarm lifecycle transitions. Surfaced as HTTP 409.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("alarm {id} is {state}, expected active")]
    NotActive { id: i64, state: AlarmState },

    #[error("alarm {id} is {state}, cannot clear")]
    NotClearable { id: i64, state: AlarmState },

    #[error("alarm {id} is {state}, cannot shelve")]
    NotShelvable { id: i64, state: AlarmState },
}

/// A persisted alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    /// Numeric id assigned by the repository.
    pub id: i64,
    /// Logical alarm id, e.g. `TempMon_HH`.
    pub alarm_id: String,
    /// Originating data assembly.
    pub source: String,
    /// ISA-18.2 priority 1..4 (1 most severe).
    pub priority: u8,
    pub state: AlarmState,
    pub message: String,
    /// Value that triggered the alarm, when numeric.
    pub value: Option<f64>,
    pub raised_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub shelved_until: Option<DateTime<Utc>>,
}

impl Alarm {
    pub fn raise(
        id: i64,
        alarm_id: impl Into<String>,
        source: impl Into<String>,
        priority: u8,
        message: impl Into<String>,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            alarm_id: alarm_id.into(),
            source: source.into(),
            priority,
            state: AlarmState::Active,
            message: message.into(),
            value,
            raised_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            cleared_at: None,
            shelved_until: None,
        }
    }

    /// Acknowledge an active alarm. Rejected in any other state.
    pub fn acknowledge(&mut self, by: &str, now: DateTime<Utc>) -> Result<(), AlarmError> {
        if self.state != AlarmState::Active {
            return Err(AlarmError::NotActive { id: self.id, state: self.state });
        }
        self.state = AlarmState::Acknowledged;
        self.acknowledged_at = Some(now);
        self.acknowledged_by = Some(by.to_string());
        Ok(())
    }

    /// Clear an active or acknowledged alarm (operator action or
    /// detector auto-clear when the condition goes away).
    pub fn clear(&mut self, now: DateTime<Utc>) -> Result<(), AlarmError> {
        match self.state {
            AlarmState::Active | AlarmState::Acknowledged => {
                self.state = AlarmState::Cleared;
                self.cleared_at = Some(now);
                Ok(())
            }
            state => Err(AlarmError::NotClearable { id: self.id, state }),
        }
    }

    /// Shelve an active or acknowledged alarm until the given time.
    pub fn shelve(&mut self, until: DateTime<Utc>) -> Result<(), AlarmError> {
        match self.state {
            AlarmState::Active | AlarmState::Acknowledged => {
                self.state = AlarmState::Shelved;
                self.shelved_until = Some(until);
                Ok(())
            }
            state => Err(AlarmError::NotShelvable { id: self.id, state }),
        }
    }

    /// Return a shelved alarm to active once its shelve period has passed.
    /// Returns true when the alarm was unshelved.
    pub fn unshelve_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != AlarmState::Shelved {
            return false;
        }
        match self.shelved_until {
            Some(until) if now >= until => {
                self.state = AlarmState::Active;
                self.shelved_until = None;
                true
            }
            _ => false,
        }
    }
}

crate::builder! {
    pub struct AlarmBuilder => Alarm {
        into {
            alarm_id: String = "TempMon_HH",
            source: String = "TempMon",
            message: String = "high-high",
        }
        set {
            id: i64 = 1,
            priority: u8 = 1,
            state: AlarmState = AlarmState::Active,
            value: Option<f64> = None,
            acknowledged_at: Option<DateTime<Utc>> = None,
            acknowledged_by: Option<String> = None,
            cleared_at: Option<DateTime<Utc>> = None,
            shelved_until: Option<DateTime<Utc>> = None,
        }
        computed {
            raised_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "alarm_tests.rs"]
mod tests;
