// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm repository: the alarm table behind a replaceable trait.
//!
//! The Web UI and the alarm detector always go through [`AlarmRepository`];
//! deployments without a data directory use the in-memory implementation,
//! everything else uses the JSONL-backed one.

use crate::{io_err, StorageError};
use chrono::{DateTime, Utc};
use mtpgw_core::alarm::{Alarm, AlarmState};
use parking_lot::Mutex;
use std::path::PathBuf;

/// Query filter for alarm listings.
#[derive(Debug, Clone, Default)]
pub struct AlarmFilter {
    pub state: Option<AlarmState>,
    pub source: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// The alarm table.
pub trait AlarmRepository: Send + Sync {
    /// Raise a new alarm, or return the existing active one with the same
    /// `(alarm_id, source)` (raising is idempotent).
    fn raise(
        &self,
        alarm_id: &str,
        source: &str,
        priority: u8,
        message: &str,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Alarm, StorageError>;

    fn get(&self, id: i64) -> Result<Alarm, StorageError>;

    /// Alarms matching the filter, newest raised first.
    fn list(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, StorageError>;

    /// The active (or shelved) alarm for a logical id, if any.
    fn find_active(&self, alarm_id: &str, source: &str) -> Result<Option<Alarm>, StorageError>;

    fn acknowledge(&self, id: i64, by: &str, now: DateTime<Utc>) -> Result<Alarm, StorageError>;

    fn clear(&self, id: i64, now: DateTime<Utc>) -> Result<Alarm, StorageError>;

    fn shelve(&self, id: i64, until: DateTime<Utc>) -> Result<Alarm, StorageError>;

    /// Auto-clear the active alarm for `(alarm_id, source)` if present.
    /// Returns the cleared alarm.
    fn auto_clear(
        &self,
        alarm_id: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Alarm>, StorageError>;

    /// Return shelved alarms whose shelve period has passed to active.
    /// Returns the number of alarms unshelved.
    fn unshelve_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;
}

/// In-memory alarm table.
#[derive(Default)]
pub struct MemoryAlarmRepository {
    inner: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    next_id: i64,
    alarms: Vec<Alarm>,
}

impl Table {
    fn find_mut(&mut self, id: i64) -> Result<&mut Alarm, StorageError> {
        self.alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StorageError::AlarmNotFound(id))
    }
}

impl MemoryAlarmRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(
        &self,
        f: impl FnOnce(&mut Table) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        f(&mut self.inner.lock())
    }
}

impl AlarmRepository for MemoryAlarmRepository {
    fn raise(
        &self,
        alarm_id: &str,
        source: &str,
        priority: u8,
        message: &str,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Alarm, StorageError> {
        self.with_table(|table| {
            let existing = table.alarms.iter().find(|a| {
                a.alarm_id == alarm_id
                    && a.source == source
                    && matches!(a.state, AlarmState::Active | AlarmState::Shelved)
            });
            if let Some(alarm) = existing {
                return Ok(alarm.clone());
            }
            table.next_id += 1;
            let alarm = Alarm::raise(table.next_id, alarm_id, source, priority, message, value, now);
            table.alarms.push(alarm.clone());
            Ok(alarm)
        })
    }

    fn get(&self, id: i64) -> Result<Alarm, StorageError> {
        self.with_table(|table| table.find_mut(id).map(|a| a.clone()))
    }

    fn list(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, StorageError> {
        self.with_table(|table| {
            let mut out: Vec<Alarm> = table
                .alarms
                .iter()
                .filter(|a| filter.state.map_or(true, |s| a.state == s))
                .filter(|a| filter.source.as_deref().map_or(true, |s| a.source == s))
                .filter(|a| filter.from.map_or(true, |f| a.raised_at >= f))
                .filter(|a| filter.to.map_or(true, |t| a.raised_at <= t))
                .cloned()
                .collect();
            out.sort_by(|a, b| b.raised_at.cmp(&a.raised_at).then(b.id.cmp(&a.id)));
            if let Some(limit) = filter.limit {
                out.truncate(limit);
            }
            Ok(out)
        })
    }

    fn find_active(&self, alarm_id: &str, source: &str) -> Result<Option<Alarm>, StorageError> {
        self.with_table(|table| {
            Ok(table
                .alarms
                .iter()
                .find(|a| {
                    a.alarm_id == alarm_id
                        && a.source == source
                        && matches!(a.state, AlarmState::Active | AlarmState::Shelved)
                })
                .cloned())
        })
    }

    fn acknowledge(&self, id: i64, by: &str, now: DateTime<Utc>) -> Result<Alarm, StorageError> {
        self.with_table(|table| {
            let alarm = table.find_mut(id)?;
            alarm.acknowledge(by, now)?;
            Ok(alarm.clone())
        })
    }

    fn clear(&self, id: i64, now: DateTime<Utc>) -> Result<Alarm, StorageError> {
        self.with_table(|table| {
            let alarm = table.find_mut(id)?;
            alarm.clear(now)?;
            Ok(alarm.clone())
        })
    }

    fn shelve(&self, id: i64, until: DateTime<Utc>) -> Result<Alarm, StorageError> {
        self.with_table(|table| {
            let alarm = table.find_mut(id)?;
            alarm.shelve(until)?;
            Ok(alarm.clone())
        })
    }

    fn auto_clear(
        &self,
        alarm_id: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Alarm>, StorageError> {
        self.with_table(|table| {
            let found = table.alarms.iter_mut().find(|a| {
                a.alarm_id == alarm_id
                    && a.source == source
                    && matches!(a.state, AlarmState::Active | AlarmState::Acknowledged)
            });
            match found {
                Some(alarm) => {
                    alarm.clear(now)?;
                    Ok(Some(alarm.clone()))
                }
                None => Ok(None),
            }
        })
    }

    fn unshelve_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        self.with_table(|table| {
            let mut count = 0;
            for a in table.alarms.iter_mut() {
                if a.unshelve_if_expired(now) {
                    count += 1;
                }
            }
            Ok(count)
        })
    }
}

/// JSONL-backed alarm table: the in-memory table plus a rewrite-on-change
/// file so alarms survive restarts.
pub struct JsonlAlarmRepository {
    memory: MemoryAlarmRepository,
    path: PathBuf,
}

impl JsonlAlarmRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let memory = MemoryAlarmRepository::new();
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let mut table = memory.inner.lock();
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    let alarm: Alarm = serde_json::from_str(line)?;
                    table.next_id = table.next_id.max(alarm.id);
                    table.alarms.push(alarm);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
        Ok(Self { memory, path })
    }

    fn persist(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let table = self.memory.inner.lock();
        let mut buf = String::new();
        for alarm in &table.alarms {
            buf.push_str(&serde_json::to_string(alarm)?);
            buf.push('\n');
        }
        drop(table);
        let tmp = self.path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, buf).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    fn persisted<T>(&self, result: Result<T, StorageError>) -> Result<T, StorageError> {
        let value = result?;
        self.persist()?;
        Ok(value)
    }
}

impl AlarmRepository for JsonlAlarmRepository {
    fn raise(
        &self,
        alarm_id: &str,
        source: &str,
        priority: u8,
        message: &str,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Alarm, StorageError> {
        let result = self.memory.raise(alarm_id, source, priority, message, value, now);
        self.persisted(result)
    }

    fn get(&self, id: i64) -> Result<Alarm, StorageError> {
        self.memory.get(id)
    }

    fn list(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, StorageError> {
        self.memory.list(filter)
    }

    fn find_active(&self, alarm_id: &str, source: &str) -> Result<Option<Alarm>, StorageError> {
        self.memory.find_active(alarm_id, source)
    }

    fn acknowledge(&self, id: i64, by: &str, now: DateTime<Utc>) -> Result<Alarm, StorageError> {
        let result = self.memory.acknowledge(id, by, now);
        self.persisted(result)
    }

    fn clear(&self, id: i64, now: DateTime<Utc>) -> Result<Alarm, StorageError> {
        let result = self.memory.clear(id, now);
        self.persisted(result)
    }

    fn shelve(&self, id: i64, until: DateTime<Utc>) -> Result<Alarm, StorageError> {
        let result = self.memory.shelve(id, until);
        self.persisted(result)
    }

    fn auto_clear(
        &self,
        alarm_id: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Alarm>, StorageError> {
        let result = self.memory.auto_clear(alarm_id, source, now);
        self.persisted(result)
    }

    fn unshelve_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let count = self.memory.unshelve_expired(now)?;
        if count > 0 {
            self.persist()?;
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "alarms_tests.rs"]
mod tests;
