// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service state snapshots for crash recovery.
//!
//! One JSON document holds all snapshots keyed by service name. Writes
//! rewrite the document atomically (temp file + rename) so a crash never
//! leaves a torn file.

use crate::{io_err, StorageError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Persisted state of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub service_name: String,
    /// PackML state name, e.g. `EXECUTE`.
    pub state: String,
    pub procedure_id: Option<u32>,
    pub saved_at: DateTime<Utc>,
}

/// Snapshot document store. Upsert by service name.
pub struct SnapshotStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, ServiceSnapshot>>,
}

impl SnapshotStore {
    /// Open (or create) the snapshot document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(io_err(&path, e)),
        };
        Ok(Self { path, cache: Mutex::new(cache) })
    }

    /// Insert or replace the snapshot for a service.
    pub fn save(&self, snapshot: ServiceSnapshot) -> Result<(), StorageError> {
        let mut cache = self.cache.lock();
        cache.insert(snapshot.service_name.clone(), snapshot);
        self.flush(&cache)
    }

    /// Remove a service's snapshot (after successful recovery).
    pub fn delete(&self, service_name: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock();
        if cache.remove(service_name).is_some() {
            self.flush(&cache)?;
        }
        Ok(())
    }

    pub fn get(&self, service_name: &str) -> Option<ServiceSnapshot> {
        self.cache.lock().get(service_name).cloned()
    }

    /// All snapshots, sorted by service name for determinism.
    pub fn all(&self) -> Vec<ServiceSnapshot> {
        let mut snapshots: Vec<_> = self.cache.lock().values().cloned().collect();
        snapshots.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        snapshots
    }

    fn flush(&self, cache: &HashMap<String, ServiceSnapshot>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(cache)?;
        std::fs::write(&tmp, text).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
