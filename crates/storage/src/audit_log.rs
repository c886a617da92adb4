// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only command audit log (JSONL).

use crate::{io_err, StorageError};
use mtpgw_core::audit::AuditEntry;
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;

/// Append-only audit log. Entries are flushed per append; readers load
/// the whole file (the log is small and append-rate is human-scale).
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    /// Append one entry.
    pub fn append(&self, entry: &AuditEntry) -> Result<(), StorageError> {
        let line = serde_json::to_string(entry)?;
        let _guard = self.write_lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// All entries in append order.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "audit_log_tests.rs"]
mod tests;
