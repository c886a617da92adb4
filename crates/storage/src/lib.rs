// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-storage: durable records for the gateway.
//!
//! Four record kinds: service snapshots (upsert by service name), tag
//! history (append-only JSONL with in-memory queries and bucket
//! aggregation), the command audit log (append-only JSONL), and the alarm
//! table behind the replaceable [`AlarmRepository`] trait.
//!
//! All timestamps are stored UTC and restored UTC on read.

pub mod alarms;
pub mod audit_log;
pub mod history;
pub mod snapshots;

pub use alarms::{AlarmFilter, AlarmRepository, JsonlAlarmRepository, MemoryAlarmRepository};
pub use audit_log::AuditLog;
pub use history::{
    bucket_duration, Aggregate, AggregateRow, HistoryRecord, HistoryStore, VALID_BUCKETS,
};
pub use snapshots::{ServiceSnapshot, SnapshotStore};

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid bucket size '{0}'")]
    InvalidBucket(String),

    #[error("invalid aggregate '{0}'")]
    InvalidAggregate(String),

    #[error("alarm {0} not found")]
    AlarmNotFound(i64),

    #[error(transparent)]
    Alarm(#[from] mtpgw_core::alarm::AlarmError),
}

pub(crate) fn io_err(path: &std::path::Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.display().to_string(), source }
}
