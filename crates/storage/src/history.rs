// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag history: append-only JSONL with in-memory queries.
//!
//! Records are appended in batches by the history recorder and kept in an
//! in-memory index for time-range queries and bucket aggregation. Rotated
//! files are zstd-compressed archives.

use crate::{io_err, StorageError};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One history sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub time: DateTime<Utc>,
    pub tag_name: String,
    /// Numeric projection of the value; None for non-numeric samples.
    pub value: Option<f64>,
    /// Quality name, e.g. `Good`.
    pub quality: String,
}

/// The closed set of bucket sizes supported by aggregation queries.
pub const VALID_BUCKETS: &[&str] =
    &["1s", "5s", "10s", "30s", "1m", "5m", "15m", "30m", "1h", "4h", "1d"];

/// Bucket size string → duration. None for anything outside the set.
pub fn bucket_duration(bucket: &str) -> Option<Duration> {
    Some(match bucket {
        "1s" => Duration::seconds(1),
        "5s" => Duration::seconds(5),
        "10s" => Duration::seconds(10),
        "30s" => Duration::seconds(30),
        "1m" => Duration::minutes(1),
        "5m" => Duration::minutes(5),
        "15m" => Duration::minutes(15),
        "30m" => Duration::minutes(30),
        "1h" => Duration::hours(1),
        "4h" => Duration::hours(4),
        "1d" => Duration::days(1),
        _ => return None,
    })
}

/// Server-side aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Avg,
    Min,
    Max,
    Sum,
    Count,
    First,
    Last,
}

impl Aggregate {
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "AVG" => Aggregate::Avg,
            "MIN" => Aggregate::Min,
            "MAX" => Aggregate::Max,
            "SUM" => Aggregate::Sum,
            "COUNT" => Aggregate::Count,
            "FIRST" => Aggregate::First,
            "LAST" => Aggregate::Last,
            _ => return Err(StorageError::InvalidAggregate(s.to_string())),
        })
    }
}

/// One aggregated bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub bucket_start: DateTime<Utc>,
    pub value: Option<f64>,
    pub count: u64,
}

/// History store: JSONL on disk, vector index in memory.
pub struct HistoryStore {
    path: PathBuf,
    records: RwLock<Vec<HistoryRecord>>,
}

impl HistoryStore {
    /// Open the store, loading any existing records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut records = Vec::new();
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    match serde_json::from_str::<HistoryRecord>(line) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping corrupt history line")
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
        Ok(Self { path, records: RwLock::new(records) })
    }

    /// Append a batch of records.
    pub fn insert_batch(&self, batch: &[HistoryRecord]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        let mut buf = String::new();
        for record in batch {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .map_err(|e| io_err(&self.path, e))?;

        self.records.write().extend_from_slice(batch);
        Ok(())
    }

    /// Samples for one tag within an optional time range, oldest first.
    pub fn query(
        &self,
        tag_name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<HistoryRecord> {
        let records = self.records.read();
        let mut out: Vec<HistoryRecord> = records
            .iter()
            .filter(|r| r.tag_name == tag_name)
            .filter(|r| from.map_or(true, |f| r.time >= f))
            .filter(|r| to.map_or(true, |t| r.time <= t))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.time);
        if let Some(limit) = limit {
            if out.len() > limit {
                // Keep the newest `limit` samples
                out.drain(..out.len() - limit);
            }
        }
        out
    }

    /// Samples for several tags at once, keyed by tag.
    pub fn query_multi(
        &self,
        tag_names: &[String],
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> std::collections::HashMap<String, Vec<HistoryRecord>> {
        tag_names
            .iter()
            .map(|tag| (tag.clone(), self.query(tag, from, to, limit)))
            .collect()
    }

    /// Newest sample for a tag.
    pub fn latest(&self, tag_name: &str) -> Option<HistoryRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.tag_name == tag_name)
            .max_by_key(|r| r.time)
            .cloned()
    }

    /// All tag names with at least one sample, sorted.
    pub fn available_tags(&self) -> Vec<String> {
        let records = self.records.read();
        let mut tags: Vec<String> = records.iter().map(|r| r.tag_name.clone()).collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Time-bucket aggregation over one tag.
    ///
    /// Buckets are aligned to the Unix epoch. Only buckets containing at
    /// least one sample are returned. Non-numeric samples count for COUNT
    /// but contribute no value to the numeric aggregates.
    pub fn aggregate(
        &self,
        tag_name: &str,
        bucket: &str,
        aggregate: Aggregate,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<AggregateRow>, StorageError> {
        let size =
            bucket_duration(bucket).ok_or_else(|| StorageError::InvalidBucket(bucket.to_string()))?;
        let size_ms = size.num_milliseconds();

        let samples = self.query(tag_name, from, to, None);
        let mut buckets: Vec<(i64, Vec<&HistoryRecord>)> = Vec::new();
        for record in &samples {
            let key = record.time.timestamp_millis().div_euclid(size_ms);
            match buckets.last_mut() {
                Some((last_key, group)) if *last_key == key => group.push(record),
                _ => buckets.push((key, vec![record])),
            }
        }

        let mut rows = Vec::with_capacity(buckets.len());
        for (key, group) in buckets {
            let numeric: Vec<f64> = group.iter().filter_map(|r| r.value).collect();
            let value = match aggregate {
                Aggregate::Count => Some(group.len() as f64),
                Aggregate::Avg if !numeric.is_empty() => {
                    Some(numeric.iter().sum::<f64>() / numeric.len() as f64)
                }
                Aggregate::Min => numeric.iter().copied().reduce(f64::min),
                Aggregate::Max => numeric.iter().copied().reduce(f64::max),
                Aggregate::Sum if !numeric.is_empty() => Some(numeric.iter().sum()),
                Aggregate::First => group.iter().find_map(|r| r.value),
                Aggregate::Last => group.iter().rev().find_map(|r| r.value),
                _ => None,
            };
            rows.push(AggregateRow {
                bucket_start: DateTime::<Utc>::from_timestamp_millis(key * size_ms)
                    .unwrap_or_default(),
                value,
                count: group.len() as u64,
            });
        }
        Ok(rows)
    }

    /// Number of records currently indexed.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Compress the current JSONL into `archive_path` and truncate the
    /// live file. The in-memory index is kept.
    pub fn rotate_archive(&self, archive_path: &Path) -> Result<(), StorageError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        let compressed = zstd::encode_all(data.as_slice(), 0)
            .map_err(|e| io_err(archive_path, e))?;
        std::fs::write(archive_path, compressed).map_err(|e| io_err(archive_path, e))?;
        std::fs::write(&self.path, b"").map_err(|e| io_err(&self.path, e))?;
        tracing::info!(archive = %archive_path.display(), "rotated history archive");
        Ok(())
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
