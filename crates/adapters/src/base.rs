// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared connector contract: health tracking, reconnect backoff, and the
//! [`Connector`] trait every protocol adapter implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtpgw_core::tag::{TagDefinition, TagValue, Value};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Connection state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
    Stopped,
}

mtpgw_core::simple_display! {
    ConnectorState {
        Disconnected => "disconnected",
        Connecting => "connecting",
        Connected => "connected",
        Reconnecting => "reconnecting",
        Error => "error",
        Stopped => "stopped",
    }
}

/// Health status of a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorHealth {
    pub state: ConnectorState,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub consecutive_errors: u32,
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_errors: u64,
}

impl ConnectorHealth {
    fn new() -> Self {
        Self {
            state: ConnectorState::Disconnected,
            last_success: None,
            last_error: None,
            last_error_message: None,
            consecutive_errors: 0,
            total_reads: 0,
            total_writes: 0,
            total_errors: 0,
        }
    }

    /// Healthy iff connected with no outstanding errors.
    pub fn is_healthy(&self) -> bool {
        self.state == ConnectorState::Connected && self.consecutive_errors == 0
    }
}

/// Errors raised by connector internals. The public [`Connector`] surface
/// translates these into quality-bearing values or boolean results.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("failed to connect to {0}: {1}")]
    Connect(String, String),

    #[error("not connected")]
    NotConnected,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("address error: {0}")]
    Address(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Transport errors become BadNoCommunication; address and datatype
    /// problems become BadConfigError (the connection itself is fine).
    pub fn quality_value(&self) -> TagValue {
        match self {
            ConnectorError::Address(_) | ConnectorError::Unsupported(_) => TagValue::bad_config(),
            _ => TagValue::bad_no_comm(),
        }
    }
}

/// Exponential backoff with uniform jitter for reconnect pacing.
///
/// Delay is `min(base * 2^(attempts-1), 30s)` ± 10 %. Exhausting the retry
/// ceiling yields None; any success resets the counter.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    jitter: f64,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay: Duration::from_secs(30),
            max_retries,
            jitter: 0.1,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Next delay, or None when the retry ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (self.attempts - 1).min(16));
        let capped = exp.min(self.max_delay).as_secs_f64();
        let jitter = capped * self.jitter;
        let delay = capped + rand::thread_rng().gen_range(-jitter..=jitter);
        Some(Duration::from_secs_f64(delay.max(0.1)))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Common state embedded by every adapter: health, backoff, and the lock
/// serializing connect/reconnect attempts.
pub struct ConnectorBase {
    name: String,
    health: Mutex<ConnectorHealth>,
    backoff: Mutex<ExponentialBackoff>,
    /// Serializes connect/disconnect/reconnect across tasks.
    pub(crate) connect_lock: tokio::sync::Mutex<()>,
}

impl ConnectorBase {
    pub fn new(name: impl Into<String>, retry_delay: Duration, retry_count: u32) -> Self {
        Self {
            name: name.into(),
            health: Mutex::new(ConnectorHealth::new()),
            backoff: Mutex::new(ExponentialBackoff::new(retry_delay, retry_count)),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn health(&self) -> ConnectorHealth {
        self.health.lock().clone()
    }

    pub fn state(&self) -> ConnectorState {
        self.health.lock().state
    }

    pub fn set_state(&self, state: ConnectorState) {
        self.health.lock().state = state;
    }

    pub fn record_success(&self) {
        let mut health = self.health.lock();
        health.last_success = Some(Utc::now());
        health.consecutive_errors = 0;
        self.backoff.lock().reset();
    }

    pub fn record_error(&self, message: &str) {
        let mut health = self.health.lock();
        health.last_error = Some(Utc::now());
        health.last_error_message = Some(message.to_string());
        health.consecutive_errors += 1;
        health.total_errors += 1;
    }

    pub fn count_reads(&self, n: u64) {
        self.health.lock().total_reads += n;
    }

    pub fn count_writes(&self, n: u64) {
        self.health.lock().total_writes += n;
    }

    /// Take the next backoff delay, or None at the retry ceiling.
    pub fn next_backoff(&self) -> Option<Duration> {
        self.backoff.lock().next_delay()
    }

    pub fn backoff_attempts(&self) -> u32 {
        self.backoff.lock().attempts()
    }
}

/// The southbound connector contract.
///
/// `read_tag_values`/`write_tag_value` are the preferred entry points:
/// they see datatype and byte-order metadata and can decode properly.
/// The address-keyed variants exist for diagnostics (`probe`).
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Establish the connection. Idempotent.
    async fn connect(&self) -> Result<(), ConnectorError>;

    /// Graceful disconnect; the connector ends up `Stopped`.
    async fn disconnect(&self);

    /// Read raw addresses. Unreadable addresses yield bad-quality values.
    async fn read_tags(&self, addresses: &[String]) -> HashMap<String, TagValue>;

    /// Read tags with datatype metadata, keyed by tag name.
    async fn read_tag_values(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue>;

    /// Write a raw address. False on any failure.
    async fn write_tag(&self, address: &str, value: &Value) -> bool;

    /// Write a tag using its definition metadata. False on any failure.
    async fn write_tag_value(&self, tag: &TagDefinition, value: &Value) -> bool;

    fn health_status(&self) -> ConnectorHealth;

    /// Reconnect with backoff. False when the retry ceiling is reached
    /// (the connector stays in `Error`).
    async fn reconnect(&self) -> bool;
}

#[cfg(test)]
#[path = "base_tests.rs"]
mod tests;
