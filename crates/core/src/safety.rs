// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safety gates for southbound writes.
//!
//! A write must pass the allowlist and the token-bucket rate limit before
//! it reaches a connector. The safe-state map names the outputs forced
//! during an emergency stop.

use crate::clock::{Clock, SystemClock};
use crate::tag::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Outcome of a write validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteValidation {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl WriteValidation {
    pub fn allowed() -> Self {
        Self { allowed: true, reason: None }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: Some(reason.into()) }
    }
}

/// Safety configuration: allowlist, rate limit, safe-state outputs.
#[derive(Debug, Clone, Default)]
pub struct SafetyConfig {
    /// Tags that may be written. Empty allowlist means every writable tag
    /// is allowed.
    pub write_allowlist: HashSet<String>,
    /// Sustained writes per second; None disables rate limiting.
    pub max_writes_per_second: Option<f64>,
    /// Burst capacity of the rate limiter.
    pub burst: u32,
    /// Outputs forced on emergency stop: tag name → value.
    pub safe_state: HashMap<String, Value>,
}

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_s: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn take(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_s).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Validates writes against the allowlist and rate limit and owns the
/// safe-state output map.
pub struct SafetyController<C: Clock = SystemClock> {
    config: SafetyConfig,
    bucket: Option<Mutex<TokenBucket>>,
    clock: C,
}

impl SafetyController<SystemClock> {
    pub fn new(config: SafetyConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SafetyController<C> {
    pub fn with_clock(config: SafetyConfig, clock: C) -> Self {
        let bucket = config.max_writes_per_second.map(|rate| {
            let capacity = f64::from(config.burst.max(1));
            Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                refill_per_s: rate,
                last_refill: clock.now(),
            })
        });
        Self { config, bucket, clock }
    }

    /// Check whether a tag is on the write allowlist.
    pub fn validate_write(&self, tag: &str) -> WriteValidation {
        if self.config.write_allowlist.is_empty() || self.config.write_allowlist.contains(tag) {
            WriteValidation::allowed()
        } else {
            WriteValidation::denied(format!("tag '{tag}' is not on the write allowlist"))
        }
    }

    /// Take one token from the rate limiter. True when the write may
    /// proceed. Always true when no rate limit is configured.
    pub fn check_rate_limit(&self) -> bool {
        match &self.bucket {
            Some(bucket) => bucket.lock().take(self.clock.now()),
            None => true,
        }
    }

    /// Safe-state outputs forced on emergency stop.
    pub fn safe_state_values(&self) -> &HashMap<String, Value> {
        &self.config.safe_state
    }
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
