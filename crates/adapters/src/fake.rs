// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory connector for engine and gateway tests.

use crate::base::{Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState};
use async_trait::async_trait;
use mtpgw_core::tag::{TagDefinition, TagValue, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// A connector backed by an in-memory register map.
///
/// Values are keyed by address. Reads return what was planted (or
/// `BadConfigError` for unknown addresses); writes update the map and are
/// recorded for assertions. `fail_reads`/`fail_writes` simulate transport
/// loss.
pub struct FakeConnector {
    base: ConnectorBase,
    values: Mutex<HashMap<String, Value>>,
    writes: Mutex<Vec<(String, Value)>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
    refuse_connect: Mutex<bool>,
}

impl FakeConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ConnectorBase::new(name, Duration::from_millis(1), 3),
            values: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            fail_reads: Mutex::new(false),
            fail_writes: Mutex::new(false),
            refuse_connect: Mutex::new(false),
        }
    }

    /// Plant a value at an address.
    pub fn set_value(&self, address: impl Into<String>, value: impl Into<Value>) {
        self.values.lock().insert(address.into(), value.into());
    }

    pub fn value_at(&self, address: &str) -> Option<Value> {
        self.values.lock().get(address).cloned()
    }

    /// All writes seen so far as `(address, value)` pairs.
    pub fn recorded_writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn set_refuse_connect(&self, refuse: bool) {
        *self.refuse_connect.lock() = refuse;
    }

    fn read_address(&self, address: &str) -> TagValue {
        if *self.fail_reads.lock() {
            self.base.record_error("simulated read failure");
            return TagValue::bad_no_comm();
        }
        match self.values.lock().get(address) {
            Some(value) => {
                self.base.record_success();
                TagValue::good(value.clone())
            }
            None => {
                self.base.record_error("unknown address");
                TagValue::bad_config()
            }
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        if *self.refuse_connect.lock() {
            self.base.set_state(ConnectorState::Error);
            self.base.record_error("connection refused");
            return Err(ConnectorError::Connect(
                self.base.name().to_string(),
                "refused".into(),
            ));
        }
        self.base.set_state(ConnectorState::Connected);
        self.base.record_success();
        Ok(())
    }

    async fn disconnect(&self) {
        self.base.set_state(ConnectorState::Stopped);
    }

    async fn read_tags(&self, addresses: &[String]) -> HashMap<String, TagValue> {
        self.base.count_reads(addresses.len() as u64);
        addresses
            .iter()
            .map(|address| (address.clone(), self.read_address(address)))
            .collect()
    }

    async fn read_tag_values(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue> {
        self.base.count_reads(tags.len() as u64);
        tags.iter()
            .map(|tag| (tag.name.clone(), self.read_address(&tag.address)))
            .collect()
    }

    async fn write_tag(&self, address: &str, value: &Value) -> bool {
        self.base.count_writes(1);
        if *self.fail_writes.lock() {
            self.base.record_error("simulated write failure");
            return false;
        }
        self.values
            .lock()
            .insert(address.to_string(), value.clone());
        self.writes.lock().push((address.to_string(), value.clone()));
        self.base.record_success();
        true
    }

    async fn write_tag_value(&self, tag: &TagDefinition, value: &Value) -> bool {
        self.write_tag(&tag.address, value).await
    }

    fn health_status(&self) -> ConnectorHealth {
        self.base.health()
    }

    async fn reconnect(&self) -> bool {
        if *self.refuse_connect.lock() {
            if self.base.next_backoff().is_none() {
                self.base.set_state(ConnectorState::Error);
                return false;
            }
            self.base.record_error("reconnect refused");
            return false;
        }
        self.base.set_state(ConnectorState::Connected);
        self.base.record_success();
        true
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
