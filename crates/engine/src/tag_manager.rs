// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tag manager: polling, scaling, quality bookkeeping, fan-out.
//!
//! Tags are grouped by connector; each group gets one polling loop at the
//! connector's configured interval. Value-change subscribers are invoked
//! synchronously and must not block.

use chrono::Utc;
use mtpgw_adapters::{Connector, ConnectorState};
use mtpgw_core::audit::AuditEntry;
use mtpgw_core::clock::SystemClock;
use mtpgw_core::safety::SafetyController;
use mtpgw_core::tag::{Quality, TagDefinition, TagState, TagValue, Value};
use mtpgw_storage::AuditLog;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Safety controller as used by the runtime.
pub type Safety = SafetyController<SystemClock>;

/// Handle returned by [`TagManager::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type ValueCallback = Arc<dyn Fn(&str, &TagValue) + Send + Sync>;

/// Read-only snapshot of one tag for API surfaces.
#[derive(Debug, Clone)]
pub struct TagSnapshot {
    pub definition: TagDefinition,
    pub current_value: Option<TagValue>,
    pub last_good_value: Option<TagValue>,
    pub quality: Quality,
    pub read_count: u64,
    pub write_count: u64,
    pub error_count: u64,
}

struct TagGroup {
    connector_name: String,
    poll_interval: Duration,
    tags: Vec<TagDefinition>,
}

struct Inner {
    connectors: HashMap<String, Arc<dyn Connector>>,
    groups: Vec<TagGroup>,
    tags: RwLock<HashMap<String, TagState>>,
    subscribers: RwLock<Vec<(u64, ValueCallback)>>,
    next_subscription: Mutex<u64>,
    safety: Option<Arc<Safety>>,
    audit: Option<Arc<AuditLog>>,
    cancel: CancellationToken,
    poll_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared tag manager handle.
#[derive(Clone)]
pub struct TagManager {
    inner: Arc<Inner>,
}

impl TagManager {
    /// Build the manager: group tags by connector, create per-tag state.
    ///
    /// Tags referencing unknown connectors are skipped with a warning (the
    /// strict config validator refuses them up front).
    pub fn new(
        connectors: HashMap<String, Arc<dyn Connector>>,
        definitions: Vec<TagDefinition>,
        poll_intervals: HashMap<String, Duration>,
        safety: Option<Arc<Safety>>,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        let mut tags = HashMap::new();
        let mut by_connector: HashMap<String, Vec<TagDefinition>> = HashMap::new();
        for definition in definitions {
            if !connectors.contains_key(&definition.connector) {
                tracing::warn!(
                    tag = %definition.name,
                    connector = %definition.connector,
                    "tag references unknown connector"
                );
                continue;
            }
            by_connector
                .entry(definition.connector.clone())
                .or_default()
                .push(definition.clone());
            tags.insert(definition.name.clone(), TagState::new(definition));
        }

        let mut groups: Vec<TagGroup> = by_connector
            .into_iter()
            .map(|(connector_name, tags)| TagGroup {
                poll_interval: poll_intervals
                    .get(&connector_name)
                    .copied()
                    .unwrap_or(Duration::from_millis(1000)),
                connector_name,
                tags,
            })
            .collect();
        groups.sort_by(|a, b| a.connector_name.cmp(&b.connector_name));

        tracing::info!(
            total_tags = tags.len(),
            groups = groups.len(),
            "tag manager initialized"
        );

        Self {
            inner: Arc::new(Inner {
                connectors,
                groups,
                tags: RwLock::new(tags),
                subscribers: RwLock::new(Vec::new()),
                next_subscription: Mutex::new(0),
                safety,
                audit,
                cancel: CancellationToken::new(),
                poll_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start one polling loop per connector group.
    pub fn start(&self) {
        for group_idx in 0..self.inner.groups.len() {
            let manager = self.clone();
            let cancel = self.inner.cancel.clone();
            let handle = tokio::spawn(async move {
                let group = &manager.inner.groups[group_idx];
                let mut ticker = tokio::time::interval(group.poll_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                tracing::debug!(
                    connector = %group.connector_name,
                    interval_ms = group.poll_interval.as_millis() as u64,
                    tag_count = group.tags.len(),
                    "starting poll loop"
                );
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => manager.poll_group(group_idx).await,
                    }
                }
            });
            self.inner.poll_tasks.lock().push(handle);
        }
    }

    /// Cancel and join polling loops (bounded by [`crate::SHUTDOWN_GRACE`]).
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let tasks: Vec<_> = self.inner.poll_tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(crate::SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!("poll loop did not stop in time, aborting");
            }
        }
        self.inner.subscribers.write().clear();
        tracing::info!("tag manager stopped");
    }

    async fn poll_group(&self, group_idx: usize) {
        let group = &self.inner.groups[group_idx];
        let Some(connector) = self.inner.connectors.get(&group.connector_name) else {
            return;
        };

        let health = connector.health_status();
        if health.state != ConnectorState::Connected || health.consecutive_errors > 0 {
            connector.reconnect().await;
        }

        let values = connector.read_tag_values(&group.tags).await;
        for definition in &group.tags {
            if let Some(value) = values.get(&definition.name) {
                self.process_value(&definition.name, value.clone());
            }
        }
    }

    /// Scale, store, and fan out one sampled value.
    fn process_value(&self, tag_name: &str, mut value: TagValue) {
        let changed = {
            let mut tags = self.inner.tags.write();
            let Some(state) = tags.get_mut(tag_name) else {
                return;
            };

            if let (Some(_), Some(raw)) = (&state.definition.scale, value.value.as_f64()) {
                if value.value.is_numeric() {
                    value = TagValue {
                        value: Value::Float(state.definition.apply_scale(raw)),
                        timestamp: value.timestamp,
                        quality: value.quality,
                        source_timestamp: value.source_timestamp,
                    };
                }
            }

            // Keep the last usable value visible during comm loss. The
            // stored last-good value is already scaled, so it replaces the
            // sample verbatim after the scaling step.
            if value.quality == Quality::BadNoCommunication {
                if let Some(last_good) = &state.last_good_value {
                    value = TagValue::uncertain_last_usable(last_good);
                }
            }

            state.update(value.clone())
        };

        if changed {
            self.notify_subscribers(tag_name, &value);
        }
    }

    fn notify_subscribers(&self, tag_name: &str, value: &TagValue) {
        let subscribers = self.inner.subscribers.read();
        for (_, callback) in subscribers.iter() {
            callback(tag_name, value);
        }
    }

    /// Subscribe to value changes for all tags. Callbacks run on the
    /// polling task and must not block.
    pub fn subscribe(&self, callback: ValueCallback) -> SubscriptionId {
        let mut next = self.inner.next_subscription.lock();
        *next += 1;
        let id = *next;
        self.inner.subscribers.write().push((id, callback));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.subscribers.write().retain(|(sid, _)| *sid != id.0);
    }

    /// Current cached value for a tag.
    pub fn get_value(&self, name: &str) -> Option<TagValue> {
        self.inner
            .tags
            .read()
            .get(name)
            .and_then(|state| state.current_value.clone())
    }

    /// Snapshot of one tag's state.
    pub fn get_tag(&self, name: &str) -> Option<TagSnapshot> {
        self.inner.tags.read().get(name).map(snapshot)
    }

    /// Snapshots of all tags, sorted by name.
    pub fn all_tags(&self) -> Vec<TagSnapshot> {
        let mut all: Vec<TagSnapshot> = self.inner.tags.read().values().map(snapshot).collect();
        all.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
        all
    }

    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.tags.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of named tags' current raw values (for interlock checks).
    pub fn value_snapshot(&self, names: &[&str]) -> HashMap<String, Value> {
        let tags = self.inner.tags.read();
        names
            .iter()
            .filter_map(|name| {
                tags.get(*name)
                    .and_then(|s| s.current_value.as_ref())
                    .map(|v| ((*name).to_string(), v.value.clone()))
            })
            .collect()
    }

    /// Per-connector health for diagnostics.
    pub fn connector_health(&self) -> HashMap<String, mtpgw_adapters::ConnectorHealth> {
        self.inner
            .connectors
            .iter()
            .map(|(name, connector)| (name.clone(), connector.health_status()))
            .collect()
    }

    /// On-demand read bypassing the polling cache.
    pub async fn read_tag(&self, name: &str) -> Option<TagValue> {
        let definition = {
            let tags = self.inner.tags.read();
            tags.get(name)?.definition.clone()
        };
        let connector = self.inner.connectors.get(&definition.connector)?;
        let values = connector.read_tag_values(std::slice::from_ref(&definition)).await;
        let value = values.get(&definition.name)?.clone();
        self.process_value(name, value);
        self.get_value(name)
    }

    /// Gated write path: writable flag, safety allowlist, rate limit,
    /// inverse scaling, datatype coercion, dispatch, confirm re-read.
    pub async fn write_tag(&self, name: &str, value: Value) -> bool {
        let definition = {
            let tags = self.inner.tags.read();
            let Some(state) = tags.get(name) else {
                tracing::warn!(tag = %name, "tag not found for write");
                return false;
            };
            state.definition.clone()
        };

        if !definition.writable {
            tracing::warn!(tag = %name, "tag is not writable");
            self.audit_refusal(name, "tag is not writable");
            return false;
        }

        if let Some(safety) = &self.inner.safety {
            let validation = safety.validate_write(name);
            if !validation.allowed {
                let reason = validation.reason.unwrap_or_else(|| "blocked".into());
                tracing::warn!(tag = %name, %reason, "write blocked by safety");
                self.audit_refusal(name, &reason);
                return false;
            }
            if !safety.check_rate_limit() {
                tracing::warn!(tag = %name, "write rate limit exceeded");
                self.audit_refusal(name, "write rate limit exceeded");
                return false;
            }
        }

        // Inverse scaling happens before coercion so the raw value is
        // what the PLC expects
        let mut write_value = value;
        if definition.scale.is_some() && write_value.is_numeric() {
            let Some(scaled) = write_value.as_f64() else {
                return false;
            };
            match definition.reverse_scale(scaled) {
                Some(raw) => write_value = Value::Float(raw),
                None => {
                    tracing::warn!(tag = %name, "cannot reverse zero-gain scale");
                    return false;
                }
            }
        }

        let Some(coerced) = write_value.coerce(definition.datatype) else {
            tracing::warn!(
                tag = %name,
                datatype = %definition.datatype,
                "failed to coerce write value"
            );
            return false;
        };

        let Some(connector) = self.inner.connectors.get(&definition.connector) else {
            tracing::warn!(connector = %definition.connector, "connector not found");
            return false;
        };

        let success = connector.write_tag_value(&definition, &coerced).await;
        if success {
            {
                let mut tags = self.inner.tags.write();
                if let Some(state) = tags.get_mut(name) {
                    state.write_count += 1;
                }
            }
            // Confirm by reading the value back
            self.read_tag(name).await;
        }
        success
    }

    fn audit_refusal(&self, tag: &str, reason: &str) {
        if let Some(audit) = &self.inner.audit {
            let entry =
                AuditEntry::security(Utc::now(), "ALL_SERVICES", "write_refused", tag, reason);
            if let Err(e) = audit.append(&entry) {
                tracing::warn!(error = %e, "failed to audit write refusal");
            }
        }
    }

    /// Aggregate statistics for the diagnostics surface.
    pub fn statistics(&self) -> TagStatistics {
        let tags = self.inner.tags.read();
        let mut stats = TagStatistics {
            total_tags: tags.len(),
            ..TagStatistics::default()
        };
        for state in tags.values() {
            stats.total_reads += state.read_count;
            stats.total_writes += state.write_count;
            stats.total_errors += state.error_count;
            if state.quality().is_good() {
                stats.good_quality_count += 1;
            } else if state.quality().is_bad() {
                stats.bad_quality_count += 1;
            }
        }
        stats
    }
}

fn snapshot(state: &TagState) -> TagSnapshot {
    TagSnapshot {
        definition: state.definition.clone(),
        current_value: state.current_value.clone(),
        last_good_value: state.last_good_value.clone(),
        quality: state.quality(),
        read_count: state.read_count,
        write_count: state.write_count,
        error_count: state.error_count,
    }
}

/// Aggregate counters across all tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagStatistics {
    pub total_tags: usize,
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_errors: u64,
    pub good_quality_count: usize,
    pub bad_quality_count: usize,
}

#[cfg(test)]
#[path = "tag_manager_tests.rs"]
mod tests;
