// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm detection for AnaMon/BinMon data assemblies.
//!
//! Every monitored tag keeps four edge-detected booleans (HH/H/L/LL) or an
//! expected-state flag. A false→true edge raises (idempotently), a
//! true→false edge auto-clears. A 60 s sweep returns expired shelved
//! alarms to active.

use crate::broadcast::Broadcaster;
use chrono::Utc;
use mtpgw_config::GatewayConfig;
use mtpgw_core::tag::TagValue;
use mtpgw_engine::{SubscriptionId, TagManager};
use mtpgw_storage::AlarmRepository;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Default AnaMon limits when monitor_limits is omitted
const DEFAULT_HH: f64 = 95.0;
const DEFAULT_H: f64 = 90.0;
const DEFAULT_L: f64 = 10.0;
const DEFAULT_LL: f64 = 5.0;

#[derive(Debug, Default, Clone, Copy)]
struct AlarmFlags {
    hh: bool,
    h: bool,
    l: bool,
    ll: bool,
    state_err: bool,
}

enum MonitorKind {
    Analog { hh: f64, h: f64, l: f64, ll: f64 },
    Binary { expected: bool },
}

struct Monitor {
    name: String,
    kind: MonitorKind,
    flags: AlarmFlags,
}

struct Inner {
    monitors: Mutex<HashMap<String, Monitor>>,
    repo: Arc<dyn AlarmRepository>,
    broadcaster: Option<Broadcaster>,
    cancel: CancellationToken,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// Shared detector handle.
#[derive(Clone)]
pub struct AlarmDetector {
    inner: Arc<Inner>,
}

impl AlarmDetector {
    /// Index AnaMon/BinMon assemblies by their primary (`V`) source tag.
    pub fn from_config(
        config: &GatewayConfig,
        repo: Arc<dyn AlarmRepository>,
        broadcaster: Option<Broadcaster>,
    ) -> Self {
        let mut monitors = HashMap::new();
        for da in &config.data_assemblies {
            let Some(tag_name) = da.bindings.get("V") else {
                if matches!(da.da_type.as_str(), "AnaMon" | "BinMon") {
                    tracing::warn!(da = %da.name, "monitor has no V binding");
                }
                continue;
            };
            match da.da_type.as_str() {
                "AnaMon" => {
                    let limits = da.monitor_limits;
                    monitors.insert(
                        tag_name.clone(),
                        Monitor {
                            name: da.name.clone(),
                            kind: MonitorKind::Analog {
                                hh: limits.and_then(|l| l.hh_limit).unwrap_or(DEFAULT_HH),
                                h: limits.and_then(|l| l.h_limit).unwrap_or(DEFAULT_H),
                                l: limits.and_then(|l| l.l_limit).unwrap_or(DEFAULT_L),
                                ll: limits.and_then(|l| l.ll_limit).unwrap_or(DEFAULT_LL),
                            },
                            flags: AlarmFlags::default(),
                        },
                    );
                }
                "BinMon" => {
                    let Some(expected) = da.expected_state else {
                        continue;
                    };
                    monitors.insert(
                        tag_name.clone(),
                        Monitor {
                            name: da.name.clone(),
                            kind: MonitorKind::Binary { expected },
                            flags: AlarmFlags::default(),
                        },
                    );
                }
                _ => {}
            }
        }
        tracing::info!(count = monitors.len(), "alarm monitors loaded");

        Self {
            inner: Arc::new(Inner {
                monitors: Mutex::new(monitors),
                repo,
                broadcaster,
                cancel: CancellationToken::new(),
                sweep_task: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn monitor_count(&self) -> usize {
        self.inner.monitors.lock().len()
    }

    /// Subscribe to the tag manager and start the unshelve sweep.
    pub fn start(&self, tag_manager: &TagManager) {
        let detector = self.clone();
        let id = tag_manager.subscribe(Arc::new(move |tag_name, value| {
            detector.on_tag_change(tag_name, value);
        }));
        *self.inner.subscription.lock() = Some(id);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                match inner.repo.unshelve_expired(Utc::now()) {
                    Ok(count) if count > 0 => {
                        tracing::info!(count, "unshelved expired alarms")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "unshelve sweep failed"),
                }
            }
        });
        *self.inner.sweep_task.lock() = Some(handle);
        tracing::info!("alarm detector started");
    }

    pub async fn stop(&self, tag_manager: &TagManager) {
        if let Some(id) = self.inner.subscription.lock().take() {
            tag_manager.unsubscribe(id);
        }
        self.inner.cancel.cancel();
        let task = self.inner.sweep_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!("alarm detector stopped");
    }

    /// Evaluate one value change. Synchronous; the repository is local.
    pub fn on_tag_change(&self, tag_name: &str, value: &TagValue) {
        // (name, suffix, raised, value, priority, message)
        let mut edges: Vec<(String, &'static str, bool, f64, u8, String)> = Vec::new();
        {
            let mut monitors = self.inner.monitors.lock();
            let Some(monitor) = monitors.get_mut(tag_name) else {
                return;
            };

            match &monitor.kind {
                MonitorKind::Analog { hh, h, l, ll } => {
                    let Some(v) = value.value.as_f64() else { return };
                    let old = monitor.flags;
                    monitor.flags.hh = v >= *hh;
                    monitor.flags.h = v >= *h;
                    monitor.flags.l = v <= *l;
                    monitor.flags.ll = v <= *ll;

                    for (suffix, was, now, priority, label) in [
                        ("HH", old.hh, monitor.flags.hh, 1u8, "High-High"),
                        ("H", old.h, monitor.flags.h, 2, "High"),
                        ("L", old.l, monitor.flags.l, 2, "Low"),
                        ("LL", old.ll, monitor.flags.ll, 1, "Low-Low"),
                    ] {
                        if was != now {
                            edges.push((
                                monitor.name.clone(),
                                suffix,
                                now,
                                v,
                                priority,
                                format!("{} {label} alarm", monitor.name),
                            ));
                        }
                    }
                }
                MonitorKind::Binary { expected } => {
                    let Some(v) = value.value.as_bool() else { return };
                    let old = monitor.flags.state_err;
                    monitor.flags.state_err = v != *expected;
                    if old != monitor.flags.state_err {
                        edges.push((
                            monitor.name.clone(),
                            "STATE_ERR",
                            monitor.flags.state_err,
                            if v { 1.0 } else { 0.0 },
                            2,
                            format!("{} state error", monitor.name),
                        ));
                    }
                }
            }
        }

        for (source, suffix, raised, v, priority, message) in edges {
            let alarm_id = format!("{source}_{suffix}");
            if raised {
                self.raise(&alarm_id, &source, priority, &message, v);
            } else {
                self.auto_clear(&alarm_id, &source);
            }
        }
    }

    fn raise(&self, alarm_id: &str, source: &str, priority: u8, message: &str, value: f64) {
        match self
            .inner
            .repo
            .raise(alarm_id, source, priority, message, Some(value), Utc::now())
        {
            Ok(alarm) => {
                tracing::info!(
                    alarm_id = %alarm_id,
                    source = %source,
                    priority,
                    value,
                    db_id = alarm.id,
                    "alarm raised"
                );
                if let Some(broadcaster) = &self.inner.broadcaster {
                    broadcaster.on_alarm("raised", alarm_id, source, Some(priority), Some(message));
                }
            }
            Err(e) => tracing::error!(alarm_id = %alarm_id, error = %e, "failed to raise alarm"),
        }
    }

    fn auto_clear(&self, alarm_id: &str, source: &str) {
        match self.inner.repo.auto_clear(alarm_id, source, Utc::now()) {
            Ok(Some(_)) => {
                tracing::info!(alarm_id = %alarm_id, source = %source, "alarm auto-cleared");
                if let Some(broadcaster) = &self.inner.broadcaster {
                    broadcaster.on_alarm("cleared", alarm_id, source, None, None);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(alarm_id = %alarm_id, error = %e, "failed to clear alarm"),
        }
    }
}

#[cfg(test)]
#[path = "alarm_detector_tests.rs"]
mod tests;
