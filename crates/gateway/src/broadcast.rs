// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limited event fan-out to WebSocket clients.
//!
//! Per-tag coalescing: an update inside the minimum interval overwrites
//! the pending one; a background task drains pending updates once per
//! interval, so a burst of N changes emits exactly one message carrying
//! the last value. State changes and alarms are never coalesced.

use crate::ws::{Channel, ServerMessage, WsManager};
use mtpgw_core::tag::TagValue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Inner {
    ws: Arc<WsManager>,
    min_interval: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
    pending: Mutex<HashMap<String, ServerMessage>>,
    cancel: CancellationToken,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

/// Shared broadcaster handle.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    pub fn new(ws: Arc<WsManager>, min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ws,
                min_interval,
                last_sent: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                cancel: CancellationToken::new(),
                flush_task: Mutex::new(None),
            }),
        }
    }

    /// Start the pending-update drain loop.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.min_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let drained: Vec<(String, ServerMessage)> =
                    inner.pending.lock().drain().collect();
                if drained.is_empty() {
                    continue;
                }
                let now = Instant::now();
                let mut last_sent = inner.last_sent.lock();
                for (tag_name, message) in drained {
                    inner.ws.broadcast(Channel::Tags, &message, Some(&tag_name));
                    last_sent.insert(tag_name, now);
                }
            }
        });
        *self.inner.flush_task.lock() = Some(handle);
        tracing::info!(
            min_interval_ms = self.inner.min_interval.as_millis() as u64,
            "broadcaster started"
        );
    }

    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.flush_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!("broadcaster stopped");
    }

    /// Tag change from the tag manager. Synchronous, never blocks: either
    /// dispatches immediately or overwrites the tag's pending update.
    pub fn on_tag_change(&self, tag_name: &str, value: &TagValue) {
        let message = ServerMessage::tag_update(
            tag_name,
            &value.value,
            &value.quality.to_string(),
            value.timestamp,
        );

        let due = {
            let last_sent = self.inner.last_sent.lock();
            last_sent
                .get(tag_name)
                .map(|last| last.elapsed() >= self.inner.min_interval)
                .unwrap_or(true)
        };

        if due {
            self.inner
                .last_sent
                .lock()
                .insert(tag_name.to_string(), Instant::now());
            self.inner.ws.broadcast(Channel::Tags, &message, Some(tag_name));
        } else {
            self.inner
                .pending
                .lock()
                .insert(tag_name.to_string(), message);
        }
    }

    /// Service state change: always dispatched immediately.
    pub fn on_state_change(&self, service: &str, from_state: &str, to_state: &str) {
        let message = ServerMessage::state_change(service, from_state, to_state);
        self.inner.ws.broadcast(Channel::Services, &message, Some(service));
    }

    /// Alarm event: always dispatched immediately.
    pub fn on_alarm(
        &self,
        action: &str,
        alarm_id: &str,
        source: &str,
        priority: Option<u8>,
        message: Option<&str>,
    ) {
        let msg = ServerMessage::alarm(action, alarm_id, source, priority, message);
        self.inner.ws.broadcast(Channel::Alarms, &msg, None);
    }

    /// Number of updates currently coalesced (for tests and diagnostics).
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
