// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History recording: buffered, batched tag-history writes.
//!
//! Value changes append to an in-memory deque; a periodic task flushes to
//! the history store. Reaching the buffer cap forces an early flush. A
//! failed flush re-queues the batch at the front so nothing is dropped.

use chrono::Utc;
use mtpgw_core::tag::TagValue;
use mtpgw_engine::{SubscriptionId, TagManager};
use mtpgw_storage::{HistoryRecord, HistoryStore};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Inner {
    store: Arc<HistoryStore>,
    buffer: Mutex<VecDeque<HistoryRecord>>,
    flush_interval: Duration,
    max_buffer_size: usize,
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
    force_flush: Notify,
    cancel: CancellationToken,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// Shared history recorder handle.
#[derive(Clone)]
pub struct HistoryRecorder {
    inner: Arc<Inner>,
}

impl HistoryRecorder {
    pub fn new(
        store: Arc<HistoryStore>,
        flush_interval: Duration,
        max_buffer_size: usize,
        include_tags: Vec<String>,
        exclude_tags: Vec<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                buffer: Mutex::new(VecDeque::new()),
                flush_interval,
                max_buffer_size,
                include_tags,
                exclude_tags,
                force_flush: Notify::new(),
                cancel: CancellationToken::new(),
                flush_task: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the tag manager and start the flush loop.
    pub fn start(&self, tag_manager: &TagManager) {
        let recorder = self.clone();
        let id = tag_manager.subscribe(Arc::new(move |tag_name, value| {
            recorder.on_tag_change(tag_name, value);
        }));
        *self.inner.subscription.lock() = Some(id);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => {
                        flush(&inner);
                        return;
                    }
                    _ = inner.force_flush.notified() => flush(&inner),
                    _ = ticker.tick() => flush(&inner),
                }
            }
        });
        *self.inner.flush_task.lock() = Some(handle);
        tracing::info!(
            flush_interval_ms = self.inner.flush_interval.as_millis() as u64,
            max_buffer_size = self.inner.max_buffer_size,
            "history recorder started"
        );
    }

    /// Stop and flush the remaining buffer.
    pub async fn stop(&self, tag_manager: &TagManager) {
        if let Some(id) = self.inner.subscription.lock().take() {
            tag_manager.unsubscribe(id);
        }
        self.inner.cancel.cancel();
        let task = self.inner.flush_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!("history recorder stopped");
    }

    /// Record one value change. Synchronous enqueue, never blocks on IO.
    pub fn on_tag_change(&self, tag_name: &str, value: &TagValue) {
        if !self.accepts(tag_name) {
            return;
        }
        let record = HistoryRecord {
            time: Utc::now(),
            tag_name: tag_name.to_string(),
            value: value.value.as_f64(),
            quality: value.quality.to_string(),
        };
        let len = {
            let mut buffer = self.inner.buffer.lock();
            buffer.push_back(record);
            buffer.len()
        };
        if len >= self.inner.max_buffer_size {
            self.inner.force_flush.notify_one();
        }
    }

    fn accepts(&self, tag_name: &str) -> bool {
        if !self.inner.include_tags.is_empty()
            && !self.inner.include_tags.iter().any(|t| t == tag_name)
        {
            return false;
        }
        !self.inner.exclude_tags.iter().any(|t| t == tag_name)
    }

    /// Buffered (unflushed) record count.
    pub fn buffered(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Flush immediately (tests and shutdown).
    pub fn flush_now(&self) {
        flush(&self.inner);
    }
}

fn flush(inner: &Inner) {
    let batch: Vec<HistoryRecord> = {
        let mut buffer = inner.buffer.lock();
        buffer.drain(..).collect()
    };
    if batch.is_empty() {
        return;
    }
    if let Err(e) = inner.store.insert_batch(&batch) {
        tracing::error!(error = %e, count = batch.len(), "history flush failed, re-queueing");
        let mut buffer = inner.buffer.lock();
        for record in batch.into_iter().rev() {
            buffer.push_front(record);
        }
    }
}

#[cfg(test)]
#[path = "history_recorder_tests.rs"]
mod tests;
