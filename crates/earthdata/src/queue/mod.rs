//! Background fetch queue for warming the cache.
//!
//! Requests accumulate FIFO and a scheduler tick drains exactly one of
//! them through the integrator. A failed item is logged and dropped; it
//! never blocks the items behind it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};

use crate::models::{DataKind, DataRequest};
use crate::router::{cache_key, DataIntegrator};

struct QueuedRequest {
    key: String,
    kind: DataKind,
    request: DataRequest,
}

/// FIFO of pending prefetches, deduplicated by cache key.
#[derive(Default)]
pub struct RequestQueue {
    items: Mutex<VecDeque<QueuedRequest>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_items(&self) -> MutexGuard<'_, VecDeque<QueuedRequest>> {
        self.items.lock().unwrap_or_else(|poisoned| {
            warn!("Request queue lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Add a request unless the same logical fetch is already waiting.
    /// Returns whether the request was actually queued.
    pub fn enqueue(&self, kind: DataKind, request: DataRequest) -> bool {
        let key = cache_key(kind, &request);
        let mut items = self.lock_items();
        if items.iter().any(|queued| queued.key == key) {
            debug!("Fetch for {key} already queued");
            return false;
        }
        items.push_back(QueuedRequest { key, kind, request });
        true
    }

    /// Execute the oldest queued fetch, if any. Returns whether an item
    /// was taken off the queue.
    pub async fn drain_one(&self, integrator: &DataIntegrator) -> bool {
        let item = self.lock_items().pop_front();
        let Some(item) = item else {
            return false;
        };

        match integrator.prefetch(item.kind, &item.request).await {
            Ok(response) => debug!("Warmed {} from {}", item.key, response.source_id),
            Err(error) => warn!("Queued fetch for {} dropped: {error}", item.key),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }
}

/// Drain one queued fetch per tick until the returned handle is aborted.
pub fn spawn_drain_task(
    queue: Arc<RequestQueue>,
    integrator: Arc<DataIntegrator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            queue.drain_one(&integrator).await;
        }
    })
}
