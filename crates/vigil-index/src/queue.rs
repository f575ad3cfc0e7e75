//! The append-only source queue.
//!
//! The edge proxy pushes one JSON record per decision onto a LIST; the
//! indexing run drains it destructively in chunks (bounded memory). An
//! entry popped but not successfully indexed is pushed back to the tail
//! so the next run retries it.

use std::sync::Arc;

use vigil_core::{Result, Store};

/// Destructive chunked reader over the source list.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn Store>,
    key: String,
}

impl Queue {
    /// Create a queue over the given list key.
    pub fn new(store: Arc<dyn Store>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The list key this queue drains.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current queue depth.
    pub async fn len(&self) -> Result<u64> {
        self.store.llen(&self.key).await
    }

    /// Pop up to `max` entries from the head.
    pub async fn drain_chunk(&self, max: usize) -> Result<Vec<String>> {
        self.store.lpop(&self.key, max).await
    }

    /// Return an entry to the tail for a later retry.
    pub async fn requeue(&self, entry: &str) -> Result<()> {
        self.store.rpush(&self.key, entry).await
    }
}
