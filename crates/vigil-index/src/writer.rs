//! Index writer: materializes one validated, not-yet-seen event.
//!
//! All mutations for an event go into a single atomic batch so readers
//! observe either the whole event or none of it:
//!
//! 1. Raw record `req:<id>`, TTL = retention horizon
//! 2. `(id, timestamp)` into the time index
//! 3. `id` into one attribute set per present categorical field
//! 4. The membership record listing exactly those attribute keys
//!
//! The membership record is written in the same batch as the structures
//! it describes, so the pruner can always trust it. Every operation is
//! idempotent; replaying a batch after a crash converges to the same
//! state.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::store::Batch;
use vigil_core::{Event, Keys, Store};

use crate::error::Result;
use crate::retry::{RetryPolicy, with_retry};

/// Writes validated events into the index structures.
#[derive(Clone)]
pub struct IndexWriter {
    store: Arc<dyn Store>,
    keys: Keys,
    retention: Duration,
    retry: RetryPolicy,
}

impl IndexWriter {
    /// Create a writer with the given retention horizon and retry policy.
    pub fn new(
        store: Arc<dyn Store>,
        keys: Keys,
        retention: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            keys,
            retention,
            retry,
        }
    }

    /// Index one event. Precondition: the event passed the dedup gate.
    pub async fn index(&self, event: &Event) -> Result<()> {
        let batch = self.build_batch(event)?;
        with_retry(&self.retry, "index batch", || {
            self.store.apply(batch.clone())
        })
        .await
    }

    fn build_batch(&self, event: &Event) -> Result<Batch> {
        let mut batch = Batch::new()
            .set_ex(self.keys.raw(&event.id), &event.raw, self.retention)
            .zadd(self.keys.time_index(), &event.id, event.timestamp);

        let mut membership: Vec<String> = Vec::new();
        for (field, value) in event.attributes() {
            let attr_key = self.keys.attr(field, value);
            batch = batch
                .sadd(&attr_key, &event.id)
                // TTL backstop; the pruner is the primary retention mechanism
                .expire(&attr_key, self.retention);
            membership.push(attr_key);
        }

        let record = serde_json::to_string(&membership).map_err(vigil_core::Error::Json)?;
        Ok(batch.set_ex(self.keys.membership(&event.id), record, self.retention))
    }
}
