//! Deduplication gate: the pipeline's only exactly-once primitive.
//!
//! Claiming an id is an atomic check-and-set against the dedup marker
//! with TTL equal to the retention horizon. Exactly one caller wins a
//! race for the same id; everyone else skips the event entirely. Every
//! write downstream of a successful claim is idempotent, so this one
//! primitive is all the synchronization overlapping runs need.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::{Keys, Result, Store};

/// Gate deciding whether an event id has already been indexed.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn Store>,
    keys: Keys,
    retention: Duration,
}

impl DedupGate {
    /// Create a gate whose markers expire with the retention horizon.
    pub fn new(store: Arc<dyn Store>, keys: Keys, retention: Duration) -> Self {
        Self {
            store,
            keys,
            retention,
        }
    }

    /// Atomically claim an id. Returns `true` exactly once per id within
    /// the retention horizon; `false` means the event is already indexed
    /// (or another run claimed it first) and must be skipped.
    pub async fn is_new(&self, id: &str) -> Result<bool> {
        self.store
            .set_nx_ex(&self.keys.seen(id), "1", self.retention)
            .await
    }

    /// Release a claim after a verified write failure, so the event is
    /// eligible again on the next run instead of being silently lost.
    pub async fn release(&self, id: &str) -> Result<()> {
        self.store.del(&self.keys.seen(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinSet;
    use vigil_core::MemoryStore;

    fn gate(store: Arc<MemoryStore>) -> DedupGate {
        DedupGate::new(store, Keys::new("t"), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_claims_exactly_once() {
        let gate = gate(Arc::new(MemoryStore::new()));
        assert!(gate.is_new("evt-1").await.unwrap());
        assert!(!gate.is_new("evt-1").await.unwrap());
        assert!(gate.is_new("evt-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_racing_claims_have_one_winner() {
        let gate = gate(Arc::new(MemoryStore::new()));

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let gate = gate.clone();
            tasks.spawn(async move { gate.is_new("contested").await.unwrap() });
        }

        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_reopens_the_claim() {
        let gate = gate(Arc::new(MemoryStore::new()));
        assert!(gate.is_new("evt-1").await.unwrap());
        gate.release("evt-1").await.unwrap();
        assert!(gate.is_new("evt-1").await.unwrap());
    }
}
