//! Retention pruner: removes every trace of expired events.
//!
//! The membership record is the source of truth for which attribute sets
//! an id was denormalized into; the pruner never re-derives field values
//! from the raw record (which may already be gone) and never scans every
//! attribute index. Each id is pruned with one atomic batch, dependents
//! first and the time-index entry last, so a reader either still sees
//! the whole event or none of it.

use serde::Serialize;
use std::sync::Arc;

use vigil_core::store::{Batch, ScoreBound};
use vigil_core::{Keys, Store};

use crate::error::Result;
use crate::retry::{RetryPolicy, with_retry};

/// Counters from one prune pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneStats {
    /// Ids fully removed.
    pub pruned: u64,
    /// Ids whose membership record was missing or unreadable (consistency
    /// drift; core structures are removed anyway and stale set members
    /// fall out when their set expires or empties).
    pub missing_membership: u64,
    /// Ids skipped because their batch kept failing; the next run will
    /// reach them again.
    pub failed: u64,
}

/// Removes index entries and raw records older than a cutoff.
#[derive(Clone)]
pub struct RetentionPruner {
    store: Arc<dyn Store>,
    keys: Keys,
    retry: RetryPolicy,
}

impl RetentionPruner {
    /// Create a pruner over the given store and key scheme.
    pub fn new(store: Arc<dyn Store>, keys: Keys, retry: RetryPolicy) -> Self {
        Self { store, keys, retry }
    }

    /// Remove every event with timestamp strictly below `cutoff`.
    ///
    /// Per-id failures are counted and skipped, not fatal: the id stays
    /// in the time index and the next prune pass reaches it again.
    pub async fn prune(&self, cutoff: f64) -> Result<PruneStats> {
        let expired = self
            .store
            .zrange_by_score(
                &self.keys.time_index(),
                ScoreBound::NegInf,
                ScoreBound::Excl(cutoff),
            )
            .await
            .map_err(crate::error::Error::Core)?;

        let mut stats = PruneStats::default();
        if expired.is_empty() {
            return Ok(stats);
        }
        tracing::debug!(cutoff, expired = expired.len(), "pruning expired events");

        for (id, _) in expired {
            match self.prune_one(&id).await {
                Ok(had_membership) => {
                    stats.pruned += 1;
                    if !had_membership {
                        stats.missing_membership += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "failed to prune event");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Prune one id. Returns whether its membership record was found.
    async fn prune_one(&self, id: &str) -> Result<bool> {
        let membership_key = self.keys.membership(id);
        let record = with_retry(&self.retry, "read membership", || {
            self.store.get(&membership_key)
        })
        .await?;

        let attr_keys: Vec<String> = match record.as_deref() {
            Some(json) => match serde_json::from_str(json) {
                Ok(keys) => keys,
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "unreadable membership record");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let had_membership = record.is_some();

        // Dependents first, the time-index anchor last
        let mut batch = Batch::new();
        for attr_key in &attr_keys {
            batch = batch.srem(attr_key, id);
        }
        let batch = batch
            .del(self.keys.raw(id))
            .del(&membership_key)
            .del(self.keys.seen(id))
            .zrem(self.keys.time_index(), id);

        with_retry(&self.retry, "prune batch", || self.store.apply(batch.clone())).await?;
        Ok(had_membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vigil_core::{Event, FilterField, MemoryStore};

    use crate::writer::IndexWriter;

    fn parts(store: Arc<MemoryStore>) -> (IndexWriter, RetentionPruner, Keys) {
        let keys = Keys::new("t");
        let writer = IndexWriter::new(
            store.clone(),
            keys.clone(),
            Duration::from_secs(3600),
            RetryPolicy::immediate(3),
        );
        let pruner = RetentionPruner::new(store, keys.clone(), RetryPolicy::immediate(3));
        (writer, pruner, keys)
    }

    async fn index_raw(writer: &IndexWriter, raw: &str) -> Event {
        let event = Event::from_raw(raw).unwrap();
        writer.index(&event).await.unwrap();
        event
    }

    #[tokio::test]
    async fn test_prune_removes_every_trace() {
        let store = Arc::new(MemoryStore::new());
        let (writer, pruner, keys) = parts(store.clone());

        index_raw(
            &writer,
            r#"{"id":"old","date":100.0,"server_name":"a","security_mode":"block"}"#,
        )
        .await;
        index_raw(
            &writer,
            r#"{"id":"new","date":900.0,"server_name":"a","security_mode":"allow"}"#,
        )
        .await;

        let stats = pruner.prune(500.0).await.unwrap();
        assert_eq!(stats.pruned, 1);
        assert_eq!(stats.missing_membership, 0);

        // Absent from every structure it belonged to
        assert!(store.get(&keys.raw("old")).await.unwrap().is_none());
        assert!(store.get(&keys.membership("old")).await.unwrap().is_none());
        assert!(store.get(&keys.seen("old")).await.unwrap().is_none());
        let range = store
            .zrange_by_score(&keys.time_index(), ScoreBound::NegInf, ScoreBound::PosInf)
            .await
            .unwrap();
        assert_eq!(range, vec![("new".to_string(), 900.0)]);
        assert!(
            !store
                .smembers(&keys.attr(FilterField::ServerName, "a"))
                .await
                .unwrap()
                .contains("old")
        );
        // The set old was alone in is gone entirely
        assert_eq!(
            store
                .scard(&keys.attr(FilterField::SecurityMode, "block"))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_cutoff_is_exclusive() {
        let store = Arc::new(MemoryStore::new());
        let (writer, pruner, keys) = parts(store.clone());
        index_raw(&writer, r#"{"id":"edge","date":500.0}"#).await;

        let stats = pruner.prune(500.0).await.unwrap();
        assert_eq!(stats.pruned, 0);
        assert!(store.get(&keys.raw("edge")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_survives_missing_membership_record() {
        let store = Arc::new(MemoryStore::new());
        let (writer, pruner, keys) = parts(store.clone());
        index_raw(&writer, r#"{"id":"drifted","date":100.0,"country":"MX"}"#).await;

        // Simulate drift from an interrupted earlier prune
        store.del(&keys.membership("drifted")).await.unwrap();

        let stats = pruner.prune(500.0).await.unwrap();
        assert_eq!(stats.pruned, 1);
        assert_eq!(stats.missing_membership, 1);
        assert!(store.get(&keys.raw("drifted")).await.unwrap().is_none());
        let range = store
            .zrange_by_score(&keys.time_index(), ScoreBound::NegInf, ScoreBound::PosInf)
            .await
            .unwrap();
        assert!(range.is_empty());
    }

    #[tokio::test]
    async fn test_prune_noop_on_empty_index() {
        let store = Arc::new(MemoryStore::new());
        let (_, pruner, _) = parts(store);
        let stats = pruner.prune(1e12).await.unwrap();
        assert_eq!(stats.pruned, 0);
    }
}
