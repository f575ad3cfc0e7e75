//! One indexing run: drain the queue, absorb new events, then prune.
//!
//! Runs are safe to trigger repeatedly and concurrently with no mutual
//! exclusion: the dedup gate's atomic claim is the only synchronization
//! primitive, everything behind it is idempotent (see the crate docs).
//! One malformed entry is a counted rejection, never an abort.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use vigil_core::{Event, Keys, Store};

use crate::dedupe::DedupGate;
use crate::error::Result;
use crate::prune::RetentionPruner;
use crate::queue::Queue;
use crate::retry::RetryPolicy;
use crate::writer::IndexWriter;

const SECS_PER_DAY: u64 = 86_400;

/// Configuration for the indexing pipeline.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Source LIST key the proxy appends to.
    pub source_key: String,
    /// Retention horizon in days (> 0).
    pub retention_days: u32,
    /// Queue entries drained per chunk.
    pub chunk_size: usize,
    /// Retry policy for store writes.
    pub retry: RetryPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            source_key: "requests".to_string(),
            retention_days: 60,
            chunk_size: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl IndexerConfig {
    /// The retention horizon as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * SECS_PER_DAY)
    }
}

/// Counters from one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// New events materialized into the index.
    pub indexed: u64,
    /// Malformed entries rejected by the normalizer.
    pub rejected: u64,
    /// Expired events fully removed.
    pub pruned: u64,
    /// Entries skipped because their id was already claimed.
    pub duplicates: u64,
    /// Entries that failed store-side and were requeued for the next run.
    pub requeued: u64,
    /// Rejection breakdown: unparseable JSON.
    pub rejected_parse: u64,
    /// Rejection breakdown: missing or invalid timestamp.
    pub rejected_timestamp: u64,
}

/// The drain-then-prune pipeline.
pub struct Indexer {
    config: IndexerConfig,
    queue: Queue,
    gate: DedupGate,
    writer: IndexWriter,
    pruner: RetentionPruner,
}

impl Indexer {
    /// Wire up the pipeline over one store and key scheme.
    pub fn new(store: Arc<dyn Store>, keys: Keys, config: IndexerConfig) -> Self {
        let retention = config.retention();
        Self {
            queue: Queue::new(store.clone(), config.source_key.clone()),
            gate: DedupGate::new(store.clone(), keys.clone(), retention),
            writer: IndexWriter::new(
                store.clone(),
                keys.clone(),
                retention,
                config.retry.clone(),
            ),
            pruner: RetentionPruner::new(store, keys, config.retry.clone()),
            config,
        }
    }

    /// Execute one run against the current wall clock.
    pub async fn run(&self) -> Result<RunStats> {
        self.run_at(chrono::Utc::now().timestamp() as f64).await
    }

    /// Execute one run as-of `now` (epoch seconds). Split out so tests
    /// control the clock.
    pub async fn run_at(&self, now: f64) -> Result<RunStats> {
        let mut stats = RunStats::default();

        // Bound the drain by the depth observed at the start: entries we
        // requeue mid-run land at the tail and belong to the next run.
        let total = self.queue.len().await?;
        tracing::info!(
            source = %self.queue.key(),
            total,
            retention_days = self.config.retention_days,
            "indexing run starting"
        );

        let mut remaining = total as usize;
        while remaining > 0 {
            let chunk = self
                .queue
                .drain_chunk(self.config.chunk_size.min(remaining))
                .await?;
            if chunk.is_empty() {
                break;
            }
            remaining -= chunk.len();

            for raw in &chunk {
                self.absorb(raw, &mut stats).await;
            }
        }

        let cutoff = now - self.config.retention().as_secs_f64();
        let prune_stats = self.pruner.prune(cutoff).await?;
        stats.pruned = prune_stats.pruned;

        metrics::counter!("vigil_events_indexed_total").increment(stats.indexed);
        metrics::counter!("vigil_events_rejected_total").increment(stats.rejected);
        metrics::counter!("vigil_events_pruned_total").increment(stats.pruned);

        tracing::info!(
            indexed = stats.indexed,
            rejected = stats.rejected,
            pruned = stats.pruned,
            duplicates = stats.duplicates,
            requeued = stats.requeued,
            "indexing run finished"
        );
        Ok(stats)
    }

    /// Process one raw queue entry; all outcomes are counters.
    async fn absorb(&self, raw: &str, stats: &mut RunStats) {
        let event = match Event::from_raw(raw) {
            Ok(event) => event,
            Err(err) => {
                stats.rejected += 1;
                match err {
                    vigil_core::Error::Json(_) => stats.rejected_parse += 1,
                    vigil_core::Error::InvalidTimestamp(_) => stats.rejected_timestamp += 1,
                    _ => {}
                }
                tracing::warn!(error = %err, "rejected queue entry");
                return;
            }
        };

        match self.gate.is_new(&event.id).await {
            Ok(true) => {}
            Ok(false) => {
                stats.duplicates += 1;
                return;
            }
            Err(err) => {
                tracing::warn!(id = %event.id, error = %err, "dedup claim failed, requeueing");
                self.requeue(raw, stats).await;
                return;
            }
        }

        if let Err(err) = self.writer.index(&event).await {
            tracing::error!(id = %event.id, error = %err, "indexing failed, releasing claim");
            // Release the claim so the requeued entry is not skipped as a
            // duplicate next run. If the release itself fails the event is
            // lost until the marker expires; that is the accepted residue.
            if let Err(err) = self.gate.release(&event.id).await {
                tracing::error!(id = %event.id, error = %err, "claim release failed");
            }
            self.requeue(raw, stats).await;
            return;
        }

        stats.indexed += 1;
    }

    async fn requeue(&self, raw: &str, stats: &mut RunStats) {
        match self.queue.requeue(raw).await {
            Ok(()) => stats.requeued += 1,
            Err(err) => {
                tracing::error!(error = %err, "requeue failed, entry dropped");
            }
        }
    }
}
