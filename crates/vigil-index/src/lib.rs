//! Vigil indexing pipeline.
//!
//! This crate materializes raw security events from an append-only queue
//! into the time-ordered index and per-field inverted indexes the query
//! engine reads.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │    Queue    │  append-only LIST, drained destructively in chunks
//! └──────┬──────┘
//!        ▼
//! ┌─────────────┐
//! │  Normalizer │  raw JSON → Event (rejections counted, never fatal)
//! └──────┬──────┘
//!        ▼
//! ┌─────────────┐
//! │  DedupGate  │  atomic claim, the sole exactly-once primitive
//! └──────┬──────┘
//!        ▼
//! ┌─────────────┐
//! │ IndexWriter │  one atomic batch: raw + time index + attribute
//! └──────┬──────┘  sets + membership record
//!        ▼
//! ┌─────────────┐
//! │   Pruner    │  removes everything older than the retention horizon
//! └─────────────┘
//! ```
//!
//! Everything downstream of a successful dedup claim is idempotent, so an
//! overlapping or replayed run cannot corrupt the index; it can only
//! repeat harmless writes or skip already-claimed ids.

pub mod dedupe;
pub mod error;
pub mod prune;
pub mod queue;
pub mod retry;
pub mod run;
pub mod writer;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use dedupe::DedupGate;
pub use prune::{PruneStats, RetentionPruner};
pub use queue::Queue;
pub use retry::{RetryPolicy, with_retry};
pub use run::{Indexer, IndexerConfig, RunStats};
pub use writer::IndexWriter;
