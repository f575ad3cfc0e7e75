//! Vigil core - domain model and query engine for web-traffic security events.
//!
//! This crate provides the pieces shared by the indexing pipeline and the
//! HTTP API:
//!
//! - [`event`] - The canonical [`Event`] entity and the normalizer that
//!   builds it from raw queue entries
//! - [`keys`] - The key scheme for every index structure in the store
//! - [`store`] - The minimal key-value store capability surface
//!   ([`Store`]) with Redis and in-memory implementations
//! - [`query`] - The [`QueryResolver`] answering bounded time-range
//!   queries with multi-field filtering
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐
//! │ vigil-index  │     │ vigil-serve  │
//! │  (pipeline)  │     │  (HTTP API)  │
//! └──────┬───────┘     └──────┬───────┘
//!        │    writes          │ reads (QueryResolver)
//!        ▼                    ▼
//! ┌─────────────────────────────────┐
//! │       Store (vigil-core)        │  time index / attribute sets /
//! └─────────────────────────────────┘  raw records / dedup markers
//! ```
//!
//! The store is the only shared state; the resolver is stateless per call
//! and tolerates the transient windows an in-flight indexing run creates.

pub mod error;
pub mod event;
pub mod keys;
pub mod query;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use event::{Event, FilterField};
pub use keys::Keys;
pub use query::{QueryResolver, SearchRequest, SearchResponse};
pub use store::{Batch, MemoryStore, RedisStore, ScoreBound, Store};
