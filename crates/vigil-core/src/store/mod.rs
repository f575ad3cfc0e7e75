//! The minimal key-value store capability surface the core needs.
//!
//! The index never talks to a backend directly; everything goes through
//! [`Store`]: ordered-set, unordered-set, string, and list operations plus
//! a single atomic multi-operation [`Batch`]. Two implementations:
//!
//! - [`RedisStore`] - the production backend over a managed async
//!   connection
//! - [`MemoryStore`] - an in-process implementation with matching
//!   semantics, used by tests and usable embedded
//!
//! Set semantics follow Redis: removing the last member of a set removes
//! the set itself, so attribute indexes vanish when drained and are
//! recreated lazily on the next write.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{DEFAULT_TIMEOUT, RedisStore};

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::Result;

/// One bound of an ordered-set score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// Unbounded below.
    NegInf,
    /// Unbounded above.
    PosInf,
    /// Inclusive bound.
    Incl(f64),
    /// Exclusive bound.
    Excl(f64),
}

impl ScoreBound {
    /// Redis range-argument form (`-inf`, `+inf`, `1.5`, `(1.5`).
    pub(crate) fn to_arg(self) -> String {
        match self {
            Self::NegInf => "-inf".to_string(),
            Self::PosInf => "+inf".to_string(),
            Self::Incl(v) => v.to_string(),
            Self::Excl(v) => format!("({v}"),
        }
    }

    fn admits_lower(self, score: f64) -> bool {
        match self {
            Self::NegInf => true,
            Self::PosInf => false,
            Self::Incl(v) => score >= v,
            Self::Excl(v) => score > v,
        }
    }

    fn admits_upper(self, score: f64) -> bool {
        match self {
            Self::NegInf => false,
            Self::PosInf => true,
            Self::Incl(v) => score <= v,
            Self::Excl(v) => score < v,
        }
    }

    /// Whether `score` falls inside `[min, max]` under these bounds.
    pub(crate) fn contains(min: ScoreBound, max: ScoreBound, score: f64) -> bool {
        min.admits_lower(score) && max.admits_upper(score)
    }
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum Op {
    /// Set a string key with a TTL.
    SetEx {
        key: String,
        value: String,
        ttl: Duration,
    },
    /// Add a member to an ordered set.
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    /// Remove a member from an ordered set.
    ZRem { key: String, member: String },
    /// Add a member to an unordered set.
    SAdd { key: String, member: String },
    /// Remove a member from an unordered set.
    SRem { key: String, member: String },
    /// Delete a key of any type.
    Del { key: String },
    /// Refresh the TTL of a key.
    Expire { key: String, ttl: Duration },
}

/// An ordered list of operations applied atomically.
///
/// Backed by `MULTI`/`EXEC` on Redis and a single lock acquisition on the
/// memory store: observers see either none or all of the batch.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ex(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        self.ops.push(Op::SetEx {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    pub fn zadd(mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> Self {
        self.ops.push(Op::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn zrem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(Op::ZRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn sadd(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(Op::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn srem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(Op::SRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn del(mut self, key: impl Into<String>) -> Self {
        self.ops.push(Op::Del { key: key.into() });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ops.push(Op::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch contains no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}

/// The store adapter: exactly the operations the core needs, nothing more.
///
/// All operations carry the backend's timeout budget; a timed-out call
/// surfaces as [`crate::Error::Store`] and is never silently retried here
/// (retry policy belongs to the caller).
#[async_trait]
pub trait Store: Send + Sync {
    /// Add (or update) a member of an ordered set.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Remove a member from an ordered set.
    async fn zrem(&self, key: &str, member: &str) -> Result<()>;

    /// Members of an ordered set whose score falls within the bounds,
    /// with scores, in ascending score order.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<(String, f64)>>;

    /// Add a member to an unordered set.
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from an unordered set.
    async fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// All members of an unordered set (empty if the key is absent).
    async fn smembers(&self, key: &str) -> Result<HashSet<String>>;

    /// Cardinality of an unordered set (0 if the key is absent).
    async fn scard(&self, key: &str) -> Result<u64>;

    /// Get a string key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Bulk-get string keys, preserving order and holes.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Atomic check-and-set: set the key with a TTL only if it does not
    /// already exist. Returns whether the key was claimed by this call.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Delete a key of any type.
    async fn del(&self, key: &str) -> Result<()>;

    /// Length of a list (0 if the key is absent).
    async fn llen(&self, key: &str) -> Result<u64>;

    /// Pop up to `count` entries from the head of a list, removing them.
    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>>;

    /// Append an entry to the tail of a list.
    async fn rpush(&self, key: &str, value: &str) -> Result<()>;

    /// Apply a batch of operations atomically.
    async fn apply(&self, batch: Batch) -> Result<()>;
}
