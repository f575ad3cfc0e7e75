//! In-process store implementation.
//!
//! Mirrors the semantics the core relies on from Redis: NX respects live
//! TTLs, deleting the last member of a set deletes the set, and a batch
//! is applied under one lock so readers never observe it half-done.
//! Used by every test in the workspace; also usable as an embedded
//! backend for single-process deployments.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use super::{Batch, Op, ScoreBound, Store};
use crate::error::Result;

#[derive(Debug, Clone)]
struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    zsets: HashMap<String, HashMap<String, f64>>,
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
}

impl Inner {
    fn get_live(&mut self, key: &str) -> Option<String> {
        match self.strings.get(key) {
            Some(entry) if entry.live() => Some(entry.value.clone()),
            Some(_) => {
                self.strings.remove(key);
                None
            }
            None => None,
        }
    }

    fn srem(&mut self, key: &str, member: &str) {
        if let Some(set) = self.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                self.sets.remove(key);
            }
        }
    }

    fn zrem(&mut self, key: &str, member: &str) {
        if let Some(zset) = self.zsets.get_mut(key) {
            zset.remove(member);
            if zset.is_empty() {
                self.zsets.remove(key);
            }
        }
    }

    fn del(&mut self, key: &str) {
        self.strings.remove(key);
        self.zsets.remove(key);
        self.sets.remove(key);
        self.lists.remove(key);
    }

    fn apply_op(&mut self, op: Op) {
        match op {
            Op::SetEx { key, value, ttl } => {
                self.strings.insert(
                    key,
                    StringEntry {
                        value,
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
            }
            Op::ZAdd { key, member, score } => {
                self.zsets.entry(key).or_default().insert(member, score);
            }
            Op::ZRem { key, member } => self.zrem(&key, &member),
            Op::SAdd { key, member } => {
                self.sets.entry(key).or_default().insert(member);
            }
            Op::SRem { key, member } => self.srem(&key, &member),
            Op::Del { key } => self.del(&key),
            Op::Expire { key, ttl } => {
                // Per-set TTLs are a backstop in production; the memory
                // store only tracks string expiry.
                if let Some(entry) = self.strings.get_mut(&key) {
                    entry.expires_at = Some(Instant::now() + ttl);
                }
            }
        }
    }
}

/// In-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.inner
            .lock()
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        self.inner.lock().zrem(key, member);
        Ok(())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<(String, f64)>> {
        let inner = self.inner.lock();
        let mut members: Vec<(String, f64)> = inner
            .zsets
            .get(key)
            .map(|zset| {
                zset.iter()
                    .filter(|&(_, &score)| ScoreBound::contains(min, max, score))
                    .map(|(member, &score)| (member.clone(), score))
                    .collect()
            })
            .unwrap_or_default();

        // Ascending score, ties lexicographic by member, as Redis orders them
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(members)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.inner
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.inner.lock().srem(key, member);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        Ok(self.inner.lock().sets.get(key).cloned().unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        Ok(self.inner.lock().sets.get(key).map_or(0, |s| s.len() as u64))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().get_live(key))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut inner = self.inner.lock();
        Ok(keys.iter().map(|key| inner.get_live(key)).collect())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.get_live(key).is_some() {
            return Ok(false);
        }
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.inner.lock().del(key);
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        Ok(self.inner.lock().lists.get(key).map_or(0, |l| l.len() as u64))
    }

    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let take = count.min(list.len());
        let popped = list.drain(..take).collect();
        if list.is_empty() {
            inner.lists.remove(key);
        }
        Ok(popped)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn apply(&self, batch: Batch) -> Result<()> {
        let mut inner = self.inner.lock();
        for op in batch.into_ops() {
            inner.apply_op(op);
        }
        Ok(())
    }
}
