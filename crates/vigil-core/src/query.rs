//! Query resolution: bounded time-range search with multi-field filters.
//!
//! The store offers no native multi-field query capability, so resolution
//! is composed from the structures the indexer maintains:
//!
//! 1. Range-scan the time index for `[start, end]`
//! 2. Intersect with one attribute set per filter, smallest set first
//! 3. Page the ordered, filtered id list (`offset` then `limit`)
//! 4. Hydrate the page from raw records, tolerating stale pointers
//!
//! Ordering is descending by timestamp with ties broken ascending by id,
//! sorted here rather than trusting backend tie order, so every backend
//! yields the same sequence.
//!
//! The resolver is stateless per call and runs concurrently with indexing
//! runs; an id whose raw record vanished mid-prune is dropped from the
//! result, never an error.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::event::FilterField;
use crate::keys::Keys;
use crate::store::{ScoreBound, Store};

/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 1000;

/// Default `limit` when the caller does not specify one.
pub const DEFAULT_LIMIT: usize = 50;

/// Hydration over-fetch bound: at most `limit * SCAN_MULTIPLIER` ids are
/// examined past `offset` when raw records are missing.
pub const SCAN_MULTIPLIER: usize = 4;

/// Raw records fetched per MGET round-trip.
const HYDRATE_CHUNK: usize = 200;

/// Entries in each top-N aggregate.
const TOP_N: usize = 10;

/// One search call's parameters, validated by [`QueryResolver::search`].
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Range start, epoch seconds (inclusive).
    pub start: f64,
    /// Range end, epoch seconds (inclusive).
    pub end: f64,
    /// Exact-match filters over the recognized field set.
    pub filters: BTreeMap<FilterField, String>,
    /// Maximum hydrated events returned.
    pub limit: usize,
    /// Ids skipped from the front of the ordered, filtered list.
    pub offset: usize,
}

impl SearchRequest {
    /// A request over `[start, end]` with no filters and default paging.
    pub fn range(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            filters: BTreeMap::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Add an exact-match filter.
    pub fn filter(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.filters.insert(field, value.into());
        self
    }

    /// Set the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the page offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Search results plus paging metadata and page aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Ids matched before hydration loss. An approximate upper bound on
    /// retrievable events whenever `dropped > 0`.
    pub count: u64,

    /// Matched ids in the scanned window whose raw record was gone
    /// (stale pointer from an interrupted prune, or an in-flight prune).
    pub dropped: u64,

    /// Top client IPs over the returned page.
    pub top_ips: Vec<(String, u64)>,
    /// Top request URLs over the returned page.
    pub top_urls: Vec<(String, u64)>,
    /// Top decision reasons over the returned page.
    pub top_reasons: Vec<(String, u64)>,

    /// Hydrated events, ordered newest first.
    pub events: Vec<serde_json::Value>,
}

/// Stateless search engine over the shared index structures.
#[derive(Clone)]
pub struct QueryResolver {
    store: Arc<dyn Store>,
    keys: Keys,
}

impl QueryResolver {
    /// Create a resolver over the given store and key scheme.
    pub fn new(store: Arc<dyn Store>, keys: Keys) -> Self {
        Self { store, keys }
    }

    /// Execute one search.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTimeRange`] if `start > end`
    /// - [`Error::InvalidLimit`] if `limit` is 0 or above [`MAX_LIMIT`]
    /// - [`Error::Store`] on backend failure
    ///
    /// All parameter validation happens before any store access.
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        if req.start > req.end {
            return Err(Error::InvalidTimeRange {
                start: req.start,
                end: req.end,
            });
        }
        if req.limit == 0 || req.limit > MAX_LIMIT {
            return Err(Error::InvalidLimit(req.limit));
        }

        let mut candidates = self
            .store
            .zrange_by_score(
                &self.keys.time_index(),
                ScoreBound::Incl(req.start),
                ScoreBound::Incl(req.end),
            )
            .await?;

        // Descending timestamp, ties ascending by id: stable regardless of
        // how the backend orders equal scores.
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let candidates = self.intersect_filters(candidates, &req.filters).await?;
        let count = candidates.len() as u64;

        let (events, dropped) = self.hydrate(&candidates, req.limit, req.offset).await?;

        let top_ips = top_counts(&events, "ip");
        let top_urls = top_counts(&events, "url");
        let top_reasons = top_counts(&events, "reason");

        if dropped > 0 {
            tracing::debug!(
                dropped,
                count,
                "search dropped ids with missing raw records"
            );
        }

        Ok(SearchResponse {
            count,
            dropped,
            top_ips,
            top_urls,
            top_reasons,
            events,
        })
    }

    /// Reduce the ordered candidate list by intersecting each filter's
    /// attribute set. Smallest sets first (by SCARD) so the candidate set
    /// shrinks as early as possible; any order yields the same result.
    async fn intersect_filters(
        &self,
        candidates: Vec<(String, f64)>,
        filters: &BTreeMap<FilterField, String>,
    ) -> Result<Vec<(String, f64)>> {
        if filters.is_empty() || candidates.is_empty() {
            return Ok(candidates);
        }

        let mut sized = Vec::with_capacity(filters.len());
        for (field, value) in filters {
            let key = self.keys.attr(*field, value);
            let card = self.store.scard(&key).await?;
            if card == 0 {
                // A filter with no members empties the intersection
                return Ok(Vec::new());
            }
            sized.push((card, key));
        }
        sized.sort_by_key(|(card, _)| *card);

        let mut candidates = candidates;
        for (_, key) in sized {
            let members = self.store.smembers(&key).await?;
            candidates.retain(|(id, _)| members.contains(id));
            if candidates.is_empty() {
                break;
            }
        }
        Ok(candidates)
    }

    /// Hydrate up to `limit` events starting at `offset` into the ordered
    /// id list. Ids whose raw record is missing are skipped and do not
    /// count toward the limit; the scan extends past the nominal page to
    /// compensate, bounded by [`SCAN_MULTIPLIER`].
    async fn hydrate(
        &self,
        candidates: &[(String, f64)],
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<serde_json::Value>, u64)> {
        let mut events = Vec::with_capacity(limit);
        let mut dropped = 0u64;

        let scan_budget = limit.saturating_mul(SCAN_MULTIPLIER);
        let mut cursor = offset.min(candidates.len());
        let mut scanned = 0usize;

        while events.len() < limit && cursor < candidates.len() && scanned < scan_budget {
            let want = (limit - events.len())
                .min(HYDRATE_CHUNK)
                .min(scan_budget - scanned);
            let chunk = &candidates[cursor..(cursor + want).min(candidates.len())];
            let raw_keys: Vec<String> = chunk.iter().map(|(id, _)| self.keys.raw(id)).collect();
            let raws = self.store.mget(&raw_keys).await?;

            for ((id, ts), raw) in chunk.iter().zip(raws) {
                scanned += 1;
                let Some(raw) = raw else {
                    dropped += 1;
                    continue;
                };
                if events.len() == limit {
                    break;
                }
                match hydrate_one(id, *ts, &raw) {
                    Some(value) => events.push(value),
                    None => {
                        tracing::warn!(id = %id, "raw record is not valid JSON, skipping");
                        dropped += 1;
                    }
                }
            }
            cursor += chunk.len();
        }

        Ok((events, dropped))
    }
}

/// Parse one raw record, attaching a human-readable `_time` field.
fn hydrate_one(id: &str, ts: f64, raw: &str) -> Option<serde_json::Value> {
    let mut value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if let Some(obj) = value.as_object_mut() {
        if !obj.contains_key("id") {
            obj.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        }
        if let Some(time) = chrono::DateTime::from_timestamp(
            ts.trunc() as i64,
            (ts.fract().abs() * 1e9) as u32,
        ) {
            obj.insert(
                "_time".to_string(),
                serde_json::Value::String(time.to_rfc3339()),
            );
        }
    }
    Some(value)
}

/// Top-N string values of `field` across the hydrated page, ordered by
/// count descending then value ascending.
fn top_counts(events: &[serde_json::Value], field: &str) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events {
        if let Some(value) = event.get(field).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                *counts.entry(value).or_default() += 1;
            }
        }
    }
    let mut sorted: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(TOP_N);
    sorted
}
