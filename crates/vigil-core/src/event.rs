//! The canonical event entity and its normalizer.
//!
//! Raw queue entries are opaque JSON produced by the edge proxy. The
//! normalizer extracts the fields the index cares about and keeps the
//! payload verbatim for later hydration. One bad entry is a rejection,
//! never an abort: the indexing run counts it and moves on.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Timestamps larger than this are treated as epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// The closed set of categorical fields the index recognizes.
///
/// Each variant maps to one family of attribute-index sets in the store.
/// Anything outside this set is a client error at the query boundary, not
/// a silently ignored filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    ServerName,
    ClientIp,
    SecurityMode,
    Reason,
    Status,
    Country,
    Method,
}

impl FilterField {
    /// All recognized fields, in a stable order.
    pub const ALL: [FilterField; 7] = [
        FilterField::ServerName,
        FilterField::ClientIp,
        FilterField::SecurityMode,
        FilterField::Reason,
        FilterField::Status,
        FilterField::Country,
        FilterField::Method,
    ];

    /// The field name as exposed at the query boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerName => "server_name",
            Self::ClientIp => "client_ip",
            Self::SecurityMode => "security_mode",
            Self::Reason => "reason",
            Self::Status => "status",
            Self::Country => "country",
            Self::Method => "method",
        }
    }

    /// The short key segment used in attribute-index keys.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServerName => "server",
            Self::ClientIp => "ip",
            Self::SecurityMode => "mode",
            Self::Reason => "reason",
            Self::Status => "status",
            Self::Country => "country",
            Self::Method => "method",
        }
    }

    /// The field name inside raw payloads (the proxy calls client_ip "ip").
    fn payload_key(&self) -> &'static str {
        match self {
            Self::ClientIp => "ip",
            other => other.as_str(),
        }
    }
}

impl FromStr for FilterField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::UnknownFilterField(s.to_string()))
    }
}

impl std::fmt::Display for FilterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized security-decision record.
///
/// Immutable once built; destroyed only by the retention pruner.
#[derive(Debug, Clone)]
pub struct Event {
    /// Stable unique identifier. Taken from the payload, or synthesized
    /// as the SHA-256 of the payload bytes when absent.
    pub id: String,

    /// Decision timestamp as epoch seconds; the source of all ordering.
    pub timestamp: f64,

    pub server_name: Option<String>,
    pub client_ip: Option<String>,
    pub security_mode: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub country: Option<String>,
    pub method: Option<String>,

    /// The original payload, stored verbatim for hydration.
    pub raw: String,
}

impl Event {
    /// Normalize one raw queue entry into an [`Event`].
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the payload is not valid JSON
    /// - [`Error::InvalidTimestamp`] if the `date` field is missing or
    ///   not a number
    ///
    /// Both are rejections the caller counts; neither aborts a batch.
    pub fn from_raw(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        let id = match value.get("id").and_then(|v| v.as_str()) {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => synthesize_id(raw),
        };

        let timestamp = parse_timestamp(value.get("date"))?;

        let field = |f: FilterField| categorical(value.get(f.payload_key()));

        Ok(Self {
            id,
            timestamp,
            server_name: field(FilterField::ServerName),
            client_ip: field(FilterField::ClientIp),
            security_mode: field(FilterField::SecurityMode),
            reason: field(FilterField::Reason),
            status: field(FilterField::Status),
            country: field(FilterField::Country),
            method: field(FilterField::Method),
            raw: raw.to_string(),
        })
    }

    /// The present categorical (field, value) pairs, i.e. the attribute
    /// indexes this event belongs to.
    pub fn attributes(&self) -> Vec<(FilterField, &str)> {
        let pairs = [
            (FilterField::ServerName, &self.server_name),
            (FilterField::ClientIp, &self.client_ip),
            (FilterField::SecurityMode, &self.security_mode),
            (FilterField::Reason, &self.reason),
            (FilterField::Status, &self.status),
            (FilterField::Country, &self.country),
            (FilterField::Method, &self.method),
        ];
        pairs
            .into_iter()
            .filter_map(|(f, v)| v.as_deref().map(|v| (f, v)))
            .collect()
    }
}

/// Hex SHA-256 of the payload bytes, used when the source omits an id.
fn synthesize_id(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

fn parse_timestamp(value: Option<&serde_json::Value>) -> Result<f64> {
    let ts = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let ts = ts.ok_or_else(|| Error::InvalidTimestamp("missing or non-numeric 'date'".into()))?;
    if !ts.is_finite() {
        return Err(Error::InvalidTimestamp(format!("non-finite 'date': {ts}")));
    }

    // Some producers emit epoch milliseconds
    if ts > EPOCH_MILLIS_THRESHOLD {
        Ok(ts / 1000.0)
    } else {
        Ok(ts)
    }
}

/// Extract one categorical value: non-empty strings pass through,
/// numbers are stringified (HTTP status arrives as a number), anything
/// else means "not indexed under that dimension".
fn categorical(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
