//! Key scheme for every structure the index maintains.
//!
//! All keys share a configurable prefix so several indexes can coexist in
//! one store:
//!
//! ```text
//! {prefix}:events:by_time      ZSET    id by timestamp (the time index)
//! {prefix}:req:<id>            STRING  raw JSON payload
//! {prefix}:seen:<id>           STRING  dedup marker, TTL = retention
//! {prefix}:mem:<id>            STRING  membership record (JSON key list)
//! {prefix}:<kind>:<value>      SET     attribute index per (field, value)
//! ```

use crate::event::FilterField;

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "vigil";

/// Key builder bound to one prefix.
#[derive(Debug, Clone)]
pub struct Keys {
    prefix: String,
}

impl Default for Keys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Keys {
    /// Create a key builder with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The global time index (ZSET of id scored by epoch seconds).
    pub fn time_index(&self) -> String {
        format!("{}:events:by_time", self.prefix)
    }

    /// Raw JSON payload for one event.
    pub fn raw(&self, id: &str) -> String {
        format!("{}:req:{}", self.prefix, id)
    }

    /// Dedup marker for one event.
    pub fn seen(&self, id: &str) -> String {
        format!("{}:seen:{}", self.prefix, id)
    }

    /// Membership record for one event (the attribute keys it was added to).
    pub fn membership(&self, id: &str) -> String {
        format!("{}:mem:{}", self.prefix, id)
    }

    /// Attribute index for one (field, value) pair.
    pub fn attr(&self, field: FilterField, value: &str) -> String {
        format!("{}:{}:{}", self.prefix, field.kind(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = Keys::new("idx");
        assert_eq!(keys.time_index(), "idx:events:by_time");
        assert_eq!(keys.raw("abc"), "idx:req:abc");
        assert_eq!(keys.seen("abc"), "idx:seen:abc");
        assert_eq!(keys.membership("abc"), "idx:mem:abc");
        assert_eq!(
            keys.attr(FilterField::ServerName, "www.example.com"),
            "idx:server:www.example.com"
        );
        assert_eq!(keys.attr(FilterField::SecurityMode, "block"), "idx:mode:block");
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(Keys::default().prefix(), DEFAULT_PREFIX);
    }
}
