//! Report search endpoint.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use vigil_core::query::DEFAULT_LIMIT;
use vigil_core::{FilterField, SearchRequest, SearchResponse};

use crate::error::ApiError;
use crate::state::AppState;
use crate::time::parse_instant;

/// `GET /api/v1/reports/search`
///
/// Query parameters:
/// - `start`, `end` (required): range bounds as epoch seconds, epoch
///   millis, or ISO 8601 (naive timestamps read as UTC)
/// - `limit` (default 50, max 1000), `offset` (default 0)
/// - any recognized filter field (`server_name`, `client_ip`,
///   `security_mode`, `reason`, `status`, `country`, `method`) as an
///   exact-match filter
///
/// Any other query key is a 400: a misspelled filter silently matching
/// everything would be worse than an error.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let request = parse_request(params)?;
    let response = state.resolver.search(&request).await?;
    Ok(Json(response))
}

fn parse_request(mut params: BTreeMap<String, String>) -> Result<SearchRequest, ApiError> {
    let start = take_instant(&mut params, "start")?;
    let end = take_instant(&mut params, "end")?;
    let limit = take_usize(&mut params, "limit")?.unwrap_or(DEFAULT_LIMIT);
    let offset = take_usize(&mut params, "offset")?.unwrap_or(0);

    // Everything left must name a recognized filter field
    let mut filters = BTreeMap::new();
    for (key, value) in params {
        let field = FilterField::from_str(&key)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        filters.insert(field, value);
    }

    Ok(SearchRequest {
        start,
        end,
        filters,
        limit,
        offset,
    })
}

fn take_instant(params: &mut BTreeMap<String, String>, name: &str) -> Result<f64, ApiError> {
    let raw = params
        .remove(name)
        .ok_or_else(|| ApiError::BadRequest(format!("missing required parameter '{name}'")))?;
    parse_instant(&raw).map_err(|msg| ApiError::BadRequest(format!("invalid '{name}': {msg}")))
}

fn take_usize(
    params: &mut BTreeMap<String, String>,
    name: &str,
) -> Result<Option<usize>, ApiError> {
    match params.remove(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("invalid '{name}': '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minimal_request() {
        let req = parse_request(params(&[("start", "100"), ("end", "200")])).unwrap();
        assert_eq!(req.start, 100.0);
        assert_eq!(req.end, 200.0);
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert_eq!(req.offset, 0);
        assert!(req.filters.is_empty());
    }

    #[test]
    fn test_filters_and_paging() {
        let req = parse_request(params(&[
            ("start", "100"),
            ("end", "200"),
            ("limit", "25"),
            ("offset", "50"),
            ("server_name", "www.example.com"),
            ("country", "DE"),
        ]))
        .unwrap();
        assert_eq!(req.limit, 25);
        assert_eq!(req.offset, 50);
        assert_eq!(
            req.filters.get(&FilterField::ServerName).map(String::as_str),
            Some("www.example.com")
        );
        assert_eq!(
            req.filters.get(&FilterField::Country).map(String::as_str),
            Some("DE")
        );
    }

    #[test]
    fn test_missing_range_is_bad_request() {
        let err = parse_request(params(&[("end", "200")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("start")));
    }

    #[test]
    fn test_unknown_key_is_bad_request() {
        let err = parse_request(params(&[
            ("start", "100"),
            ("end", "200"),
            ("url_contains", "/admin"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("url_contains")));
    }

    #[test]
    fn test_non_numeric_paging_is_bad_request() {
        let err = parse_request(params(&[
            ("start", "100"),
            ("end", "200"),
            ("limit", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_iso_bounds_accepted() {
        let req = parse_request(params(&[
            ("start", "2023-11-14T00:00:00"),
            ("end", "2023-11-14T22:13:20+00:00"),
        ]))
        .unwrap();
        assert_eq!(req.start, 1_699_920_000.0);
        assert_eq!(req.end, 1_700_000_000.0);
    }
}
