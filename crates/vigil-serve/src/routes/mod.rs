//! API route definitions.

mod health;
mod search;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// - `GET /health` - Health check
/// - `GET /api/v1/reports/search` - Time-range search over indexed events
pub fn router(state: AppState) -> Router {
    let api_v1 = Router::new().route("/reports/search", get(search::search));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_v1)
        .with_state(state)
}
