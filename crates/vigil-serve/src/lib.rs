//! Vigil Serve - HTTP search API over the event index.
//!
//! This crate exposes the [`vigil_core::QueryResolver`] over REST. It is a
//! read-only surface: the indexing pipeline (vigil-index) owns every write,
//! and the API tolerates the transient windows an in-flight run creates.
//!
//! # Architecture
//!
//! - **AppState**: Shared application state (store handle, resolver,
//!   configuration)
//! - **Routes**: Endpoint handlers (`/health`, `/api/v1/reports/search`)
//! - **Time**: Flexible timestamp parsing for query parameters

mod error;
mod routes;
mod state;
mod time;

pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
pub use self::time::parse_instant;
