//! encpos-api
//!
//! The public HTTP surface: `GET /api/<version>/search`.
pub mod handlers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use encpos_core::traits::SearchBackend;
use encpos_query::SearchService;

pub use handlers::search;

pub fn search_path(api_version: &str) -> String { format!("/api/{}/search", api_version) }

pub fn router<B: SearchBackend + 'static>(service: Arc<SearchService<B>>, api_version: &str) -> Router {
    Router::new()
        .route(&search_path(api_version), get(search::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
