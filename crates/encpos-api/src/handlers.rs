use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use encpos_core::traits::SearchBackend;
use encpos_query::{QueryParams, SearchService};

const JSON_UTF8: &str = "application/json; charset=utf-8";
const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// Search endpoint. Pretty JSON on success, plain-text 400 on any failure.
pub async fn search<B: SearchBackend + 'static>(
    State(service): State<Arc<SearchService<B>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params: QueryParams = pairs.into_iter().collect();
    let outcome = match service.search(&params).await {
        Ok(result) => serde_json::to_string_pretty(&result).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match outcome {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, JSON_UTF8), (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], body).into_response(),
        Err(message) => {
            tracing::warn!("search failed: {}", message);
            (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, TEXT_UTF8), (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], message).into_response()
        }
    }
}
