use async_trait::async_trait;
use axum::{
    body::to_bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use std::sync::Arc;

use encpos_api::{search, search_path};
use encpos_core::config::Settings;
use encpos_core::error::{Error, Result};
use encpos_core::traits::SearchBackend;
use encpos_query::SearchService;

/// Answers every query with the same canned body, or fails.
struct FixedBackend(Option<Value>);

#[async_trait]
impl SearchBackend for FixedBackend {
    async fn search(&self, _index: &str, _body: &Value) -> Result<Value> {
        self.0.clone().ok_or_else(|| Error::backend("connection refused"))
    }
}

fn service(reply: Option<Value>) -> Arc<SearchService<FixedBackend>> {
    let mut settings = Settings::default();
    settings.dts.url = "https://dts.test".to_string();
    Arc::new(SearchService::new(FixedBackend(reply), &settings))
}

fn query(pairs: &[(&str, &str)]) -> Query<Vec<(String, String)>> {
    Query(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
}

async fn body_text(response: Response) -> anyhow::Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn success_is_pretty_json_with_cors() -> anyhow::Result<()> {
    let reply = json!({"hits": {"total": {"value": 1}, "hits": [{"_id": "ENCPOS_1901_01", "_score": 1.5, "_source": {"content": "x"}}]}});
    let response = search(State(service(Some(reply))), query(&[("query", "chartes")])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let text = body_text(response).await?;
    assert!(text.contains('\n'), "body should be pretty-printed");
    let body: Value = serde_json::from_str(&text)?;
    assert_eq!(body["total-count"], 1);
    assert_eq!(body["data"][0]["id"], "ENCPOS_1901_01");
    assert_eq!(body["data"][0]["fields"]["dts_url"], "https://dts.test/document?id=ENCPOS_1901_01");
    assert!(body["duration"].is_number());
    Ok(())
}

#[tokio::test]
async fn backend_failure_is_plain_text_400() -> anyhow::Result<()> {
    let response = search(State(service(None)), query(&[("query", "chartes")])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    let text = body_text(response).await?;
    assert!(text.contains("connection refused"));
    Ok(())
}

#[tokio::test]
async fn page_number_without_size_is_rejected() -> anyhow::Result<()> {
    let response = search(State(service(Some(json!({})))), query(&[("page[number]", "2")])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!body_text(response).await?.is_empty());
    Ok(())
}

#[test]
fn search_path_embeds_version() {
    assert_eq!(search_path("1.0"), "/api/1.0/search");
}
