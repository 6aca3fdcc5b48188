use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use encpos_core::config::BackendSettings;
use encpos_core::error::{Error, Result};
use encpos_core::traits::SearchBackend;

/// Elasticsearch-compatible REST client. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    bulk_timeout: Duration,
}

impl ElasticClient {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::backend(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            bulk_timeout: Duration::from_secs(settings.bulk_timeout_secs),
        })
    }

    pub fn index_url(&self, index: &str) -> String { format!("{}/{}", self.base_url, index) }

    pub async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/_search", self.index_url(index));
        let response = self.http.post(&url).json(body).send().await.map_err(transport)?;
        read_json(response).await
    }

    /// Send an NDJSON bulk body. Item-level failures are logged, not raised.
    pub async fn bulk(&self, ndjson: String) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .timeout(self.bulk_timeout)
            .body(ndjson)
            .send()
            .await
            .map_err(transport)?;
        let result = read_json(response).await?;
        let failed = bulk_failures(&result);
        if failed > 0 {
            tracing::warn!("bulk request: {} item(s) rejected by the backend", failed);
        }
        Ok(result)
    }

    /// Drop an index. A missing index is not an error.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.http.delete(self.index_url(index)).send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!("index {} does not exist", index);
            return Ok(());
        }
        read_json(response).await.map(|_| ())
    }

    /// Create or update an index with a settings/mappings payload.
    pub async fn put_index(&self, index: &str, payload: &Value) -> Result<()> {
        let url = self.index_url(index);
        tracing::info!("UPDATE INDEX CONFIGURATION: {}", url);
        let response = self.http.put(&url).json(payload).send().await.map_err(transport)?;
        read_json(response).await.map(|_| ())
    }
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn search(&self, index: &str, body: &Value) -> Result<Value> { ElasticClient::search(self, index, body).await }
}

fn transport(e: reqwest::Error) -> Error { Error::backend(e.to_string()) }

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(Error::backend(format!("{}: {}", status, text)));
    }
    serde_json::from_str(&text).map_err(Error::from)
}

/// Number of bulk items that carry an `error` entry.
pub fn bulk_failures(response: &Value) -> usize {
    response["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| item.as_object().map(|ops| ops.values().any(|op| op.get("error").is_some())).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}
