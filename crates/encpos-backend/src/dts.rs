use reqwest::Client;
use std::time::Duration;

use encpos_core::config::Settings;
use encpos_core::error::{Error, Result};
use encpos_core::types::document_url;

/// Client for the document-retrieval service (`<dts>/document?id=...`).
#[derive(Debug, Clone)]
pub struct DtsClient {
    http: Client,
    base_url: String,
}

impl DtsClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.backend.timeout_secs))
            .build()
            .map_err(|e| Error::backend(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { http, base_url: settings.dts.url.clone() })
    }

    pub fn document_url(&self, id: &str) -> String { document_url(&self.base_url, id) }

    /// Raw markup of one document.
    pub async fn fetch_document(&self, id: &str) -> Result<String> {
        let response = self.http.get(self.document_url(id)).send().await.map_err(|e| Error::backend(e.to_string()))?;
        tracing::debug!("{} {}", id, response.status());
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(id.to_string()));
        }
        let response = response.error_for_status().map_err(|e| Error::backend(e.to_string()))?;
        response.text().await.map_err(|e| Error::backend(e.to_string()))
    }
}

/// Download the tab-separated metadata file.
pub async fn fetch_metadata_file(url: &str) -> anyhow::Result<String> {
    if url.is_empty() {
        anyhow::bail!("metadata.file_url is not configured");
    }
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.text().await?)
}
