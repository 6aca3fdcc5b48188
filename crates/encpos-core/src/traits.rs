use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// The document-search backend as seen by the query layer.
///
/// `body` is a complete query document; the returned value is the backend's
/// raw response. Implementations must be safe to share across requests.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, index: &str, body: &Value) -> Result<Value>;
}
