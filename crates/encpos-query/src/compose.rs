//! Response composer: backend responses to the client-facing result shapes.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use encpos_core::config::Settings;
use encpos_core::error::{Error, Result};
use encpos_core::types::{document_url, Bucket, DocumentPage, FieldMap, GroupPage, Hit};

#[derive(Debug, Deserialize)]
struct RawResponse {
    hits: RawHits,
    #[serde(default)]
    aggregations: Option<RawAggregations>,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// Older backends report a bare count, newer ones `{"value": n, "relation": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object { value: u64 },
}

impl RawTotal {
    fn value(&self) -> u64 {
        match self {
            RawTotal::Count(n) | RawTotal::Object { value: n } => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: FieldMap,
    #[serde(default)]
    highlight: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct RawAggregations {
    items: RawComposite,
    total_count: RawCardinality,
    bucket_count: RawCardinality,
}

#[derive(Debug, Deserialize)]
struct RawComposite {
    buckets: Vec<Bucket>,
    #[serde(default)]
    after_key: Option<FieldMap>,
}

#[derive(Debug, Deserialize)]
struct RawCardinality {
    value: u64,
}

#[derive(Debug, Clone)]
pub struct Composer {
    dts_url: String,
    content_field: String,
}

impl Composer {
    pub fn new(dts_url: impl Into<String>, content_field: impl Into<String>) -> Self {
        Self { dts_url: dts_url.into(), content_field: content_field.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self { Self::new(settings.dts.url.clone(), settings.search.content_field.clone()) }

    /// Plain hits: source fields without the raw content, plus a `dts_url` link.
    pub fn compose_documents(&self, raw: Value) -> Result<DocumentPage> {
        let response: RawResponse = serde_json::from_value(raw)?;
        let total_count = response.hits.total.as_ref().map(RawTotal::value).unwrap_or(response.hits.hits.len() as u64);
        let data = response.hits.hits.into_iter().map(|hit| self.hit(hit)).collect();
        Ok(DocumentPage { data, total_count, duration: 0.0 })
    }

    /// Composite buckets and cardinalities. Member ids are attached later.
    pub fn compose_groups(&self, raw: Value) -> Result<GroupPage> {
        let response: RawResponse = serde_json::from_value(raw)?;
        let aggregations = response.aggregations.ok_or_else(|| Error::backend("response carries no aggregations"))?;
        tracing::debug!(
            "aggregations: {} buckets; after_key: {:?}",
            aggregations.items.buckets.len(),
            aggregations.items.after_key
        );
        Ok(GroupPage {
            buckets: aggregations.items.buckets,
            after_key: aggregations.items.after_key,
            total_count: aggregations.total_count.value,
            bucket_count: aggregations.bucket_count.value,
            duration: 0.0,
        })
    }

    /// Hit ids of a member lookup, sorted.
    pub fn member_ids(&self, raw: Value) -> Result<Vec<String>> {
        let response: RawResponse = serde_json::from_value(raw)?;
        let mut ids: Vec<String> = response.hits.hits.into_iter().map(|h| h.id).collect();
        ids.sort();
        Ok(ids)
    }

    fn hit(&self, hit: RawHit) -> Hit {
        let mut fields = hit.source;
        fields.retain(|name, _| name != &self.content_field);
        fields.insert("dts_url".to_string(), Value::String(document_url(&self.dts_url, &hit.id)));
        Hit { id: hit.id, score: hit.score, fields, highlight: hit.highlight }
    }
}
