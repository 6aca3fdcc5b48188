//! Domain types shared by the request parser, query builder and response composer.
//!
//! Request-side types are the typed form of the query string; response-side
//! types serialize to the client JSON contract (`data`, `total-count`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;

pub type FieldMap = Map<String, Value>;

/// Everything a search call needs, parsed once from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: Option<String>,
    pub query: Option<String>,
    pub ranges: Vec<RangeFilter>,
    pub sort: Vec<SortCriterion>,
    pub page: PageSpec,
    pub group: Option<GroupSpec>,
    pub highlight: bool,
}

/// `range[field]=gte:1871,lte:1899`. Operators are not checked against a
/// closed set; the backend decides what it accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub field: String,
    pub operators: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriterion {
    pub field: String,
    pub direction: SortDirection,
}

/// 1-based page number and effective page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub number: u32,
    pub size: u32,
}

impl PageSpec {
    pub fn offset(&self) -> u64 { u64::from(self.number.saturating_sub(1)) * u64::from(self.size) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub field: String,
    pub after: Option<AfterCursor>,
    /// Upper bound on member ids looked up per bucket.
    pub member_id_cap: u32,
}

impl GroupSpec {
    /// Names of the composite aggregation sources, in declared order.
    pub fn source_names(&self) -> Vec<&str> { vec![self.field.as_str()] }
}

/// Continuation cursor for a composite aggregation.
///
/// The client sends bare comma-separated values; they are bound to the
/// aggregation sources by position. Extra values are dropped, missing ones
/// leave the corresponding source unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterCursor(Vec<String>);

impl AfterCursor {
    pub fn parse(raw: &str) -> Self { Self(raw.split(',').map(str::to_string).collect()) }

    pub fn bind(&self, sources: &[&str]) -> FieldMap {
        sources
            .iter()
            .zip(self.0.iter())
            .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
            .collect()
    }
}

/// One document as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub score: Option<f64>,
    pub fields: FieldMap,
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: FieldMap,
    pub doc_count: u64,
    #[serde(rename = "_ids", default, skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<String>>,
}

impl Bucket {
    /// Value of `field` in the bucket key, if the key carries it.
    pub fn key_value(&self, field: &str) -> Option<&Value> { self.key.get(field) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub data: Vec<Hit>,
    #[serde(rename = "total-count")]
    pub total_count: u64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPage {
    pub buckets: Vec<Bucket>,
    pub after_key: Option<FieldMap>,
    #[serde(rename = "total-count")]
    pub total_count: u64,
    #[serde(rename = "bucket-count")]
    pub bucket_count: u64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResult {
    Groups(GroupPage),
    Documents(DocumentPage),
}

impl SearchResult {
    /// Stamp the elapsed time since `started`, in seconds rounded to 4 decimals.
    pub fn finish(mut self, started: Instant) -> Self {
        let duration = round_duration(started.elapsed().as_secs_f64());
        match &mut self {
            SearchResult::Groups(page) => page.duration = duration,
            SearchResult::Documents(page) => page.duration = duration,
        }
        self
    }
}

pub fn round_duration(secs: f64) -> f64 { (secs * 10_000.0).round() / 10_000.0 }

/// Link to the full document on the document-retrieval service.
pub fn document_url(dts_url: &str, id: &str) -> String { format!("{}/document?id={}", dts_url, id) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_cursor_binds_by_position() {
        let cursor = AfterCursor::parse("v1,v2");
        let bound = cursor.bind(&["author"]);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound.get("author"), Some(&Value::String("v1".to_string())));
    }

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(PageSpec { number: 1, size: 10 }.offset(), 0);
        assert_eq!(PageSpec { number: 3, size: 12 }.offset(), 24);
    }

    #[test]
    fn duration_rounds_to_four_places() {
        assert_eq!(round_duration(0.123_456), 0.1235);
        assert_eq!(round_duration(2.0), 2.0);
    }

    #[test]
    fn bucket_ids_only_serialized_when_present() {
        let mut key = FieldMap::new();
        key.insert("author".to_string(), Value::from("Smith"));
        let bucket = Bucket { key, doc_count: 3, member_ids: None };
        let json = serde_json::to_value(&bucket).unwrap();
        assert!(json.get("_ids").is_none());
        assert_eq!(json["doc_count"], 3);
    }
}
