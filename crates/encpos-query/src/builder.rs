//! Query builder: [`SearchRequest`] to the backend's query/aggregation document.

use serde_json::{json, Map, Value};

use encpos_core::config::Settings;
use encpos_core::types::{GroupSpec, RangeFilter, SearchRequest, SortCriterion};

/// Fragments returned per highlighted field.
pub const HIGHLIGHT_FRAGMENTS: u32 = 100;

/// Name of the composite aggregation holding the group buckets.
pub const GROUP_AGGREGATION: &str = "items";
pub const TOTAL_COUNT_AGGREGATION: &str = "total_count";
pub const BUCKET_COUNT_AGGREGATION: &str = "bucket_count";

/// A query document and the index it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    pub index: String,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    default_index: String,
    content_field: String,
}

impl QueryBuilder {
    pub fn new(default_index: impl Into<String>, content_field: impl Into<String>) -> Self {
        Self { default_index: default_index.into(), content_field: content_field.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.backend.document_index.clone(), settings.search.content_field.clone())
    }

    /// The request's index when given and non-empty, the configured default otherwise.
    pub fn target_index(&self, request: &SearchRequest) -> String {
        match request.index.as_deref() {
            Some(index) if !index.is_empty() => index.to_string(),
            _ => self.default_index.clone(),
        }
    }

    pub fn build(&self, request: &SearchRequest) -> BackendQuery {
        let mut must = Vec::new();
        if let Some(query) = free_text(request) {
            must.push(json!({"query_string": {"query": query, "default_operator": "AND"}}));
        }
        must.extend(request.ranges.iter().map(range_clause));

        let mut body = Map::new();
        body.insert("query".to_string(), json!({"bool": {"must": must}}));
        if request.highlight {
            body.insert("highlight".to_string(), self.highlight());
        }
        match &request.group {
            Some(group) => {
                body.insert("aggregations".to_string(), group_aggregations(group, request.page.size));
                body.insert("size".to_string(), json!(0));
            }
            None => {
                body.insert("from".to_string(), json!(request.page.offset()));
                body.insert("size".to_string(), json!(request.page.size));
                body.insert("sort".to_string(), Value::Array(request.sort.iter().map(sort_clause).collect()));
            }
        }
        BackendQuery { index: self.target_index(request), body: Value::Object(body) }
    }

    /// Ids of the documents behind one bucket: the original free-text query
    /// narrowed to `field:value`, at most `cap` hits, no source.
    pub fn member_query(&self, request: &SearchRequest, field: &str, value: &Value, cap: u32) -> Value {
        let clause = format!("{}:{}", field, query_literal(value));
        let query = match free_text(request) {
            Some(q) => format!("({}) AND {}", q, clause),
            None => clause,
        };
        json!({"query": {"query_string": {"query": query}}, "size": cap, "_source": false})
    }

    fn highlight(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(self.content_field.clone(), json!({}));
        json!({
            "type": "fvh",
            "fields": fields,
            "number_of_fragments": HIGHLIGHT_FRAGMENTS,
            "options": {"return_offsets": false}
        })
    }
}

fn free_text(request: &SearchRequest) -> Option<&str> { request.query.as_deref().filter(|q| !q.is_empty()) }

fn range_clause(range: &RangeFilter) -> Value {
    let operators: Map<String, Value> = range.operators.iter().map(|(op, v)| (op.clone(), Value::String(v.clone()))).collect();
    let mut field = Map::new();
    field.insert(range.field.clone(), Value::Object(operators));
    json!({"range": field})
}

fn sort_clause(criterion: &SortCriterion) -> Value {
    let mut clause = Map::new();
    clause.insert(criterion.field.clone(), json!({"order": criterion.direction.as_str()}));
    Value::Object(clause)
}

fn group_aggregations(group: &GroupSpec, page_size: u32) -> Value {
    let sources: Vec<Value> = group
        .source_names()
        .iter()
        .map(|name| {
            let mut source = Map::new();
            source.insert((*name).to_string(), json!({"terms": {"field": name}}));
            Value::Object(source)
        })
        .collect();
    let mut composite = Map::new();
    composite.insert("sources".to_string(), Value::Array(sources));
    composite.insert("size".to_string(), json!(page_size));
    if let Some(after) = &group.after {
        composite.insert("after".to_string(), Value::Object(after.bind(&group.source_names())));
    }

    let mut aggregations = Map::new();
    aggregations.insert(GROUP_AGGREGATION.to_string(), json!({"composite": composite}));
    aggregations.insert(TOTAL_COUNT_AGGREGATION.to_string(), json!({"cardinality": {"field": "_id"}}));
    aggregations.insert(BUCKET_COUNT_AGGREGATION.to_string(), json!({"cardinality": {"field": group.field}}));
    Value::Object(aggregations)
}

/// Render a bucket key value for a query-string clause. Strings are quoted so
/// that values with spaces or reserved characters match as a whole.
fn query_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encpos_core::config::DEFAULT_MEMBER_ID_CAP;
    use encpos_core::types::{AfterCursor, PageSpec, SortDirection};
    use std::collections::BTreeMap;

    fn request() -> SearchRequest {
        SearchRequest {
            index: None,
            query: Some("chartes".to_string()),
            ranges: Vec::new(),
            sort: Vec::new(),
            page: PageSpec { number: 1, size: 10 },
            group: None,
            highlight: true,
        }
    }

    fn builder() -> QueryBuilder { QueryBuilder::new("encpos_document", "content") }

    #[test]
    fn free_text_uses_and_operator() {
        let q = builder().build(&request());
        let must = q.body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["query_string"]["query"], "chartes");
        assert_eq!(must[0]["query_string"]["default_operator"], "AND");
    }

    #[test]
    fn missing_or_empty_query_matches_all() {
        let mut req = request();
        req.query = Some(String::new());
        assert!(builder().build(&req).body["query"]["bool"]["must"].as_array().unwrap().is_empty());
        req.query = None;
        assert!(builder().build(&req).body["query"]["bool"]["must"].as_array().unwrap().is_empty());
    }

    #[test]
    fn one_range_clause_per_filter() {
        let mut req = request();
        req.ranges.push(RangeFilter {
            field: "year".into(),
            operators: BTreeMap::from([("gte".to_string(), "1871".to_string()), ("lte".to_string(), "1899".to_string())]),
        });
        let q = builder().build(&req);
        let ranges: Vec<&Value> = q.body["query"]["bool"]["must"].as_array().unwrap().iter().filter(|c| c.get("range").is_some()).collect();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0]["range"], json!({"year": {"gte": "1871", "lte": "1899"}}));
    }

    #[test]
    fn highlight_block_follows_flag() {
        let q = builder().build(&request());
        assert_eq!(q.body["highlight"]["type"], "fvh");
        assert_eq!(q.body["highlight"]["number_of_fragments"], 100);
        assert_eq!(q.body["highlight"]["options"]["return_offsets"], false);
        assert!(q.body["highlight"]["fields"].get("content").is_some());

        let mut req = request();
        req.highlight = false;
        assert!(builder().build(&req).body.get("highlight").is_none());
    }

    #[test]
    fn pagination_and_sort_for_plain_queries() {
        let mut req = request();
        req.page = PageSpec { number: 2, size: 12 };
        req.sort = vec![
            SortCriterion { field: "year".into(), direction: SortDirection::Desc },
            SortCriterion { field: "title".into(), direction: SortDirection::Asc },
        ];
        let q = builder().build(&req);
        assert_eq!(q.body["from"], 12);
        assert_eq!(q.body["size"], 12);
        assert_eq!(q.body["sort"], json!([{"year": {"order": "desc"}}, {"title": {"order": "asc"}}]));
        assert!(q.body.get("aggregations").is_none());
    }

    #[test]
    fn grouping_builds_composite_without_cursor() {
        let mut req = request();
        req.group = Some(GroupSpec { field: "author".into(), after: None, member_id_cap: DEFAULT_MEMBER_ID_CAP });
        let q = builder().build(&req);
        assert_eq!(q.body["size"], 0);
        assert!(q.body.get("from").is_none());
        let composite = &q.body["aggregations"]["items"]["composite"];
        assert_eq!(composite["sources"], json!([{"author": {"terms": {"field": "author"}}}]));
        assert_eq!(composite["size"], 10);
        assert!(composite.get("after").is_none());
        assert_eq!(q.body["aggregations"]["total_count"]["cardinality"]["field"], "_id");
        assert_eq!(q.body["aggregations"]["bucket_count"]["cardinality"]["field"], "author");
    }

    #[test]
    fn after_page_becomes_positional_cursor() {
        let mut req = request();
        req.group = Some(GroupSpec { field: "author".into(), after: Some(AfterCursor::parse("v1")), member_id_cap: DEFAULT_MEMBER_ID_CAP });
        let q = builder().build(&req);
        assert_eq!(q.body["aggregations"]["items"]["composite"]["after"], json!({"author": "v1"}));
    }

    #[test]
    fn index_falls_back_to_default() {
        let mut req = request();
        assert_eq!(builder().build(&req).index, "encpos_document");
        req.index = Some(String::new());
        assert_eq!(builder().build(&req).index, "encpos_document");
        req.index = Some("encpos_collection".into());
        assert_eq!(builder().build(&req).index, "encpos_collection");
    }

    #[test]
    fn member_query_narrows_original_query() {
        let body = builder().member_query(&request(), "author", &json!("Smith"), 5);
        assert_eq!(body["query"]["query_string"]["query"], "(chartes) AND author:\"Smith\"");
        assert_eq!(body["size"], 5);
        assert_eq!(body["_source"], false);

        let mut req = request();
        req.query = None;
        let body = builder().member_query(&req, "promotion_year", &json!(1901), 10);
        assert_eq!(body["query"]["query_string"]["query"], "promotion_year:1901");
    }
}
