//! Request parser: raw query-string pairs to a typed [`SearchRequest`].
//!
//! Recognised keys:
//! - `index`, `query`: passed through as given
//! - `range[<field>]=<op>:<value>,...`: one range filter per field
//! - `sort=-year,title`: `-` marks descending
//! - `page[number]`, `page[size]`: pagination, `page[size]` mandatory once either is given
//! - `groupby[field]`, `groupby[after-page]`, `groupby[with-ids]`: composite grouping
//! - `no-highlight`: presence alone disables highlighting

use std::collections::{BTreeMap, HashSet};

use encpos_core::config::SearchSettings;
use encpos_core::error::{Error, Result};
use encpos_core::types::{AfterCursor, GroupSpec, PageSpec, RangeFilter, SearchRequest, SortCriterion, SortDirection};

/// Query-string pairs in arrival order. A repeated key resolves to its first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self { Self(pairs) }

    pub fn get(&self, key: &str) -> Option<&str> { self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()) }

    pub fn contains(&self, key: &str) -> bool { self.0.iter().any(|(k, _)| k == key) }

    /// Distinct keys with their first value, in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut seen = HashSet::new();
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())).filter(move |(k, _)| seen.insert(*k))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self { Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()) }
}

pub fn parse_request(params: &QueryParams, settings: &SearchSettings) -> Result<SearchRequest> {
    Ok(SearchRequest {
        index: params.get("index").map(str::to_string),
        query: params.get("query").map(str::to_string),
        ranges: parse_ranges(params)?,
        sort: params.get("sort").map(parse_sort).unwrap_or_default(),
        page: parse_page(params, settings.per_page)?,
        group: parse_group(params, settings.member_id_cap)?,
        highlight: !params.contains("no-highlight"),
    })
}

fn parse_ranges(params: &QueryParams) -> Result<Vec<RangeFilter>> {
    let mut ranges = Vec::new();
    for (key, value) in params.iter() {
        let Some(field) = key.strip_prefix("range[").and_then(|k| k.strip_suffix(']')) else { continue };
        if field.is_empty() {
            return Err(Error::malformed("range parameter without a field name"));
        }
        let mut operators = BTreeMap::new();
        for pair in value.split(',') {
            match pair.split_once(':') {
                Some((op, v)) if !op.is_empty() => { operators.insert(op.to_string(), v.to_string()); }
                _ => return Err(Error::malformed(format!("range[{}]: expected <operator>:<value>, got '{}'", field, pair))),
            }
        }
        ranges.push(RangeFilter { field: field.to_string(), operators });
    }
    Ok(ranges)
}

fn parse_sort(raw: &str) -> Vec<SortCriterion> {
    raw.split(',')
        .map(|criterion| match criterion.strip_prefix('-') {
            Some(field) => SortCriterion { field: field.to_string(), direction: SortDirection::Desc },
            None => SortCriterion { field: criterion.to_string(), direction: SortDirection::Asc },
        })
        .filter(|c| !c.field.is_empty())
        .collect()
}

fn parse_page(params: &QueryParams, per_page: u32) -> Result<PageSpec> {
    if !params.contains("page[number]") && !params.contains("page[size]") {
        return Ok(PageSpec { number: 1, size: per_page });
    }
    let number = match params.get("page[number]") {
        Some(raw) => parse_positive("page[number]", raw)?,
        None => 1,
    };
    let requested = params
        .get("page[size]")
        .ok_or_else(|| Error::malformed("page[size] is required when paginating"))?;
    let requested = parse_positive("page[size]", requested)?;
    // The cap grows with the page number; kept as the API has always behaved.
    Ok(PageSpec { number, size: requested.min(per_page.saturating_add(number)) })
}

fn parse_positive(name: &str, raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::malformed(format!("{} must be a positive integer, got '{}'", name, raw))),
    }
}

fn parse_group(params: &QueryParams, default_cap: u32) -> Result<Option<GroupSpec>> {
    let Some(field) = params.get("groupby[field]") else { return Ok(None) };
    if field.is_empty() {
        return Err(Error::malformed("groupby[field] is empty"));
    }
    Ok(Some(GroupSpec {
        field: field.to_string(),
        after: params.get("groupby[after-page]").map(AfterCursor::parse),
        member_id_cap: member_id_cap(params.get("groupby[with-ids]"), default_cap),
    }))
}

/// Any value that is not a number, `false` included, falls back to the default.
fn member_id_cap(raw: Option<&str>, default_cap: u32) -> u32 {
    match raw.map(str::trim) {
        None | Some("") => default_cap,
        Some(v) => parse_member_id_cap(v).unwrap_or_else(|e| {
            tracing::warn!("{}; falling back to {}", e, default_cap);
            default_cap
        }),
    }
}

pub fn parse_member_id_cap(raw: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|_| Error::AggregationCapParse(format!("groupby[with-ids]={}", raw)))
}
