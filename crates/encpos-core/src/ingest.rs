//! Pure helpers for rebuilding the document index: metadata TSV parsing, year
//! selection, body-text extraction from document markup, and bulk encoding.
//! Network I/O lives in `encpos-backend`; this module only transforms text.

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Error;

/// Descriptive fields indexed next to the document text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub author_name: String,
    pub author_firstname: String,
    pub title_rich: String,
    pub promotion_year: Option<i64>,
    #[serde(rename = "topic_notBefore")]
    pub topic_not_before: Option<i64>,
    #[serde(rename = "topic_notAfter")]
    pub topic_not_after: Option<i64>,
    pub author_gender: Option<i64>,
    pub author_is_enc_teacher: Option<i64>,
}

/// A row of the metadata file, keyed by document id.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub id: String,
    pub record: MetadataRecord,
}

/// Inclusive span of promotion years, e.g. `1987-1999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearSpan {
    pub start: u32,
    pub end: u32,
}

impl YearSpan {
    /// `all` resolves to `all_years`; anything else must be `start-end`.
    pub fn parse(raw: &str, all_years: &str) -> crate::error::Result<Self> {
        let raw = if raw == "all" { all_years } else { raw };
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| Error::malformed(format!("year span '{}' is not of the form start-end", raw)))?;
        let start = start.trim().parse::<u32>().map_err(|_| Error::malformed(format!("bad start year in '{}'", raw)))?;
        let end = end.trim().parse::<u32>().map_err(|_| Error::malformed(format!("bad end year in '{}'", raw)))?;
        if start > end {
            return Err(Error::malformed(format!("year span '{}' is reversed", raw)));
        }
        Ok(Self { start, end })
    }

    pub fn years(&self) -> impl Iterator<Item = u32> { self.start..=self.end }
}

/// Parse the tab-separated metadata file. The header must carry an `id`
/// column; rows whose numeric cells do not parse are logged and skipped.
pub fn parse_metadata_tsv(text: &str) -> Result<Vec<MetadataEntry>> {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    let header: Vec<&str> = lines.next().ok_or_else(|| anyhow!("metadata file is empty"))?.split('\t').collect();
    if !header.contains(&"id") {
        return Err(anyhow!("metadata file has no 'id' column"));
    }
    let mut entries = Vec::new();
    for line in lines {
        if line.trim().is_empty() { continue; }
        let cells: Vec<&str> = line.split('\t').collect();
        let id = column(&header, &cells, "id").to_string();
        match parse_record(&header, &cells) {
            Ok(record) => entries.push(MetadataEntry { id, record }),
            Err(e) => tracing::warn!("ERROR while indexing {}, {}", id, e),
        }
    }
    Ok(entries)
}

fn column<'a>(header: &[&str], cells: &[&'a str], name: &str) -> &'a str {
    header.iter().position(|h| *h == name).and_then(|i| cells.get(i).copied()).unwrap_or("")
}

fn parse_record(header: &[&str], cells: &[&str]) -> Result<MetadataRecord> {
    let cell = |name: &str| column(header, cells, name);
    Ok(MetadataRecord {
        author_name: cell("author_name").to_string(),
        author_firstname: cell("author_firstname").to_string(),
        title_rich: cell("title_rich").to_string(),
        promotion_year: optional_int(cell("promotion_year"))?,
        topic_not_before: optional_int(cell("topic_notBefore"))?,
        topic_not_after: optional_int(cell("topic_notAfter"))?,
        author_gender: optional_int(cell("author_gender"))?,
        author_is_enc_teacher: if cell("author_is_enc_teacher") == "1" { Some(1) } else { None },
    })
}

fn optional_int(raw: &str) -> Result<Option<i64>> {
    if raw.is_empty() { return Ok(None); }
    raw.trim().parse::<i64>().map(Some).map_err(|e| anyhow!("'{}': {}", raw, e))
}

/// Entries of the positions defended in `year`, in metadata order. Companion
/// entries (`_PREV`, `_NEXT`) are not documents of their own.
pub fn entries_for_year(entries: &[MetadataEntry], year: u32) -> Vec<&MetadataEntry> {
    let year = year.to_string();
    entries
        .iter()
        .filter(|e| e.id.contains(&year) && !e.id.contains("_PREV") && !e.id.contains("_NEXT"))
        .collect()
}

/// Turns document markup into indexable plain text.
pub struct DocumentProcessor {
    body_tag: Regex,
    any_tag: Regex,
}

impl DocumentProcessor {
    pub fn new() -> Result<Self> {
        Ok(Self { body_tag: Regex::new(r"<body(?s:.*?)>((?s:.*?))</body>")?, any_tag: Regex::new(r"<.*?>")? })
    }

    /// Inner markup of `<body>`, or the whole input when there is none.
    pub fn extract_body<'a>(&self, markup: &'a str) -> &'a str {
        self.body_tag.captures(markup).and_then(|c| c.get(1)).map(|m| m.as_str()).unwrap_or(markup)
    }

    /// Replace every tag with a single space.
    pub fn remove_tags(&self, markup: &str) -> String { self.any_tag.replace_all(markup, " ").into_owned() }

    pub fn document_text(&self, markup: &str) -> String { self.remove_tags(self.extract_body(markup)) }
}

/// A document ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    pub metadata: MetadataRecord,
}

/// NDJSON body for a bulk `index` request, one action/source pair per document.
pub fn bulk_body(index: &str, docs: &[IndexedDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        body.push_str(&serde_json::to_string(&json!({"index": {"_index": index, "_id": doc.id}}))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&json!({"content": doc.content, "metadata": doc.metadata}))?);
        body.push('\n');
    }
    Ok(body)
}
