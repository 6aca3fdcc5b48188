//! End-to-end search: parse, build, call the backend, compose, and for grouped
//! requests look up member ids per bucket.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Instant;

use encpos_core::config::{SearchSettings, Settings};
use encpos_core::error::{Error, Result};
use encpos_core::traits::SearchBackend;
use encpos_core::types::{Bucket, GroupSpec, SearchRequest, SearchResult};

use crate::builder::QueryBuilder;
use crate::compose::Composer;
use crate::params::{parse_request, QueryParams};

/// Request handling state. Built once at startup and shared read-only.
pub struct SearchService<B> {
    backend: B,
    search: SearchSettings,
    builder: QueryBuilder,
    composer: Composer,
}

impl<B: SearchBackend> SearchService<B> {
    pub fn new(backend: B, settings: &Settings) -> Self {
        Self {
            backend,
            search: settings.search.clone(),
            builder: QueryBuilder::from_settings(settings),
            composer: Composer::from_settings(settings),
        }
    }

    pub fn backend(&self) -> &B { &self.backend }

    pub async fn search(&self, params: &QueryParams) -> Result<SearchResult> {
        let started = Instant::now();
        let request = parse_request(params, &self.search)?;
        self.execute(&request, started).await
    }

    pub async fn execute(&self, request: &SearchRequest, started: Instant) -> Result<SearchResult> {
        let query = self.builder.build(request);
        tracing::debug!(index = %query.index, body = %query.body, "backend query");
        let raw = self.backend.search(&query.index, &query.body).await?;

        let result = match &request.group {
            None => SearchResult::Documents(self.composer.compose_documents(raw)?),
            Some(group) => {
                let mut page = self.composer.compose_groups(raw)?;
                self.attach_member_ids(&query.index, request, group, group.member_id_cap, &mut page.buckets).await?;
                SearchResult::Groups(page)
            }
        };
        Ok(result.finish(started))
    }

    /// One lookup per bucket, at most `lookup_concurrency` in flight. Results
    /// are applied in bucket order whatever the completion order.
    async fn attach_member_ids(&self, index: &str, request: &SearchRequest, group: &GroupSpec, cap: u32, buckets: &mut [Bucket]) -> Result<()> {
        let width = self.search.lookup_concurrency.max(1);
        let lookups: Vec<_> = buckets.iter().map(|bucket| self.lookup_members(index, request, group, cap, bucket)).collect();
        let found: Vec<Option<Vec<String>>> = stream::iter(lookups)
            .buffered(width)
            .try_collect()
            .await?;
        for (bucket, ids) in buckets.iter_mut().zip(found) {
            bucket.member_ids = ids;
        }
        Ok(())
    }

    async fn lookup_members(&self, index: &str, request: &SearchRequest, group: &GroupSpec, cap: u32, bucket: &Bucket) -> Result<Option<Vec<String>>> {
        if bucket.doc_count == 0 {
            return Ok(None);
        }
        let value = bucket
            .key_value(&group.field)
            .ok_or_else(|| Error::backend(format!("bucket key has no '{}' entry", group.field)))?;
        if cap == 0 {
            return Ok(Some(Vec::new()));
        }
        let body = self.builder.member_query(request, &group.field, value, cap);
        let raw = self.backend.search(index, &body).await?;
        self.composer.member_ids(raw).map(Some)
    }
}
