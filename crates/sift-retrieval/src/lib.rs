// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid multi-source retrieval for the Sift engine.
//!
//! Runs vector, event and action searches concurrently, ranks each list with
//! recency decay and entity/platform boosts, truncates per category, and
//! produces a unified cross-channel ordering by weighted score or RRF.
//! A failing channel is logged and recorded in provenance; the others still
//! contribute.

pub mod fusion;
pub mod ranking;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sift_cache::ContextCache;
use sift_config::model::RetrievalConfig;
use sift_core::context::{
    FusedContext, FusionMode, MAX_ACTION_RESULTS, MAX_CONTENT_RESULTS, MAX_EVENT_RESULTS,
    Provenance, ResultSource, RetrievalFilters, SearchResult, SourceDetail,
};
use sift_core::error::SiftError;
use sift_core::params::ParameterStore;
use sift_core::records::ActionRecord;
use sift_core::traits::{ActionStore, EmbeddingAdapter, EventStore, VectorStore};
use sift_core::types::InformationNeeds;
use tracing::{debug, warn};

use crate::ranking::RankingContext;

/// Base score of a pending action before ranking.
const PENDING_ACTION_SCORE: f64 = 1.5;
/// Base score of a completed action before ranking.
const COMPLETED_ACTION_SCORE: f64 = 1.0;
/// Base score of every event before ranking.
const EVENT_SCORE: f64 = 1.0;

/// The data sources one retriever searches.
#[derive(Clone)]
pub struct RetrievalSources {
    pub vector: Arc<dyn VectorStore>,
    pub events: Arc<dyn EventStore>,
    pub actions: Arc<dyn ActionStore>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
}

pub struct HybridRetriever {
    sources: RetrievalSources,
    cache: Arc<ContextCache>,
    params: Arc<ParameterStore>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        sources: RetrievalSources,
        cache: Arc<ContextCache>,
        params: Arc<ParameterStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            sources,
            cache,
            params,
            config,
        }
    }

    /// Filters for the first retrieval round of a query.
    pub fn initial_filters(&self, needs: &InformationNeeds) -> RetrievalFilters {
        RetrievalFilters {
            user_id: needs.user_id.clone(),
            time_range: needs.time_reference.clone(),
            platforms: needs.platforms.clone(),
            entities: needs.entities.clone(),
            vector_top_k: self.config.vector_top_k,
            event_limit: self.config.event_limit,
            action_limit: self.config.action_limit,
        }
    }

    pub async fn retrieve(
        &self,
        needs: &InformationNeeds,
        filters: &RetrievalFilters,
        attempt: u32,
    ) -> FusedContext {
        self.retrieve_at(needs, filters, attempt, Utc::now()).await
    }

    /// Run one retrieval round with an explicit clock for recency decay.
    pub async fn retrieve_at(
        &self,
        needs: &InformationNeeds,
        filters: &RetrievalFilters,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> FusedContext {
        let (content, events, actions) = tokio::join!(
            self.vector_search(needs, filters),
            self.event_search(filters),
            self.action_search(filters),
        );

        let mut failed_sources = Vec::new();
        let mut settle = |source: ResultSource, result: Result<Vec<SearchResult>, SiftError>| {
            result.unwrap_or_else(|e| {
                warn!(
                    user_id = %filters.user_id,
                    attempt,
                    channel = %source,
                    error = %e,
                    "retrieval channel failed, continuing with partial context"
                );
                failed_sources.push(source);
                Vec::new()
            })
        };
        let mut content = settle(ResultSource::Vector, content);
        let mut events = settle(ResultSource::Event, events);
        let mut actions = settle(ResultSource::Action, actions);

        let ctx = RankingContext::new(&self.config, &needs.entities, &needs.platforms, now);
        ranking::rank(&mut content, &ctx, MAX_CONTENT_RESULTS);
        ranking::rank(&mut events, &ctx, MAX_EVENT_RESULTS);
        ranking::rank(&mut actions, &ctx, MAX_ACTION_RESULTS);

        let params = self.params.snapshot();
        let lists = [
            (ResultSource::Vector, content.as_slice()),
            (ResultSource::Event, events.as_slice()),
            (ResultSource::Action, actions.as_slice()),
        ];
        let ranking = match self.config.fusion_mode {
            FusionMode::Weighted => fusion::weighted_fusion(&lists, &params.retrieval_weights),
            FusionMode::Rrf => fusion::reciprocal_rank_fusion(&lists, params.rrf_k),
        };

        debug!(
            user_id = %filters.user_id,
            attempt,
            content = content.len(),
            events = events.len(),
            actions = actions.len(),
            failed = failed_sources.len(),
            "retrieval round complete"
        );

        FusedContext {
            content,
            events,
            actions,
            ranking,
            provenance: Provenance {
                attempt,
                filters: filters.clone(),
                fusion_mode: self.config.fusion_mode,
                failed_sources,
                from_cache: false,
            },
        }
    }

    /// Query embedding, served from the embedding cache when possible.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SiftError> {
        if let Some(vector) = self.cache.get_embedding(text).await {
            return Ok(vector);
        }
        let vector = self.sources.embedder.embed(text).await?;
        self.cache.put_embedding(text, vector.clone()).await;
        Ok(vector)
    }

    async fn vector_search(
        &self,
        needs: &InformationNeeds,
        filters: &RetrievalFilters,
    ) -> Result<Vec<SearchResult>, SiftError> {
        let vector = self.embed(&needs.query).await?;
        let hits = self
            .sources
            .vector
            .search(&vector, filters, filters.vector_top_k)
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id,
                content: hit.payload.content,
                score: hit.score,
                timestamp: hit.payload.timestamp,
                detail: SourceDetail::Content {
                    platform: hit.payload.platform,
                    title: hit.payload.title,
                    user_id: hit.payload.user_id,
                },
            })
            .collect())
    }

    async fn event_search(
        &self,
        filters: &RetrievalFilters,
    ) -> Result<Vec<SearchResult>, SiftError> {
        let records = self
            .sources
            .events
            .events(
                &filters.user_id,
                filters.time_range.as_ref(),
                &filters.platforms,
                &filters.entities,
                filters.event_limit,
            )
            .await?;

        Ok(records
            .into_iter()
            .map(|e| SearchResult {
                id: e.id,
                content: e.summary,
                score: EVENT_SCORE,
                timestamp: e.timestamp,
                detail: SourceDetail::Event {
                    platform: e.platform,
                    event_type: e.event_type,
                    actor: e.actor,
                },
            })
            .collect())
    }

    async fn action_search(
        &self,
        filters: &RetrievalFilters,
    ) -> Result<Vec<SearchResult>, SiftError> {
        let since = filters.time_range.as_ref().map(|t| t.start);
        let (pending, completed) = tokio::join!(
            self.sources
                .actions
                .pending(&filters.user_id, filters.action_limit),
            self.sources
                .actions
                .completed(&filters.user_id, since, filters.action_limit),
        );

        let mut results: Vec<SearchResult> = pending?
            .into_iter()
            .map(|a| action_result(a, PENDING_ACTION_SCORE))
            .collect();
        for a in completed? {
            if results.len() >= filters.action_limit {
                break;
            }
            if !results.iter().any(|r| r.id == a.id) {
                results.push(action_result(a, COMPLETED_ACTION_SCORE));
            }
        }
        results.truncate(filters.action_limit);
        Ok(results)
    }
}

fn action_result(a: ActionRecord, base: f64) -> SearchResult {
    SearchResult {
        id: a.id,
        content: a.description,
        score: base,
        timestamp: a.timestamp,
        detail: SourceDetail::Action {
            status: a.status,
            action_type: a.action_type,
            confidence: a.confidence,
        },
    }
}
