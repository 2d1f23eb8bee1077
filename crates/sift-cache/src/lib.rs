// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-level cache for the Sift engine.
//!
//! Four independent LRU stores (query analysis, fused context, embeddings,
//! final responses), each with its own capacity and base TTL. The effective
//! TTL is the base TTL scaled by the store's learned multiplier, read from
//! the current parameter snapshot on every lookup.

pub mod keys;
pub mod store;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sift_config::model::CacheConfig;
use sift_core::context::FusedContext;
use sift_core::params::ParameterStore;
use sift_core::types::{InformationNeeds, Intent};
use tokio::time::Instant;
use tracing::debug;

pub use store::{CacheEntry, EntryOrigin, StoreStats, TtlLruStore};

/// A cached final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub response: String,
    pub sufficiency_score: f64,
    /// Intent the answer was generated under.
    pub intent: Intent,
    /// Results the answer was generated from.
    #[serde(default)]
    pub context_ids: Vec<String>,
}

/// A context served from cache.
#[derive(Debug, Clone)]
pub struct ContextHit {
    pub context: FusedContext,
    /// 1.0 for exact hits.
    pub similarity: f64,
    pub exact: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub query: StoreStats,
    pub context: StoreStats,
    pub embedding: StoreStats,
    pub response: StoreStats,
}

/// Jaccard index of two key sets. Two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// `0.5 * (intent equal) + 0.5 * jaccard(entity keys)`.
pub fn context_similarity(
    intent_a: Intent,
    keys_a: &BTreeSet<String>,
    intent_b: Intent,
    keys_b: &BTreeSet<String>,
) -> f64 {
    let intent = if intent_a == intent_b { 1.0 } else { 0.0 };
    0.5 * intent + 0.5 * jaccard(keys_a, keys_b)
}

pub struct ContextCache {
    config: CacheConfig,
    params: Arc<ParameterStore>,
    query: TtlLruStore<InformationNeeds>,
    context: TtlLruStore<FusedContext>,
    embedding: TtlLruStore<Vec<f32>>,
    response: TtlLruStore<CachedResponse>,
}

impl ContextCache {
    pub fn new(config: CacheConfig, params: Arc<ParameterStore>) -> Self {
        Self {
            query: TtlLruStore::new("query", config.query_capacity),
            context: TtlLruStore::new("context", config.context_capacity),
            embedding: TtlLruStore::new("embedding", config.embedding_capacity),
            response: TtlLruStore::new("response", config.response_capacity),
            config,
            params,
        }
    }

    fn scaled(base_secs: u64, multiplier: f64) -> Duration {
        Duration::from_secs_f64(base_secs as f64 * multiplier.max(0.0))
    }

    fn query_ttl(&self) -> Duration {
        Self::scaled(
            self.config.query_ttl_secs,
            self.params.snapshot().cache_ttl_multipliers.query,
        )
    }

    fn embedding_ttl(&self) -> Duration {
        Self::scaled(
            self.config.embedding_ttl_secs,
            self.params.snapshot().cache_ttl_multipliers.embedding,
        )
    }

    fn response_ttl(&self) -> Duration {
        Self::scaled(
            self.config.response_ttl_secs,
            self.params.snapshot().cache_ttl_multipliers.response,
        )
    }

    /// Effective maximum age of a context served for `needs`.
    ///
    /// The learned TTL is capped by the fixed ceiling, and by the tighter
    /// freshness bound for queries about the last hour.
    pub fn context_ttl(&self, needs: &InformationNeeds) -> Duration {
        let learned = Self::scaled(
            self.config.context_ttl_secs,
            self.params.snapshot().cache_ttl_multipliers.context,
        );
        let mut ttl = learned.min(Duration::from_secs(self.config.context_max_age_secs));
        if needs.is_realtime() {
            ttl = ttl.min(Duration::from_secs(self.config.realtime_max_age_secs));
        }
        ttl
    }

    pub async fn get_analysis(&self, query: &str, user_id: &str) -> Option<InformationNeeds> {
        let key = keys::query_key(query, user_id, Utc::now());
        self.query
            .get(&key, self.query_ttl())
            .await
            .map(|e| e.payload)
    }

    pub async fn put_analysis(&self, needs: &InformationNeeds) {
        let key = keys::query_key(&needs.query, &needs.user_id, Utc::now());
        self.query
            .insert(CacheEntry {
                key,
                payload: needs.clone(),
                cached_at: Instant::now(),
                user_id: Some(needs.user_id.clone()),
                origin: None,
            })
            .await;
    }

    /// Exact lookup first, then the most similar same-user entry at or
    /// above the fuzzy threshold.
    pub async fn get_context(&self, needs: &InformationNeeds) -> Option<ContextHit> {
        let ttl = self.context_ttl(needs);
        let key = keys::context_key(&needs.query, &needs.user_id);
        if let Some(entry) = self.context.get(&key, ttl).await {
            debug!(user_id = %needs.user_id, "exact context cache hit");
            return Some(ContextHit {
                context: entry.payload,
                similarity: 1.0,
                exact: true,
            });
        }

        let wanted = needs.entity_keys();
        let threshold = self.config.fuzzy_threshold;
        let best = self
            .context
            .best_match(ttl, |entry| {
                if entry.user_id.as_deref() != Some(needs.user_id.as_str()) {
                    return None;
                }
                let origin = entry.origin.as_ref()?;
                let sim = context_similarity(
                    needs.intent,
                    &wanted,
                    origin.intent,
                    &origin.entity_keys,
                );
                (sim >= threshold).then_some(sim)
            })
            .await;

        // The exact miss above was already counted; a fuzzy hit converts it.
        let (entry, similarity) = best?;
        self.context.record_hit();
        debug!(
            user_id = %needs.user_id,
            similarity,
            matched_query = entry.origin.as_ref().map(|o| o.query.as_str()).unwrap_or_default(),
            "fuzzy context cache hit"
        );
        Some(ContextHit {
            context: entry.payload,
            similarity,
            exact: false,
        })
    }

    pub async fn put_context(&self, needs: &InformationNeeds, context: &FusedContext) {
        self.context
            .insert(CacheEntry {
                key: keys::context_key(&needs.query, &needs.user_id),
                payload: context.clone(),
                cached_at: Instant::now(),
                user_id: Some(needs.user_id.clone()),
                origin: Some(EntryOrigin {
                    query: needs.query.clone(),
                    intent: needs.intent,
                    entity_keys: needs.entity_keys(),
                }),
            })
            .await;
    }

    pub async fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.embedding
            .get(&keys::embedding_key(text), self.embedding_ttl())
            .await
            .map(|e| e.payload)
    }

    pub async fn put_embedding(&self, text: &str, vector: Vec<f32>) {
        self.embedding
            .insert(CacheEntry {
                key: keys::embedding_key(text),
                payload: vector,
                cached_at: Instant::now(),
                user_id: None,
                origin: None,
            })
            .await;
    }

    pub async fn get_response(&self, query: &str, user_id: &str) -> Option<CachedResponse> {
        self.response
            .get(&keys::response_key(query, user_id), self.response_ttl())
            .await
            .map(|e| e.payload)
    }

    pub async fn put_response(&self, query: &str, user_id: &str, response: CachedResponse) {
        self.response
            .insert(CacheEntry {
                key: keys::response_key(query, user_id),
                payload: response,
                cached_at: Instant::now(),
                user_id: Some(user_id.to_string()),
                origin: None,
            })
            .await;
    }

    /// Drop every user-scoped entry for `user_id`. Embeddings are untouched.
    pub async fn invalidate_user(&self, user_id: &str) -> usize {
        let removed = self.query.remove_user(user_id).await
            + self.context.remove_user(user_id).await
            + self.response.remove_user(user_id).await;
        debug!(user_id, removed, "invalidated user cache entries");
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            query: self.query.stats().await,
            context: self.context.stats().await,
            embedding: self.embedding.stats().await,
            response: self.response.stats().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::context::{FusionMode, Provenance, RetrievalFilters};
    use sift_core::types::{Complexity, Entity, EntityKind, TimeRange};

    fn needs(query: &str, intent: Intent, entities: &[&str]) -> InformationNeeds {
        InformationNeeds {
            query: query.into(),
            user_id: "u1".into(),
            intent,
            intent_confidence: 0.9,
            entities: entities
                .iter()
                .map(|v| Entity::new(EntityKind::Name, *v, 0.5))
                .collect(),
            time_reference: None,
            platforms: BTreeSet::new(),
            complexity: Complexity::Simple,
            required_context: intent.required_context(),
            references_previous_turn: false,
            strategies: vec![],
        }
    }

    fn context(attempt: u32) -> FusedContext {
        FusedContext::empty(Provenance {
            attempt,
            filters: RetrievalFilters {
                user_id: "u1".into(),
                time_range: None,
                platforms: BTreeSet::new(),
                entities: vec![],
                vector_top_k: 10,
                event_limit: 20,
                action_limit: 10,
            },
            fusion_mode: FusionMode::Weighted,
            failed_sources: vec![],
            from_cache: false,
        })
    }

    fn cache() -> ContextCache {
        ContextCache::new(CacheConfig::default(), Arc::new(ParameterStore::default()))
    }

    #[test]
    fn jaccard_of_empty_sets_is_zero() {
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn same_intent_half_overlap_scores_three_quarters() {
        let a: BTreeSet<String> = ["name:a".to_string(), "name:b".to_string()].into();
        let b: BTreeSet<String> = ["name:a".to_string()].into();
        let sim = context_similarity(Intent::QueryEvents, &a, Intent::QueryEvents, &b);
        assert!((sim - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn exact_context_hit() {
        let cache = cache();
        let n = needs("what did Ann ship", Intent::QueryEvents, &["Ann"]);
        cache.put_context(&n, &context(2)).await;
        let hit = cache.get_context(&n).await.expect("exact hit");
        assert!(hit.exact);
        assert_eq!(hit.context.provenance.attempt, 2);
    }

    #[tokio::test]
    async fn fuzzy_hit_for_similar_query_from_same_user() {
        let cache = cache();
        let cached = needs("what did Ann and Bo ship", Intent::QueryEvents, &["Ann", "Bo"]);
        cache.put_context(&cached, &context(1)).await;

        let probe = needs("Ann shipped what", Intent::QueryEvents, &["Ann"]);
        let hit = cache.get_context(&probe).await.expect("fuzzy hit");
        assert!(!hit.exact);
        assert!((hit.similarity - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fuzzy_match_requires_threshold_and_same_user() {
        let cache = cache();
        let cached = needs("what did Ann ship", Intent::QueryEvents, &["Ann"]);
        cache.put_context(&cached, &context(1)).await;

        // Different intent, full overlap: 0.5 < 0.7.
        let probe = needs("find Ann", Intent::SearchContent, &["Ann"]);
        assert!(cache.get_context(&probe).await.is_none());

        let mut other_user = needs("Ann's work", Intent::QueryEvents, &["Ann"]);
        other_user.user_id = "u2".into();
        assert!(cache.get_context(&other_user).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_queries_reject_stale_context() {
        let cache = cache();
        let mut n = needs("errors this hour", Intent::QueryEvents, &[]);
        let now = Utc::now();
        n.time_reference = Some(TimeRange::new(now - chrono::Duration::minutes(30), now, "this hour"));
        cache.put_context(&n, &context(1)).await;

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get_context(&n).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_multiplier_scales_expiry() {
        let params = Arc::new(ParameterStore::default());
        let cache = ContextCache::new(CacheConfig::default(), params.clone());
        cache
            .put_response("q", "u1", CachedResponse {
                response: "a".into(),
                sufficiency_score: 0.9,
                intent: Intent::GeneralHelp,
                context_ids: vec![],
            })
            .await;
        params
            .apply("test", |p| p.cache_ttl_multipliers.response = 2.0)
            .await;
        tokio::time::advance(Duration::from_secs(400)).await;
        assert!(cache.get_response("q", "u1").await.is_some());
        tokio::time::advance(Duration::from_secs(201)).await;
        assert!(cache.get_response("q", "u1").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_user_keeps_embeddings() {
        let cache = cache();
        let n = needs("q", Intent::GeneralHelp, &[]);
        cache.put_analysis(&n).await;
        cache.put_context(&n, &context(1)).await;
        cache
            .put_response("q", "u1", CachedResponse {
                response: "a".into(),
                sufficiency_score: 0.9,
                intent: Intent::GeneralHelp,
                context_ids: vec![],
            })
            .await;
        cache.put_embedding("q", vec![0.1, 0.2]).await;

        assert_eq!(cache.invalidate_user("u1").await, 3);
        assert!(cache.get_analysis("q", "u1").await.is_none());
        assert!(cache.get_response("q", "u1").await.is_none());
        assert_eq!(cache.get_embedding("q").await, Some(vec![0.1, 0.2]));
    }

    #[tokio::test]
    async fn stats_count_hits_and_misses() {
        let cache = cache();
        assert!(cache.get_embedding("x").await.is_none());
        cache.put_embedding("x", vec![1.0]).await;
        assert!(cache.get_embedding("X ").await.is_some());
        let stats = cache.stats().await;
        assert_eq!(stats.embedding.hits, 1);
        assert_eq!(stats.embedding.misses, 1);
        assert_eq!(stats.embedding.entries, 1);
    }
}
