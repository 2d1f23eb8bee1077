// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory content, event and action stores.
//!
//! Records are partitioned by user. The vector store embeds documents on
//! insert with the embedder it was built with, so queries must use the same
//! embedder to be comparable.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sift_core::context::{ActionStatus, RetrievalFilters};
use sift_core::error::SiftError;
use sift_core::records::{ActionRecord, ContentDocument, EventRecord, VectorHit};
use sift_core::traits::{ActionStore, EmbeddingAdapter, EventStore, PluginAdapter, VectorStore};
use sift_core::types::{AdapterType, Entity, HealthStatus, Platform, TimeRange};
use tracing::debug;

use crate::embedder::cosine_similarity;

macro_rules! memory_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, SiftError> {
                Ok(HealthStatus::Healthy)
            }

            async fn shutdown(&self) -> Result<(), SiftError> {
                Ok(())
            }
        }
    };
}

fn in_platforms(platforms: &BTreeSet<Platform>, platform: Option<Platform>) -> bool {
    platforms.is_empty() || platform.is_some_and(|p| platforms.contains(&p))
}

fn in_range(range: Option<&TimeRange>, ts: &DateTime<Utc>) -> bool {
    range.is_none_or(|r| r.contains(ts))
}

struct IndexedDocument {
    document: ContentDocument,
    vector: Vec<f32>,
}

pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingAdapter>,
    documents: DashMap<String, Vec<IndexedDocument>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            embedder,
            documents: DashMap::new(),
        }
    }

    /// Embed and index a document, replacing any with the same id.
    pub async fn insert(&self, document: ContentDocument) -> Result<(), SiftError> {
        let text = match &document.title {
            Some(title) => format!("{title}\n{}", document.content),
            None => document.content.clone(),
        };
        let vector = self.embedder.embed(&text).await?;
        let mut docs = self.documents.entry(document.user_id.clone()).or_default();
        docs.retain(|d| d.document.id != document.id);
        docs.push(IndexedDocument { document, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

memory_adapter!(InMemoryVectorStore, "memory-vector", AdapterType::VectorStore);

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        vector: &[f32],
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>, SiftError> {
        let Some(docs) = self.documents.get(&filters.user_id) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<VectorHit> = docs
            .iter()
            .filter(|d| in_range(filters.time_range.as_ref(), &d.document.timestamp))
            .filter(|d| in_platforms(&filters.platforms, d.document.platform))
            .map(|d| VectorHit {
                id: d.document.id.clone(),
                score: cosine_similarity(vector, &d.vector),
                payload: d.document.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        debug!(user_id = %filters.user_id, hits = hits.len(), "vector search");
        Ok(hits)
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    events: DashMap<String, Vec<EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: EventRecord) {
        self.events
            .entry(event.user_id.clone())
            .or_default()
            .push(event);
    }
}

memory_adapter!(InMemoryEventStore, "memory-events", AdapterType::EventStore);

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn events(
        &self,
        user_id: &str,
        time_range: Option<&TimeRange>,
        platforms: &BTreeSet<Platform>,
        entities: &[Entity],
        limit: usize,
    ) -> Result<Vec<EventRecord>, SiftError> {
        let Some(events) = self.events.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut matching: Vec<EventRecord> = events
            .iter()
            .filter(|e| in_range(time_range, &e.timestamp))
            .filter(|e| in_platforms(platforms, Some(e.platform)))
            .filter(|e| entities.is_empty() || entities.iter().any(|x| e.mentions(x)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryActionStore {
    actions: DashMap<String, Vec<ActionRecord>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, action: ActionRecord) {
        self.actions
            .entry(action.user_id.clone())
            .or_default()
            .push(action);
    }

    fn select(
        &self,
        user_id: &str,
        limit: usize,
        keep: impl Fn(&ActionRecord) -> bool,
    ) -> Vec<ActionRecord> {
        let Some(actions) = self.actions.get(user_id) else {
            return Vec::new();
        };
        let mut selected: Vec<ActionRecord> =
            actions.iter().filter(|a| keep(a)).cloned().collect();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        selected.truncate(limit);
        selected
    }
}

memory_adapter!(InMemoryActionStore, "memory-actions", AdapterType::ActionStore);

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn pending(&self, user_id: &str, limit: usize) -> Result<Vec<ActionRecord>, SiftError> {
        Ok(self.select(user_id, limit, |a| a.status == ActionStatus::Pending))
    }

    async fn completed(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActionRecord>, SiftError> {
        Ok(self.select(user_id, limit, |a| {
            a.status == ActionStatus::Completed && since.is_none_or(|s| a.timestamp >= s)
        }))
    }
}
