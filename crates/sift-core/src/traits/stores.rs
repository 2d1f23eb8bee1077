// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only data sources queried by the hybrid retriever.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::context::RetrievalFilters;
use crate::error::SiftError;
use crate::records::{ActionRecord, EventRecord, VectorHit};
use crate::traits::adapter::PluginAdapter;
use crate::types::{Entity, Platform, TimeRange};

/// Similarity search over embedded content.
#[async_trait]
pub trait VectorStore: PluginAdapter {
    /// Top `limit` hits by similarity, restricted to the filter's user, time
    /// range and platform set. Entity filters are not applied here.
    async fn search(
        &self,
        vector: &[f32],
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>, SiftError>;
}

/// Per-user time-ordered event index.
#[async_trait]
pub trait EventStore: PluginAdapter {
    /// Newest-first events for `user_id`, at most `limit` of them.
    ///
    /// An empty platform set means all platforms. With `entities` non-empty
    /// only events mentioning at least one of them count toward the limit.
    async fn events(
        &self,
        user_id: &str,
        time_range: Option<&TimeRange>,
        platforms: &BTreeSet<Platform>,
        entities: &[Entity],
        limit: usize,
    ) -> Result<Vec<EventRecord>, SiftError>;
}

/// Per-user pending and completed action items.
#[async_trait]
pub trait ActionStore: PluginAdapter {
    async fn pending(&self, user_id: &str, limit: usize) -> Result<Vec<ActionRecord>, SiftError>;

    /// Completed actions newer than `since` (all when `None`), newest first.
    async fn completed(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActionRecord>, SiftError>;
}
