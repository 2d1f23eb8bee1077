// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval results and the fused context handed to evaluation and generation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{Entity, Platform, TimeRange};

/// Maximum content results kept per fused context.
pub const MAX_CONTENT_RESULTS: usize = 5;
/// Maximum event results kept per fused context.
pub const MAX_EVENT_RESULTS: usize = 10;
/// Maximum action results kept per fused context.
pub const MAX_ACTION_RESULTS: usize = 5;

/// The retrieval channel a result came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Vector,
    Event,
    Action,
}

/// Lifecycle state of an action item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Completed,
}

/// Typed per-source detail attached to a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceDetail {
    #[serde(rename = "vector")]
    Content {
        platform: Option<Platform>,
        title: Option<String>,
        user_id: String,
    },
    Event {
        platform: Platform,
        event_type: String,
        actor: Option<String>,
    },
    Action {
        status: ActionStatus,
        action_type: String,
        confidence: f64,
    },
}

impl SourceDetail {
    pub fn source(&self) -> ResultSource {
        match self {
            SourceDetail::Content { .. } => ResultSource::Vector,
            SourceDetail::Event { .. } => ResultSource::Event,
            SourceDetail::Action { .. } => ResultSource::Action,
        }
    }

    /// Platform the result originated on, when known.
    pub fn platform(&self) -> Option<Platform> {
        match self {
            SourceDetail::Content { platform, .. } => *platform,
            SourceDetail::Event { platform, .. } => Some(*platform),
            SourceDetail::Action { .. } => None,
        }
    }

    /// Free-text fields searched when matching entities.
    fn searchable_text(&self) -> String {
        match self {
            SourceDetail::Content { title, user_id, .. } => {
                format!("{} {user_id}", title.as_deref().unwrap_or_default())
            }
            SourceDetail::Event {
                event_type, actor, ..
            } => format!("{event_type} {}", actor.as_deref().unwrap_or_default()),
            SourceDetail::Action { action_type, .. } => action_type.clone(),
        }
    }
}

/// A single retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub detail: SourceDetail,
}

impl SearchResult {
    pub fn source(&self) -> ResultSource {
        self.detail.source()
    }

    /// Case-insensitive match of `entity` against the content and detail fields.
    pub fn mentions(&self, entity: &Entity) -> bool {
        entity.matches_text(&self.content) || entity.matches_text(&self.detail.searchable_text())
    }
}

/// Filters applied by one retrieval round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFilters {
    pub user_id: String,
    pub time_range: Option<TimeRange>,
    /// Empty means every platform.
    pub platforms: BTreeSet<Platform>,
    /// Empty means no entity filter on the event channel.
    pub entities: Vec<Entity>,
    pub vector_top_k: usize,
    pub event_limit: usize,
    pub action_limit: usize,
}

/// How the three channel lists are merged into one ordering.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    #[default]
    Weighted,
    Rrf,
}

/// Where a fused context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Retrieval round that produced this context (1 = initial retrieval).
    pub attempt: u32,
    pub filters: RetrievalFilters,
    pub fusion_mode: FusionMode,
    pub failed_sources: Vec<ResultSource>,
    pub from_cache: bool,
}

/// One result's position in the unified cross-channel ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEntry {
    pub source: ResultSource,
    pub id: String,
    pub fused_score: f64,
}

/// The bounded per-channel result lists of one retrieval round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedContext {
    pub content: Vec<SearchResult>,
    pub events: Vec<SearchResult>,
    pub actions: Vec<SearchResult>,
    /// Unified ordering across all channels, highest first.
    pub ranking: Vec<FusedEntry>,
    pub provenance: Provenance,
}

impl FusedContext {
    pub fn empty(provenance: Provenance) -> Self {
        Self {
            content: Vec::new(),
            events: Vec::new(),
            actions: Vec::new(),
            ranking: Vec::new(),
            provenance,
        }
    }

    pub fn total_results(&self) -> usize {
        self.content.len() + self.events.len() + self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_results() == 0
    }

    /// Every result across all channels, content first.
    pub fn all_results(&self) -> impl Iterator<Item = &SearchResult> {
        self.content
            .iter()
            .chain(self.events.iter())
            .chain(self.actions.iter())
    }

    /// Results in unified fused order.
    pub fn ranked_results(&self) -> Vec<&SearchResult> {
        self.ranking
            .iter()
            .filter_map(|entry| {
                let list = match entry.source {
                    ResultSource::Vector => &self.content,
                    ResultSource::Event => &self.events,
                    ResultSource::Action => &self.actions,
                };
                list.iter().find(|r| r.id == entry.id)
            })
            .collect()
    }

    /// Ids of all results, used to record what a turn was answered from.
    pub fn result_ids(&self) -> Vec<String> {
        self.all_results().map(|r| r.id.clone()).collect()
    }
}
