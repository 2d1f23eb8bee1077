// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the analyzer, retriever, evaluator and orchestrator.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Llm,
    Generation,
    Embedding,
    VectorStore,
    EventStore,
    ActionStore,
    SessionStore,
}

/// What the user is trying to accomplish with a query.
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
pub enum Intent {
    QueryActions,
    QueryEvents,
    GetContext,
    ExplainAction,
    GeneralHelp,
    TimelineQuery,
    SearchContent,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 7] = [
        Intent::QueryActions,
        Intent::QueryEvents,
        Intent::GetContext,
        Intent::ExplainAction,
        Intent::GeneralHelp,
        Intent::TimelineQuery,
        Intent::SearchContent,
    ];

    /// The context categories a query with this intent needs.
    pub fn required_context(&self) -> Vec<ContextKind> {
        match self {
            Intent::QueryActions => vec![ContextKind::Actions, ContextKind::Content],
            Intent::ExplainAction => vec![
                ContextKind::Actions,
                ContextKind::Events,
                ContextKind::Content,
            ],
            Intent::QueryEvents | Intent::TimelineQuery => {
                vec![ContextKind::Events, ContextKind::Content]
            }
            Intent::GetContext => vec![
                ContextKind::Content,
                ContextKind::Events,
                ContextKind::Actions,
            ],
            Intent::SearchContent | Intent::GeneralHelp => vec![ContextKind::Content],
        }
    }
}

/// Coarse query complexity used to decide on LLM augmentation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Upstream platforms whose data is indexed.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Slack,
    Github,
    Notion,
}

/// Kind of context a query needs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Content,
    Events,
    Actions,
}

/// Retrieval strategies suggested by the analyzer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    Hybrid,
    TemporalFocused,
    CrossPlatformCorrelation,
    ActionContextRetrieval,
    MultiStageExpansion,
}

/// How an entity was recognized.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A quoted string.
    Quoted,
    /// A capitalized word that does not start a sentence.
    Name,
    /// An `@mention`.
    Mention,
    /// Any type reported by the LLM analysis that has no dedicated variant.
    #[serde(other)]
    Other,
}

/// An entity mentioned in a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
    /// Recognition confidence (0.0-1.0).
    pub confidence: f64,
}

impl EntityKind {
    /// Parse a kind label, mapping anything unrecognized to [`EntityKind::Other`].
    pub fn parse_lenient(label: &str) -> Self {
        label.trim().to_lowercase().parse().unwrap_or(EntityKind::Other)
    }
}

impl Entity {
    pub fn new(kind: EntityKind, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Lowercase `"kind:value"` key used by memory tracking and cache matching.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.value).to_lowercase()
    }

    /// Case-insensitive substring match against arbitrary text.
    pub fn matches_text(&self, text: &str) -> bool {
        let needle = self.value.trim().to_lowercase();
        !needle.is_empty() && text.to_lowercase().contains(&needle)
    }
}

/// A resolved time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The expression the range was parsed from ("yesterday", "last 3 days", ...).
    pub expression: String,
    /// Cumulative widening applied since parsing; 1.0 for a parsed range.
    #[serde(default = "unwidened")]
    pub widened: f64,
}

fn unwidened() -> f64 {
    1.0
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, expression: impl Into<String>) -> Self {
        Self {
            start,
            end,
            expression: expression.into(),
            widened: 1.0,
        }
    }

    /// Whether `ts` lies inside the window (inclusive on both ends).
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Widen the window so it spans `factor` times its current length.
    ///
    /// The start moves back by the extra length; the end is pulled forward to
    /// `now` when the window closed in the past.
    pub fn widen(&self, factor: f64, now: DateTime<Utc>) -> TimeRange {
        let span = self.duration().num_seconds().max(3600) as f64;
        let extra = Duration::seconds((span * (factor - 1.0).max(0.0)) as i64);
        TimeRange {
            start: self.start - extra,
            end: self.end.max(now),
            expression: self.expression.clone(),
            widened: self.widened * factor.max(1.0),
        }
    }
}

/// The analyzer's structured interpretation of a user query.
///
/// Created once per turn and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformationNeeds {
    pub query: String,
    pub user_id: String,
    pub intent: Intent,
    /// Confidence in the intent (0.0-1.0).
    pub intent_confidence: f64,
    pub entities: Vec<Entity>,
    pub time_reference: Option<TimeRange>,
    pub platforms: BTreeSet<Platform>,
    pub complexity: Complexity,
    pub required_context: Vec<ContextKind>,
    /// The query refers back to the previous turn.
    pub references_previous_turn: bool,
    pub strategies: Vec<RetrievalStrategy>,
}

impl InformationNeeds {
    /// Lowercase entity keys for set comparisons.
    pub fn entity_keys(&self) -> BTreeSet<String> {
        self.entities.iter().map(Entity::key).collect()
    }

    /// Whether the query asks about very recent data (a window of an hour or less).
    pub fn is_realtime(&self) -> bool {
        self.time_reference
            .as_ref()
            .is_some_and(|t| t.duration() <= Duration::hours(1))
    }
}

/// User feedback about a completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub session_id: String,
    /// How relevant the answer was (0.0-1.0).
    pub relevance_score: f64,
    /// How complete the answer was (0.0-1.0).
    pub completeness_score: f64,
    pub helpful: bool,
}
