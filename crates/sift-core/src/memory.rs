// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation turns and the compressed session memory that supersedes them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Entity, Intent, Platform};

/// One completed question/answer exchange in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Zero-based position in the session.
    pub turn_index: u64,
    pub query: String,
    pub response: String,
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub platforms: BTreeSet<Platform>,
    /// Ids of the retrieved items the answer was generated from.
    pub context_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub sufficiency_score: f64,
    pub references_previous_turn: bool,
    pub errored: bool,
}

/// Summary of the user's interests produced by the `summarize` collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub summary: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub preferred_platforms: Vec<String>,
    /// Set when the profile could not be produced.
    #[serde(default)]
    pub error: Option<String>,
}

impl UserProfile {
    /// Minimal profile returned when summarization fails.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            summary: String::new(),
            interests: Vec::new(),
            preferred_platforms: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

/// A turn judged important enough to survive compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub turn_index: u64,
    pub query: String,
    /// First part of the response.
    pub response_excerpt: String,
    pub intent: Intent,
    pub entity_keys: BTreeSet<String>,
    pub importance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Where an entity was mentioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub turn_index: u64,
    pub snippet: String,
}

/// Tracking record for one entity across the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub key: String,
    pub mention_count: u64,
    pub first_turn: u64,
    pub last_turn: u64,
    pub mentions: Vec<EntityMention>,
    pub co_occurring: BTreeSet<String>,
}

/// Change of intent between consecutive turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentTransition {
    pub turn_index: u64,
    pub from: Intent,
    pub to: Intent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    /// How often each entity appears.
    pub affinity: BTreeMap<String, u64>,
    /// Pairwise co-occurrence counts, stored for both orderings.
    pub co_occurrence: BTreeMap<String, BTreeMap<String, u64>>,
    pub intent_transitions: Vec<IntentTransition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationPatterns {
    pub intent_histogram: BTreeMap<Intent, u64>,
    /// Turn counts by UTC hour of day (0-23).
    pub hour_histogram: BTreeMap<u32, u64>,
    pub platform_histogram: BTreeMap<Platform, u64>,
    pub follow_up_count: u64,
    pub turn_count: u64,
    /// follow-ups / (turn_count - 1); 0 for single-turn histories.
    pub follow_up_rate: f64,
}

/// Lossy summary of a long session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedMemory {
    pub user_profile: UserProfile,
    pub key_events: Vec<KeyEvent>,
    pub entity_tracking: BTreeMap<String, EntityRecord>,
    pub relationships: RelationshipGraph,
    pub patterns: ConversationPatterns,
    /// The last raw turns kept verbatim.
    pub recent_context: Vec<ConversationTurn>,
    pub compression_count: u32,
    /// Highest turn index folded into this memory.
    pub last_turn_index: u64,
    pub compressed_at: DateTime<Utc>,
}

/// The ephemeral per-session state held in the session store's blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Raw turns not yet folded into compressed memory.
    pub turns: Vec<ConversationTurn>,
    pub compressed: Option<CompressedMemory>,
    pub next_turn_index: u64,
}

impl SessionSnapshot {
    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}

/// Memory relevant to one new query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelevantMemory {
    pub profile: Option<UserProfile>,
    pub key_events: Vec<KeyEvent>,
    pub entities: Vec<EntityRecord>,
    pub recent_turns: Vec<ConversationTurn>,
}

impl RelevantMemory {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none()
            && self.key_events.is_empty()
            && self.entities.is_empty()
            && self.recent_turns.is_empty()
    }
}
