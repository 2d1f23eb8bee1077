// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records returned by the external data stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ActionStatus;
use crate::types::{Entity, Platform};

/// An indexed piece of content (message, issue, page) owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub timestamp: DateTime<Utc>,
}

/// A vector search hit with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f64,
    pub payload: ContentDocument,
}

/// A structured platform event (commit, deployment, message edit, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub event_type: String,
    #[serde(default)]
    pub actor: Option<String>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Case-insensitive match against the summary, event type and actor.
    pub fn mentions(&self, entity: &Entity) -> bool {
        entity.matches_text(&self.summary)
            || entity.matches_text(&self.event_type)
            || self.actor.as_deref().is_some_and(|a| entity.matches_text(a))
    }
}

/// An action item extracted from upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub user_id: String,
    pub action_type: String,
    pub description: String,
    pub status: ActionStatus,
    /// Extraction confidence (0.0-1.0).
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}
