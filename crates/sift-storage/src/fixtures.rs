// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON fixture files that seed the in-memory stores.
//!
//! ```json
//! { "content": [...], "events": [...], "actions": [...] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sift_core::error::SiftError;
use sift_core::records::{ActionRecord, ContentDocument, EventRecord};
use tracing::info;

use crate::memory::{InMemoryActionStore, InMemoryEventStore, InMemoryVectorStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub content: Vec<ContentDocument>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

impl Fixtures {
    pub async fn load(path: &Path) -> Result<Self, SiftError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(SiftError::storage)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, SiftError> {
        serde_json::from_str(raw).map_err(SiftError::storage)
    }

    /// Insert every record into its store.
    pub async fn seed(
        self,
        vectors: &InMemoryVectorStore,
        events: &InMemoryEventStore,
        actions: &InMemoryActionStore,
    ) -> Result<(), SiftError> {
        let counts = (self.content.len(), self.events.len(), self.actions.len());
        for document in self.content {
            vectors.insert(document).await?;
        }
        self.events.into_iter().for_each(|e| events.insert(e));
        self.actions.into_iter().for_each(|a| actions.insert(a));
        info!(
            content = counts.0,
            events = counts.1,
            actions = counts.2,
            "fixtures seeded"
        );
        Ok(())
    }
}
