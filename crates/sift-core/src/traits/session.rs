// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session persistence: a durable turn log plus an expiring snapshot.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SiftError;
use crate::memory::{ConversationTurn, SessionSnapshot};
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait SessionStore: PluginAdapter {
    /// Durably append a completed turn to the session's log.
    async fn append_turn(&self, session_id: &str, turn: &ConversationTurn)
    -> Result<(), SiftError>;

    /// All logged turns for a session, oldest first.
    async fn load_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SiftError>;

    /// Store the session snapshot, replacing any previous one and resetting its TTL.
    async fn put_snapshot(
        &self,
        session_id: &str,
        snapshot: &SessionSnapshot,
        ttl: Duration,
    ) -> Result<(), SiftError>;

    /// The live snapshot, or `None` if absent or expired.
    async fn get_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>, SiftError>;
}
