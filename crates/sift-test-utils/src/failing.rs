// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A collaborator whose every data call fails.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sift_core::context::RetrievalFilters;
use sift_core::error::SiftError;
use sift_core::memory::{ConversationTurn, SessionSnapshot};
use sift_core::records::{ActionRecord, EventRecord, VectorHit};
use sift_core::traits::{ActionStore, EventStore, PluginAdapter, SessionStore, VectorStore};
use sift_core::types::{AdapterType, Entity, HealthStatus, Platform, TimeRange};

/// Stands in for any store; every read and write returns a storage error.
pub struct FailingStore {
    kind: AdapterType,
}

impl FailingStore {
    pub fn new(kind: AdapterType) -> Self {
        Self { kind }
    }

    fn fail<T>(&self) -> Result<T, SiftError> {
        Err(SiftError::storage(format!("{} unavailable", self.kind)))
    }
}

#[async_trait]
impl PluginAdapter for FailingStore {
    fn name(&self) -> &str {
        "failing-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        self.kind
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        Ok(HealthStatus::Unhealthy(format!("{} unavailable", self.kind)))
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    async fn search(
        &self,
        _vector: &[f32],
        _filters: &RetrievalFilters,
        _limit: usize,
    ) -> Result<Vec<VectorHit>, SiftError> {
        self.fail()
    }
}

#[async_trait]
impl EventStore for FailingStore {
    async fn events(
        &self,
        _user_id: &str,
        _time_range: Option<&TimeRange>,
        _platforms: &BTreeSet<Platform>,
        _entities: &[Entity],
        _limit: usize,
    ) -> Result<Vec<EventRecord>, SiftError> {
        self.fail()
    }
}

#[async_trait]
impl ActionStore for FailingStore {
    async fn pending(&self, _user_id: &str, _limit: usize) -> Result<Vec<ActionRecord>, SiftError> {
        self.fail()
    }

    async fn completed(
        &self,
        _user_id: &str,
        _since: Option<DateTime<Utc>>,
        _limit: usize,
    ) -> Result<Vec<ActionRecord>, SiftError> {
        self.fail()
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn append_turn(
        &self,
        _session_id: &str,
        _turn: &ConversationTurn,
    ) -> Result<(), SiftError> {
        self.fail()
    }

    async fn load_turns(&self, _session_id: &str) -> Result<Vec<ConversationTurn>, SiftError> {
        self.fail()
    }

    async fn put_snapshot(
        &self,
        _session_id: &str,
        _snapshot: &SessionSnapshot,
        _ttl: Duration,
    ) -> Result<(), SiftError> {
        self.fail()
    }

    async fn get_snapshot(&self, _session_id: &str) -> Result<Option<SessionSnapshot>, SiftError> {
        self.fail()
    }
}
