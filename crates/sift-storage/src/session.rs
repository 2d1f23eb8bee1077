// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session stores: a durable SQLite turn log and an in-memory variant, both
//! holding the TTL'd session snapshot in process.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rusqlite::params;
use sift_config::model::StorageConfig;
use sift_core::error::SiftError;
use sift_core::memory::{ConversationTurn, SessionSnapshot};
use sift_core::traits::{PluginAdapter, SessionStore};
use sift_core::types::{AdapterType, HealthStatus};
use tokio::time::Instant;
use tracing::debug;

use crate::database::{Database, map_tr_err};

/// Session snapshots that expire a fixed time after their last write.
#[derive(Default)]
pub struct SnapshotMap {
    entries: DashMap<String, (SessionSnapshot, Instant)>,
}

impl SnapshotMap {
    pub fn put(&self, session_id: &str, snapshot: &SessionSnapshot, ttl: Duration) {
        self.entries.insert(
            session_id.to_string(),
            (snapshot.clone(), Instant::now() + ttl),
        );
    }

    /// The live snapshot; an expired one is removed.
    pub fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        let now = Instant::now();
        let live = self
            .entries
            .get(session_id)
            .map(|e| (e.1 > now).then(|| e.0.clone()));
        match live {
            Some(Some(snapshot)) => Some(snapshot),
            Some(None) => {
                self.entries.remove(session_id);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SQLite-backed turn log with in-process snapshots.
pub struct SqliteSessionStore {
    db: Database,
    snapshots: SnapshotMap,
}

impl SqliteSessionStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, SiftError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self::with_database(db))
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            db,
            snapshots: SnapshotMap::default(),
        }
    }
}

#[async_trait]
impl PluginAdapter for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SessionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        self.db.checkpoint().await?;
        debug!("turn log checkpointed");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn append_turn(
        &self,
        session_id: &str,
        turn: &ConversationTurn,
    ) -> Result<(), SiftError> {
        let payload = serde_json::to_string(turn).map_err(SiftError::storage)?;
        let session_id = session_id.to_string();
        let turn_index = turn.turn_index as i64;
        let intent = turn.intent.to_string();
        let query = turn.query.clone();
        let errored = turn.errored;
        let created_at = turn.timestamp.to_rfc3339();

        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO turns (session_id, turn_index, intent, query, payload, errored, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![session_id, turn_index, intent, query, payload, errored, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SiftError> {
        let session_id = session_id.to_string();
        let payloads = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT payload FROM turns WHERE session_id = ?1 ORDER BY turn_index ASC",
                )?;
                let rows = stmt
                    .query_map(params![session_id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(SiftError::storage))
            .collect()
    }

    async fn put_snapshot(
        &self,
        session_id: &str,
        snapshot: &SessionSnapshot,
        ttl: Duration,
    ) -> Result<(), SiftError> {
        self.snapshots.put(session_id, snapshot, ttl);
        Ok(())
    }

    async fn get_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>, SiftError> {
        Ok(self.snapshots.get(session_id))
    }
}

/// Process-local session store for the shell and tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    turns: DashMap<String, Vec<ConversationTurn>>,
    snapshots: SnapshotMap,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SessionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_turn(
        &self,
        session_id: &str,
        turn: &ConversationTurn,
    ) -> Result<(), SiftError> {
        self.turns
            .entry(session_id.to_string())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SiftError> {
        Ok(self
            .turns
            .get(session_id)
            .map(|t| t.clone())
            .unwrap_or_default())
    }

    async fn put_snapshot(
        &self,
        session_id: &str,
        snapshot: &SessionSnapshot,
        ttl: Duration,
    ) -> Result<(), SiftError> {
        self.snapshots.put(session_id, snapshot, ttl);
        Ok(())
    }

    async fn get_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>, SiftError> {
        Ok(self.snapshots.get(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sift_core::types::Intent;
    use tempfile::tempdir;

    fn turn(index: u64) -> ConversationTurn {
        ConversationTurn {
            turn_index: index,
            query: format!("question {index}"),
            response: format!("answer {index}"),
            intent: Intent::SearchContent,
            entities: vec![],
            platforms: Default::default(),
            context_ids: vec![format!("doc-{index}")],
            timestamp: Utc.with_ymd_and_hms(2026, 3, 10, 9, index as u32, 0).unwrap(),
            sufficiency_score: 0.8,
            references_previous_turn: false,
            errored: index == 1,
        }
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            turns: vec![turn(0)],
            compressed: None,
            next_turn_index: 1,
        }
    }

    #[tokio::test]
    async fn turn_log_round_trips_in_order() {
        let store = SqliteSessionStore::with_database(Database::open_in_memory().await.unwrap());
        store.append_turn("s1", &turn(1)).await.unwrap();
        store.append_turn("s1", &turn(0)).await.unwrap();
        store.append_turn("s2", &turn(0)).await.unwrap();

        let turns = store.load_turns("s1").await.unwrap();
        assert_eq!(turns, vec![turn(0), turn(1)]);
        assert!(store.load_turns("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_turn_index_is_rejected() {
        let store = SqliteSessionStore::with_database(Database::open_in_memory().await.unwrap());
        store.append_turn("s1", &turn(0)).await.unwrap();
        let err = store.append_turn("s1", &turn(0)).await.unwrap_err();
        assert!(matches!(err, SiftError::Storage { .. }));
    }

    #[tokio::test]
    async fn turn_log_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sift.db");
        let config = StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        };

        let store = SqliteSessionStore::open(&config).await.unwrap();
        store.append_turn("s1", &turn(0)).await.unwrap();
        store.shutdown().await.unwrap();
        drop(store);

        let reopened = SqliteSessionStore::open(&config).await.unwrap();
        assert_eq!(reopened.load_turns("s1").await.unwrap().len(), 1);
        assert!(matches!(
            reopened.health_check().await.unwrap(),
            HealthStatus::Healthy
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_expires_after_ttl() {
        let store = InMemorySessionStore::new();
        let ttl = Duration::from_secs(60);
        store.put_snapshot("s1", &snapshot(), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get_snapshot("s1").await.unwrap(), Some(snapshot()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get_snapshot("s1").await.unwrap(), None);
        assert!(store.snapshots.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_a_snapshot_refreshes_its_ttl() {
        let map = SnapshotMap::default();
        let ttl = Duration::from_secs(60);
        map.put("s1", &snapshot(), ttl);
        tokio::time::advance(Duration::from_secs(45)).await;
        map.put("s1", &snapshot(), ttl);
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(map.get("s1").is_some());
    }

    #[tokio::test]
    async fn in_memory_turn_log_appends() {
        let store = InMemorySessionStore::new();
        store.append_turn("s1", &turn(0)).await.unwrap();
        store.append_turn("s1", &turn(1)).await.unwrap();
        assert_eq!(store.load_turns("s1").await.unwrap().len(), 2);
    }
}
