// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end turn testing.
//!
//! `TestHarness` assembles a full engine over in-memory stores seeded from
//! fixtures, a hashing embedder and scripted collaborators, and exposes
//! `ask()` to drive complete turns.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sift_agent::{Adapters, Engine, TurnOutcome, TurnRequest};
use sift_config::model::{SiftConfig, StorageConfig};
use sift_core::context::ActionStatus;
use sift_core::error::SiftError;
use sift_core::records::{ActionRecord, ContentDocument, EventRecord};
use sift_core::traits::{EventStore, LlmAdapter, SessionStore};
use sift_core::types::{AdapterType, Platform};
use sift_storage::{
    Fixtures, HashingEmbedder, InMemoryActionStore, InMemoryEventStore, InMemorySessionStore,
    InMemoryVectorStore, SqliteSessionStore,
};
use sift_sufficiency::ContextEvaluator;

use crate::failing::FailingStore;
use crate::mock_generation::MockGenerator;
use crate::mock_llm::MockLlm;

/// User every harness turn runs as unless told otherwise.
pub const TEST_USER: &str = "test-user";

/// Builder for configuring a test engine.
pub struct TestHarnessBuilder {
    config: SiftConfig,
    llm: Option<Arc<MockLlm>>,
    evaluator: Option<Arc<dyn ContextEvaluator>>,
    generator: MockGenerator,
    fixtures: Fixtures,
    sqlite_sessions: bool,
    failing_events: bool,
    failing_sessions: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SiftConfig::default();
        config.learning.enabled = false;
        Self {
            config,
            llm: None,
            evaluator: None,
            generator: MockGenerator::new(),
            fixtures: Fixtures::default(),
            sqlite_sessions: false,
            failing_events: false,
            failing_sessions: false,
        }
    }

    /// Adjust the configuration. Learning starts disabled.
    pub fn configure(mut self, f: impl FnOnce(&mut SiftConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_llm(mut self, llm: Arc<MockLlm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ContextEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_generator(mut self, generator: MockGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// Log turns to a SQLite database in a temp directory.
    pub fn with_sqlite_sessions(mut self) -> Self {
        self.sqlite_sessions = true;
        self
    }

    pub fn with_failing_events(mut self) -> Self {
        self.failing_events = true;
        self
    }

    pub fn with_failing_sessions(mut self) -> Self {
        self.failing_sessions = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, SiftError> {
        let embedder = Arc::new(HashingEmbedder::default());
        let vectors = Arc::new(InMemoryVectorStore::new(embedder.clone()));
        let events = Arc::new(InMemoryEventStore::new());
        let actions = Arc::new(InMemoryActionStore::new());
        self.fixtures.seed(&vectors, &events, &actions).await?;

        let mut temp_dir = None;
        let sessions: Arc<dyn SessionStore> = if self.failing_sessions {
            Arc::new(FailingStore::new(AdapterType::SessionStore))
        } else if self.sqlite_sessions {
            let dir = tempfile::TempDir::new().map_err(SiftError::storage)?;
            let config = StorageConfig {
                database_path: dir.path().join("turns.db").to_string_lossy().to_string(),
                wal_mode: true,
            };
            let store = SqliteSessionStore::open(&config).await?;
            temp_dir = Some(dir);
            Arc::new(store)
        } else {
            Arc::new(InMemorySessionStore::new())
        };

        let event_source: Arc<dyn EventStore> = if self.failing_events {
            Arc::new(FailingStore::new(AdapterType::EventStore))
        } else {
            events.clone()
        };

        let generator = Arc::new(self.generator);
        let adapters = Adapters {
            llm: self.llm.clone().map(|l| l as Arc<dyn LlmAdapter>),
            generation: generator.clone(),
            embedder,
            vector: vectors.clone(),
            events: event_source,
            actions: actions.clone(),
            sessions: sessions.clone(),
            evaluator: self.evaluator,
        };
        let engine = Engine::start(&self.config, adapters);

        Ok(TestHarness {
            engine,
            llm: self.llm,
            generator,
            vectors,
            events,
            actions,
            sessions,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A running engine plus handles on every collaborator for assertions.
pub struct TestHarness {
    pub engine: Engine,
    pub llm: Option<Arc<MockLlm>>,
    pub generator: Arc<MockGenerator>,
    pub vectors: Arc<InMemoryVectorStore>,
    pub events: Arc<InMemoryEventStore>,
    pub actions: Arc<InMemoryActionStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: SiftConfig,
    /// Kept alive so the SQLite file outlives the harness.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run one turn as [`TEST_USER`].
    pub async fn ask(&self, session_id: &str, query: &str) -> TurnOutcome {
        self.ask_as(session_id, TEST_USER, query).await
    }

    pub async fn ask_as(&self, session_id: &str, user_id: &str, query: &str) -> TurnOutcome {
        self.engine
            .handle_turn(TurnRequest::new(session_id, user_id, query))
            .await
    }
}

/// A content document for [`TEST_USER`] written `hours_ago`.
pub fn document(id: &str, content: &str, platform: Platform, hours_ago: i64) -> ContentDocument {
    ContentDocument {
        id: id.to_string(),
        user_id: TEST_USER.to_string(),
        content: content.to_string(),
        title: None,
        platform: Some(platform),
        timestamp: Utc::now() - Duration::hours(hours_ago),
    }
}

pub fn event(id: &str, summary: &str, platform: Platform, hours_ago: i64) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        user_id: TEST_USER.to_string(),
        platform,
        event_type: "activity".to_string(),
        actor: None,
        summary: summary.to_string(),
        timestamp: Utc::now() - Duration::hours(hours_ago),
    }
}

pub fn action(id: &str, description: &str, status: ActionStatus, hours_ago: i64) -> ActionRecord {
    ActionRecord {
        id: id.to_string(),
        user_id: TEST_USER.to_string(),
        action_type: "follow_up".to_string(),
        description: description.to_string(),
        status,
        confidence: 0.9,
        timestamp: Utc::now() - Duration::hours(hours_ago),
    }
}
