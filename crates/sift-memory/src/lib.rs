// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compressive conversation memory for the Sift engine.
//!
//! Long sessions are folded into a [`CompressedMemory`]: an LLM-written user
//! profile, diversified key events, per-entity tracking, a relationship
//! graph and conversation patterns. Only the most recent raw turns survive
//! a compression. Profile failures never block compression.

pub mod key_events;
pub mod tracking;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sift_config::model::MemoryConfig;
use sift_core::error::SiftError;
use sift_core::memory::{
    CompressedMemory, ConversationPatterns, ConversationTurn, RelationshipGraph, RelevantMemory,
    SessionSnapshot, UserProfile,
};
use sift_core::traits::LlmAdapter;
use sift_core::types::InformationNeeds;
use tracing::{debug, info, warn};

/// Shape of the LLM `summarize` payload.
#[derive(Debug, Deserialize)]
struct ProfilePayload {
    summary: String,
    #[serde(default)]
    interests: Vec<String>,
    #[serde(default)]
    preferred_platforms: Vec<String>,
}

pub struct MemoryManager {
    config: MemoryConfig,
    llm: Option<Arc<dyn LlmAdapter>>,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig, llm: Option<Arc<dyn LlmAdapter>>) -> Self {
        Self { config, llm }
    }

    /// Whether the raw turns in `snapshot` have reached the compression threshold.
    pub fn should_compress(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.turns.len() >= self.config.compression_threshold
    }

    /// Compress `snapshot` in place when it is due. Returns whether it was compressed.
    pub async fn maybe_compress(&self, snapshot: &mut SessionSnapshot, now: DateTime<Utc>) -> bool {
        if !self.should_compress(snapshot) {
            return false;
        }

        let memory = self
            .compress(&snapshot.turns, snapshot.compressed.as_ref(), now)
            .await;
        let keep = self.config.max_recent_turns.min(snapshot.turns.len());
        snapshot.turns.drain(..snapshot.turns.len() - keep);
        info!(
            compression_count = memory.compression_count,
            key_events = memory.key_events.len(),
            entities = memory.entity_tracking.len(),
            kept_turns = snapshot.turns.len(),
            "session compressed"
        );
        snapshot.compressed = Some(memory);
        true
    }

    /// Fold `turns` into `previous` (or a fresh memory).
    ///
    /// Turns already covered by `previous` are skipped, so the recent turns
    /// kept raw after one compression are not counted twice by the next.
    pub async fn compress(
        &self,
        turns: &[ConversationTurn],
        previous: Option<&CompressedMemory>,
        now: DateTime<Utc>,
    ) -> CompressedMemory {
        let fresh: Vec<ConversationTurn> = turns
            .iter()
            .filter(|t| previous.is_none_or(|p| t.turn_index > p.last_turn_index))
            .cloned()
            .collect();

        let last_turn_index = fresh
            .iter()
            .map(|t| t.turn_index)
            .chain(previous.map(|p| p.last_turn_index))
            .max()
            .unwrap_or(0);
        let total_turns = last_turn_index + 1;

        let user_profile = self.profile(&fresh, previous.map(|p| &p.user_profile)).await;

        let mut candidates: Vec<_> = fresh
            .iter()
            .map(|t| key_events::key_event(t, total_turns))
            .collect();
        if let Some(p) = previous {
            candidates.extend(p.key_events.iter().cloned());
        }
        let key_events = key_events::select(
            candidates,
            self.config.key_event_candidates,
            self.config.max_key_events,
        );

        let mut entity_tracking = previous.map(|p| p.entity_tracking.clone()).unwrap_or_default();
        tracking::track_entities(&mut entity_tracking, &fresh);

        let mut relationships = previous
            .map(|p| p.relationships.clone())
            .unwrap_or_else(RelationshipGraph::default);
        let previous_intent = previous.and_then(|p| {
            p.recent_context
                .iter()
                .find(|t| t.turn_index == p.last_turn_index)
                .map(|t| t.intent)
        });
        tracking::track_relationships(&mut relationships, &fresh, previous_intent);

        let mut patterns = previous
            .map(|p| p.patterns.clone())
            .unwrap_or_else(ConversationPatterns::default);
        tracking::track_patterns(&mut patterns, &fresh);

        let keep = self.config.max_recent_turns.min(turns.len());
        let recent_context = turns[turns.len() - keep..].to_vec();

        CompressedMemory {
            user_profile,
            key_events,
            entity_tracking,
            relationships,
            patterns,
            recent_context,
            compression_count: previous.map_or(0, |p| p.compression_count) + 1,
            last_turn_index,
            compressed_at: now,
        }
    }

    /// Profile over the earliest turns of the batch, refining any previous summary.
    async fn profile(
        &self,
        turns: &[ConversationTurn],
        previous: Option<&UserProfile>,
    ) -> UserProfile {
        let sample = &turns[..self.config.profile_turns.min(turns.len())];
        let prior = previous
            .filter(|p| !p.summary.is_empty())
            .map(|p| p.summary.as_str());

        match self.summarize(sample, prior).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "user profiling failed, keeping minimal profile");
                UserProfile {
                    error: Some(e.to_string()),
                    ..previous.cloned().unwrap_or_default()
                }
            }
        }
    }

    async fn summarize(
        &self,
        turns: &[ConversationTurn],
        prior: Option<&str>,
    ) -> Result<UserProfile, SiftError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| SiftError::provider("no summarizer configured"))?;
        let raw = llm.summarize(turns, prior).await?;
        let payload: ProfilePayload = serde_json::from_value(raw)
            .map_err(|e| SiftError::provider(format!("malformed profile payload: {e}")))?;
        Ok(UserProfile {
            summary: payload.summary,
            interests: payload.interests,
            preferred_platforms: payload.preferred_platforms,
            error: None,
        })
    }

    /// Memory relevant to `needs`: key events sharing an entity or the
    /// intent, tracked records for the query's entities, and recent turns.
    pub fn relevant_memory(
        &self,
        snapshot: &SessionSnapshot,
        needs: &InformationNeeds,
    ) -> RelevantMemory {
        let keep = self.config.max_recent_turns.min(snapshot.turns.len());
        let recent_turns = snapshot.turns[snapshot.turns.len() - keep..].to_vec();

        let Some(memory) = &snapshot.compressed else {
            return RelevantMemory {
                recent_turns,
                ..RelevantMemory::default()
            };
        };

        let keys: BTreeSet<String> = needs.entity_keys();
        let key_events = memory
            .key_events
            .iter()
            .filter(|e| e.intent == needs.intent || !e.entity_keys.is_disjoint(&keys))
            .cloned()
            .collect();
        let entities = keys
            .iter()
            .filter_map(|k| memory.entity_tracking.get(k))
            .cloned()
            .collect();

        let relevant = RelevantMemory {
            profile: Some(memory.user_profile.clone()),
            key_events,
            entities,
            recent_turns,
        };
        debug!(
            key_events = relevant.key_events.len(),
            entities = relevant.entities.len(),
            "relevant memory selected"
        );
        relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use sift_core::traits::PluginAdapter;
    use sift_core::types::{
        AdapterType, Complexity, Entity, EntityKind, HealthStatus, Intent, Platform,
    };

    struct Profiler {
        fail: bool,
        priors: std::sync::Mutex<Vec<Option<String>>>,
        calls: AtomicUsize,
    }

    impl Profiler {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                priors: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PluginAdapter for Profiler {
        fn name(&self) -> &str {
            "profiler"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Llm
        }
        async fn health_check(&self) -> Result<HealthStatus, SiftError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), SiftError> {
            Ok(())
        }
    }

    #[async_trait]
    impl LlmAdapter for Profiler {
        async fn analyze(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
        async fn evaluate(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
        async fn summarize(
            &self,
            turns: &[ConversationTurn],
            previous: Option<&str>,
        ) -> Result<serde_json::Value, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.priors
                .lock()
                .unwrap()
                .push(previous.map(str::to_string));
            if self.fail {
                return Err(SiftError::provider("rate limited"));
            }
            Ok(serde_json::json!({
                "summary": format!("asked {} questions", turns.len()),
                "interests": ["auth"],
            }))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn turn(index: u64) -> ConversationTurn {
        let intent = if index % 3 == 0 {
            Intent::QueryEvents
        } else {
            Intent::SearchContent
        };
        ConversationTurn {
            turn_index: index,
            query: format!("turn {index} about Carol"),
            response: format!("answer {index}"),
            intent,
            entities: vec![Entity::new(EntityKind::Name, "Carol", 0.5)],
            platforms: [Platform::Slack].into_iter().collect(),
            context_ids: vec![format!("doc-{index}")],
            timestamp: start() + Duration::minutes(index as i64),
            sufficiency_score: 0.8,
            references_previous_turn: index > 0,
            errored: false,
        }
    }

    fn snapshot(n: u64) -> SessionSnapshot {
        SessionSnapshot {
            turns: (0..n).map(turn).collect(),
            compressed: None,
            next_turn_index: n,
        }
    }

    fn config(threshold: usize, recent: usize) -> MemoryConfig {
        MemoryConfig {
            compression_threshold: threshold,
            max_recent_turns: recent,
            ..MemoryConfig::default()
        }
    }

    fn needs(intent: Intent, entities: Vec<Entity>) -> InformationNeeds {
        InformationNeeds {
            query: "q".into(),
            user_id: "u1".into(),
            intent,
            intent_confidence: 0.9,
            entities,
            time_reference: None,
            platforms: Default::default(),
            complexity: Complexity::Simple,
            required_context: intent.required_context(),
            references_previous_turn: false,
            strategies: vec![],
        }
    }

    #[tokio::test]
    async fn below_threshold_keeps_raw_turns() {
        let manager = MemoryManager::new(config(5, 3), None);
        let mut s = snapshot(4);
        assert!(!manager.maybe_compress(&mut s, start()).await);
        assert_eq!(s.turns.len(), 4);
        assert!(s.compressed.is_none());
    }

    #[tokio::test]
    async fn threshold_compresses_and_keeps_recent_turns() {
        let llm = Profiler::new(false);
        let manager = MemoryManager::new(config(5, 3), Some(llm.clone()));
        let mut s = snapshot(5);
        assert!(manager.maybe_compress(&mut s, start()).await);

        assert_eq!(s.turns.len(), 3);
        assert_eq!(s.turns[0].turn_index, 2);
        let memory = s.compressed.as_ref().unwrap();
        assert_eq!(memory.recent_context.len(), 3);
        assert_eq!(memory.compression_count, 1);
        assert_eq!(memory.last_turn_index, 4);
        assert_eq!(memory.user_profile.summary, "asked 5 questions");
        assert_eq!(memory.entity_tracking["name:carol"].mention_count, 5);
        assert_eq!(memory.patterns.turn_count, 5);
        assert_eq!(memory.patterns.follow_up_rate, 1.0);
        assert!(memory.key_events.len() <= 10);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn profile_failure_never_blocks_compression() {
        let manager = MemoryManager::new(config(5, 3), Some(Profiler::new(true)));
        let mut s = snapshot(6);
        assert!(manager.maybe_compress(&mut s, start()).await);
        let profile = &s.compressed.as_ref().unwrap().user_profile;
        assert!(profile.summary.is_empty());
        assert!(profile.error.as_deref().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn missing_summarizer_yields_marked_profile() {
        let manager = MemoryManager::new(config(2, 1), None);
        let mut s = snapshot(2);
        manager.maybe_compress(&mut s, start()).await;
        assert!(s.compressed.unwrap().user_profile.error.is_some());
    }

    #[tokio::test]
    async fn recompression_merges_only_new_turns() {
        let llm = Profiler::new(false);
        let manager = MemoryManager::new(config(5, 3), Some(llm.clone()));
        let mut s = snapshot(5);
        manager.maybe_compress(&mut s, start()).await;

        for i in 5..7 {
            s.turns.push(turn(i));
        }
        s.next_turn_index = 7;
        assert!(manager.maybe_compress(&mut s, start()).await);

        let memory = s.compressed.as_ref().unwrap();
        assert_eq!(memory.compression_count, 2);
        assert_eq!(memory.last_turn_index, 6);
        assert_eq!(memory.patterns.turn_count, 7);
        assert_eq!(memory.entity_tracking["name:carol"].mention_count, 7);
        assert_eq!(memory.relationships.affinity["name:carol"], 7);
        let priors = llm.priors.lock().unwrap().clone();
        assert_eq!(priors, vec![None, Some("asked 5 questions".to_string())]);
        assert_eq!(memory.user_profile.summary, "asked 2 questions");
    }

    #[tokio::test]
    async fn relevant_memory_matches_entities_or_intent() {
        let manager = MemoryManager::new(config(5, 3), Some(Profiler::new(false)));
        let mut s = snapshot(6);
        manager.maybe_compress(&mut s, start()).await;

        let by_entity = manager.relevant_memory(
            &s,
            &needs(
                Intent::GeneralHelp,
                vec![Entity::new(EntityKind::Name, "carol", 0.5)],
            ),
        );
        assert!(by_entity.profile.is_some());
        assert!(!by_entity.key_events.is_empty());
        assert_eq!(by_entity.entities.len(), 1);
        assert_eq!(by_entity.recent_turns.len(), 3);

        let unrelated = manager.relevant_memory(&s, &needs(Intent::GeneralHelp, vec![]));
        assert!(unrelated.key_events.is_empty());
        assert!(unrelated.entities.is_empty());
    }

    #[tokio::test]
    async fn uncompressed_session_offers_recent_turns_only() {
        let manager = MemoryManager::new(config(20, 3), None);
        let relevant = manager.relevant_memory(&snapshot(4), &needs(Intent::QueryEvents, vec![]));
        assert!(relevant.profile.is_none());
        assert_eq!(relevant.recent_turns.len(), 3);
    }
}
