// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query analysis for the Sift engine.
//!
//! Turns raw query text into [`InformationNeeds`] using cheap pattern rules
//! first. The LLM `analyze` collaborator is consulted only for non-simple or
//! low-confidence queries, and its failure never fails the analysis.

pub mod patterns;
pub mod temporal;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sift_config::model::AnalyzerConfig;
use sift_core::error::SiftError;
use sift_core::memory::ConversationTurn;
use sift_core::traits::LlmAdapter;
use sift_core::types::{
    Complexity, Entity, EntityKind, InformationNeeds, Intent, RetrievalStrategy,
};
use tracing::{debug, warn};

/// Pronouns that point back at the previous turn.
const ANAPHORS: &[&str] = &[
    "it", "its", "it's", "that", "this", "those", "these", "they", "them", "their", "he", "she",
    "him", "her", "there",
];

/// Words that turn "this"/"that" into a time expression rather than a reference.
const TIME_NOUNS: &[&str] = &["hour", "morning", "afternoon", "evening", "week", "month", "year"];

/// Shape of the LLM `analyze` payload.
#[derive(Debug, Deserialize)]
struct LlmAnalysis {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    entities: Vec<LlmEntity>,
}

#[derive(Debug, Deserialize)]
struct LlmEntity {
    #[serde(rename = "type", default)]
    kind: String,
    value: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Pattern-first query analyzer.
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    llm: Option<Arc<dyn LlmAdapter>>,
}

impl QueryAnalyzer {
    pub fn new(config: AnalyzerConfig, llm: Option<Arc<dyn LlmAdapter>>) -> Self {
        Self { config, llm }
    }

    /// Analyze `query` for `user_id`, using the previous turn for follow-up detection.
    pub async fn analyze(
        &self,
        query: &str,
        user_id: &str,
        previous: Option<&ConversationTurn>,
    ) -> InformationNeeds {
        self.analyze_at(query, user_id, previous, Utc::now()).await
    }

    /// [`analyze`](Self::analyze) with an explicit clock for relative time expressions.
    pub async fn analyze_at(
        &self,
        query: &str,
        user_id: &str,
        previous: Option<&ConversationTurn>,
        now: DateTime<Utc>,
    ) -> InformationNeeds {
        let prior = self.analyze_patterns(query, user_id, previous, now);
        if !self.wants_llm(&prior) {
            return prior;
        }

        match self.augment(&prior).await {
            Ok(merged) => {
                debug!(
                    intent = %merged.intent,
                    confidence = merged.intent_confidence,
                    "merged llm analysis"
                );
                merged
            }
            Err(e) => {
                warn!(error = %e, "llm analysis failed, using pattern result");
                prior
            }
        }
    }

    /// Pattern-only analysis. Never calls a collaborator.
    pub fn analyze_patterns(
        &self,
        query: &str,
        user_id: &str,
        previous: Option<&ConversationTurn>,
        now: DateTime<Utc>,
    ) -> InformationNeeds {
        let lower = query.trim().to_lowercase();
        let (intent, intent_confidence) = patterns::classify_intent(&lower);
        let time_reference = temporal::parse_time_reference(&lower, now);
        let platforms = patterns::detect_platforms(&lower);
        let entities = patterns::extract_entities(query);
        let word_count = query.split_whitespace().count();
        let complexity =
            patterns::classify_complexity(word_count, entities.len(), platforms.len());

        let mut needs = InformationNeeds {
            query: query.trim().to_string(),
            user_id: user_id.to_string(),
            intent,
            intent_confidence,
            entities,
            time_reference,
            platforms,
            complexity,
            required_context: intent.required_context(),
            references_previous_turn: false,
            strategies: Vec::new(),
        };
        needs.references_previous_turn = previous.is_some_and(|p| self.refers_to(&needs, p));
        needs.strategies = suggest_strategies(&needs);

        debug!(
            intent = %needs.intent,
            confidence = needs.intent_confidence,
            complexity = %needs.complexity,
            entities = needs.entities.len(),
            "pattern analysis"
        );
        needs
    }

    fn wants_llm(&self, needs: &InformationNeeds) -> bool {
        self.config.llm_enabled
            && self.llm.is_some()
            && (needs.complexity != Complexity::Simple
                || needs.intent_confidence < self.config.llm_confidence_threshold)
    }

    async fn augment(&self, prior: &InformationNeeds) -> Result<InformationNeeds, SiftError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| SiftError::Analysis("no llm configured".into()))?;

        let raw = llm.analyze(&analysis_prompt(prior)).await?;
        let parsed: LlmAnalysis = serde_json::from_value(raw)
            .map_err(|e| SiftError::Analysis(format!("malformed analysis payload: {e}")))?;

        let mut merged = prior.clone();
        if let Some(intent) = parsed.intent.as_deref().and_then(|s| s.trim().parse::<Intent>().ok())
        {
            merged.intent = intent;
            merged.required_context = intent.required_context();
        }
        if let Some(confidence) = parsed.confidence.filter(|c| c.is_finite()) {
            merged.intent_confidence = confidence.clamp(0.0, 1.0);
        }

        let mut keys: BTreeSet<String> = merged.entity_keys();
        for e in parsed.entities {
            if e.value.trim().is_empty() {
                continue;
            }
            let entity = Entity::new(
                EntityKind::parse_lenient(&e.kind),
                e.value.trim(),
                e.confidence.unwrap_or(0.7),
            );
            if keys.insert(entity.key()) {
                merged.entities.push(entity);
            }
        }
        merged.strategies = suggest_strategies(&merged);
        Ok(merged)
    }

    /// Anaphoric opener or majority entity overlap with the previous turn.
    fn refers_to(&self, needs: &InformationNeeds, previous: &ConversationTurn) -> bool {
        let words: Vec<String> = needs
            .query
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .collect();
        let window = self.config.pronoun_window.min(words.len());
        let anaphoric = words[..window].iter().enumerate().any(|(i, w)| {
            ANAPHORS.contains(&w.as_str())
                && !(matches!(w.as_str(), "this" | "that")
                    && words
                        .get(i + 1)
                        .is_some_and(|next| TIME_NOUNS.contains(&next.as_str())))
        });
        if anaphoric {
            return true;
        }

        if needs.entities.is_empty() {
            return false;
        }
        let prior: BTreeSet<String> = previous.entities.iter().map(Entity::key).collect();
        let shared = needs.entity_keys().intersection(&prior).count();
        shared as f64 / needs.entities.len() as f64 > self.config.entity_overlap
    }
}

fn analysis_prompt(prior: &InformationNeeds) -> String {
    let prior_json = serde_json::json!({
        "intent": prior.intent,
        "confidence": prior.intent_confidence,
        "entities": prior.entities,
        "platforms": prior.platforms,
    });
    format!(
        "Classify the user query. Respond with JSON \
         {{\"intent\": one of [{}], \"confidence\": 0-1, \
         \"entities\": [{{\"type\", \"value\", \"confidence\"}}]}}.\n\
         Pattern analysis: {prior_json}\nQuery: {}",
        Intent::ALL.map(|i| i.to_string()).join(", "),
        prior.query
    )
}

/// Strategies implied by the analysis.
pub fn suggest_strategies(needs: &InformationNeeds) -> Vec<RetrievalStrategy> {
    let mut strategies = vec![RetrievalStrategy::Hybrid];
    if needs.time_reference.is_some() {
        strategies.push(RetrievalStrategy::TemporalFocused);
    }
    if needs.platforms.len() > 1 {
        strategies.push(RetrievalStrategy::CrossPlatformCorrelation);
    }
    if needs.intent == Intent::ExplainAction {
        strategies.push(RetrievalStrategy::ActionContextRetrieval);
    }
    if needs.complexity == Complexity::Complex {
        strategies.push(RetrievalStrategy::MultiStageExpansion);
    }
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sift_core::traits::PluginAdapter;
    use sift_core::types::{AdapterType, ContextKind, HealthStatus, Platform};

    /// Returns a fixed payload (or an error) and counts calls.
    struct FixedLlm {
        payload: Option<serde_json::Value>,
        calls: AtomicUsize,
    }

    impl FixedLlm {
        fn new(payload: Option<serde_json::Value>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PluginAdapter for FixedLlm {
        fn name(&self) -> &str {
            "fixed-llm"
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
    impl LlmAdapter for FixedLlm {
        async fn analyze(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload
                .clone()
                .ok_or_else(|| SiftError::provider("llm offline"))
        }
        async fn evaluate(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
        async fn summarize(
            &self,
            _turns: &[ConversationTurn],
            _previous: Option<&str>,
        ) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
    }

    fn analyzer(llm: &Arc<FixedLlm>) -> QueryAnalyzer {
        let llm: Arc<dyn LlmAdapter> = llm.clone();
        QueryAnalyzer::new(AnalyzerConfig::default(), Some(llm))
    }

    fn turn(entities: Vec<Entity>) -> ConversationTurn {
        ConversationTurn {
            turn_index: 0,
            query: "previous".into(),
            response: "answer".into(),
            intent: Intent::SearchContent,
            entities,
            platforms: BTreeSet::new(),
            context_ids: vec![],
            timestamp: Utc::now(),
            sufficiency_score: 0.9,
            references_previous_turn: false,
            errored: false,
        }
    }

    #[tokio::test]
    async fn simple_confident_query_skips_llm() {
        let llm = FixedLlm::new(Some(serde_json::json!({"intent": "general_help"})));
        let needs = analyzer(&llm)
            .analyze("Find me the auth bug", "u1", None)
            .await;
        assert_eq!(needs.intent, Intent::SearchContent);
        assert_eq!(needs.complexity, Complexity::Simple);
        assert!(needs.intent_confidence >= 0.7);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(needs.strategies, vec![RetrievalStrategy::Hybrid]);
        assert_eq!(needs.required_context, vec![ContextKind::Content]);
    }

    #[tokio::test]
    async fn low_confidence_query_merges_llm_result() {
        let llm = FixedLlm::new(Some(serde_json::json!({
            "intent": "explain_action",
            "confidence": 1.4,
            "entities": [{"type": "project", "value": "Apollo", "confidence": 0.6}]
        })));
        let needs = analyzer(&llm).analyze("hmm about apollo", "u1", None).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(needs.intent, Intent::ExplainAction);
        assert_eq!(needs.intent_confidence, 1.0);
        assert_eq!(needs.entities.len(), 1);
        assert_eq!(needs.entities[0].kind, EntityKind::Other);
        assert!(needs
            .strategies
            .contains(&RetrievalStrategy::ActionContextRetrieval));
    }

    #[tokio::test]
    async fn llm_failure_returns_pattern_result() {
        let llm = FixedLlm::new(None);
        let needs = analyzer(&llm).analyze("hmm", "u1", None).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(needs.intent, Intent::GeneralHelp);
        assert_eq!(needs.intent_confidence, 0.3);
    }

    #[tokio::test]
    async fn malformed_llm_payload_returns_pattern_result() {
        let llm = FixedLlm::new(Some(serde_json::json!(["not", "an", "object"])));
        let needs = analyzer(&llm).analyze("hmm", "u1", None).await;
        assert_eq!(needs.intent, Intent::GeneralHelp);
    }

    #[tokio::test]
    async fn unknown_llm_intent_keeps_pattern_intent() {
        let llm = FixedLlm::new(Some(serde_json::json!({"intent": "dance", "confidence": 0.8})));
        let needs = analyzer(&llm).analyze("hmm", "u1", None).await;
        assert_eq!(needs.intent, Intent::GeneralHelp);
        assert_eq!(needs.intent_confidence, 0.8);
    }

    #[test]
    fn pronoun_opener_marks_follow_up() {
        let a = QueryAnalyzer::new(AnalyzerConfig::default(), None);
        let prev = turn(vec![]);
        let needs = a.analyze_patterns("and what about its tests?", "u1", Some(&prev), Utc::now());
        assert!(needs.references_previous_turn);

        let needs = a.analyze_patterns("what happened this week", "u1", Some(&prev), Utc::now());
        assert!(!needs.references_previous_turn);
    }

    #[test]
    fn entity_overlap_marks_follow_up() {
        let a = QueryAnalyzer::new(AnalyzerConfig::default(), None);
        let prev = turn(vec![Entity::new(EntityKind::Name, "Dana", 0.5)]);
        let needs = a.analyze_patterns("did Dana merge anything", "u1", Some(&prev), Utc::now());
        assert!(needs.references_previous_turn);

        let needs = a.analyze_patterns("did Erin merge anything", "u1", Some(&prev), Utc::now());
        assert!(!needs.references_previous_turn);
    }

    #[test]
    fn strategies_follow_analysis() {
        let a = QueryAnalyzer::new(AnalyzerConfig::default(), None);
        let needs = a.analyze_patterns(
            "what changed in slack and github yesterday",
            "u1",
            None,
            Utc::now(),
        );
        assert!(needs.platforms.contains(&Platform::Slack));
        assert!(needs.strategies.contains(&RetrievalStrategy::TemporalFocused));
        assert!(needs
            .strategies
            .contains(&RetrievalStrategy::CrossPlatformCorrelation));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pattern_confidence_is_a_probability(query in "\\PC{0,80}") {
                let a = QueryAnalyzer::new(AnalyzerConfig::default(), None);
                let needs = a.analyze_patterns(&query, "u", None, Utc::now());
                prop_assert!((0.0..=1.0).contains(&needs.intent_confidence));
                if needs.intent == Intent::GeneralHelp {
                    prop_assert_eq!(needs.intent_confidence, 0.3);
                }
            }
        }
    }
}
