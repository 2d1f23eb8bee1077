// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sufficiency evaluation and context expansion for the Sift engine.
//!
//! The evaluator scores a fused context on independent heuristic dimensions,
//! optionally blends in an LLM judgment, and names the gaps that explain an
//! insufficient score. The [`expander`] turns those gaps into modified
//! retrieval filters for the next round.

pub mod expander;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sift_config::model::SufficiencyConfig;
use sift_core::context::FusedContext;
use sift_core::error::SiftError;
use sift_core::evaluation::{DimensionScores, GapKind, Sufficiency, SufficiencyEvaluation};
use sift_core::params::{ExpansionThresholds, ParameterStore};
use sift_core::traits::LlmAdapter;
use sift_core::types::{InformationNeeds, Platform};
use tracing::{debug, warn};

pub use expander::ContextExpander;

/// Judges whether a fused context answers the information needs.
#[async_trait]
pub trait ContextEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        needs: &InformationNeeds,
        context: &FusedContext,
    ) -> SufficiencyEvaluation;
}

/// Shape of the LLM `evaluate` payload.
#[derive(Debug, Deserialize)]
struct LlmJudgment {
    score: f64,
    #[serde(default)]
    missing_elements: Vec<String>,
}

/// Heuristic evaluator with optional LLM blending.
pub struct SufficiencyEvaluator {
    config: SufficiencyConfig,
    params: Arc<ParameterStore>,
    llm: Option<Arc<dyn LlmAdapter>>,
}

impl SufficiencyEvaluator {
    pub fn new(
        config: SufficiencyConfig,
        params: Arc<ParameterStore>,
        llm: Option<Arc<dyn LlmAdapter>>,
    ) -> Self {
        Self {
            config,
            params,
            llm,
        }
    }

    async fn judge(
        &self,
        needs: &InformationNeeds,
        context: &FusedContext,
    ) -> Result<LlmJudgment, SiftError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| SiftError::Evaluation("no llm configured".into()))?;
        let raw = llm.evaluate(&evaluation_prompt(needs, context)).await?;
        let judgment: LlmJudgment = serde_json::from_value(raw)
            .map_err(|e| SiftError::Evaluation(format!("malformed judgment payload: {e}")))?;
        if !judgment.score.is_finite() {
            return Err(SiftError::Evaluation(format!(
                "non-finite judgment score {}",
                judgment.score
            )));
        }
        Ok(judgment)
    }
}

#[async_trait]
impl ContextEvaluator for SufficiencyEvaluator {
    async fn evaluate(
        &self,
        needs: &InformationNeeds,
        context: &FusedContext,
    ) -> SufficiencyEvaluation {
        let mut dimensions = score_dimensions(needs, context, self.config.min_results);
        let heuristic = dimensions.heuristic_mean();
        let mut missing_elements = Vec::new();

        let mut score = heuristic;
        if self.config.llm_enabled && self.llm.is_some() {
            match self.judge(needs, context).await {
                Ok(judgment) => {
                    let llm_score = judgment.score.clamp(0.0, 1.0);
                    let w = self.config.llm_weight.clamp(0.0, 1.0);
                    dimensions.llm_judgment = Some(llm_score);
                    missing_elements = judgment.missing_elements;
                    score = (1.0 - w) * heuristic + w * llm_score;
                }
                Err(e) => {
                    warn!(error = %e, "llm judgment failed, using heuristic score");
                }
            }
        }
        let score = score.clamp(0.0, 1.0);

        let params = self.params.snapshot();
        let evaluation = classify(
            score,
            dimensions,
            missing_elements,
            params.sufficiency_threshold,
            &params.expansion_thresholds,
        );
        debug!(
            attempt = context.provenance.attempt,
            score = evaluation.score,
            threshold = params.sufficiency_threshold,
            gaps = ?evaluation.gaps,
            "context evaluated"
        );
        evaluation
    }
}

/// Heuristic dimension scores for `context`. The LLM judgment is left empty.
pub fn score_dimensions(
    needs: &InformationNeeds,
    context: &FusedContext,
    min_results: usize,
) -> DimensionScores {
    let total = context.total_results();

    let entity_coverage = if needs.entities.is_empty() {
        1.0
    } else {
        let covered = needs
            .entities
            .iter()
            .filter(|e| context.all_results().any(|r| r.mentions(e)))
            .count();
        covered as f64 / needs.entities.len() as f64
    };

    let temporal_relevance = match &needs.time_reference {
        None => 1.0,
        Some(_) if total == 0 => 0.0,
        Some(window) => {
            let inside = context
                .all_results()
                .filter(|r| window.contains(&r.timestamp))
                .count();
            inside as f64 / total as f64
        }
    };

    let platform_diversity = if needs.platforms.is_empty() {
        1.0
    } else {
        let present: BTreeSet<Platform> = context
            .all_results()
            .filter_map(|r| r.detail.platform())
            .collect();
        let hit = needs.platforms.intersection(&present).count();
        hit as f64 / needs.platforms.len() as f64
    };

    let result_volume = (total as f64 / min_results.max(1) as f64).min(1.0);

    DimensionScores {
        entity_coverage,
        temporal_relevance,
        platform_diversity,
        result_volume,
        llm_judgment: None,
    }
}

/// Turn a score and its dimensions into an outcome with named gaps.
///
/// Gaps are reported only when the score misses `threshold`, ordered by
/// [`GapKind::priority`].
pub fn classify(
    score: f64,
    dimensions: DimensionScores,
    missing_elements: Vec<String>,
    threshold: f64,
    thresholds: &ExpansionThresholds,
) -> SufficiencyEvaluation {
    if score >= threshold {
        return SufficiencyEvaluation {
            score,
            dimensions,
            gaps: Vec::new(),
            missing_elements,
            outcome: Sufficiency::Sufficient,
        };
    }

    let mut gaps = Vec::new();
    if dimensions.temporal_relevance < thresholds.temporal_relevance {
        gaps.push(GapKind::TemporalCoverage);
    }
    if dimensions.entity_coverage < thresholds.entity_coverage {
        gaps.push(GapKind::EntityCoverage);
    }
    if dimensions.platform_diversity < thresholds.platform_diversity {
        gaps.push(GapKind::PlatformDiversity);
    }
    if dimensions.result_volume < thresholds.result_volume {
        gaps.push(GapKind::InsufficientResults);
    }
    if gaps.is_empty() {
        gaps.push(GapKind::LowOverallRelevance);
    }

    SufficiencyEvaluation {
        score,
        dimensions,
        outcome: Sufficiency::Insufficient { gaps: gaps.clone() },
        gaps,
        missing_elements,
    }
}

fn evaluation_prompt(needs: &InformationNeeds, context: &FusedContext) -> String {
    let results: Vec<_> = context
        .ranked_results()
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "source": r.source(),
                "timestamp": r.timestamp,
                "content": r.content,
            })
        })
        .collect();
    format!(
        "Judge whether the retrieved context is enough to answer the query. \
         Respond with JSON {{\"score\": 0-1, \"missing_elements\": [..]}}.\n\
         Query: {}\nIntent: {}\nContext: {}",
        needs.query,
        needs.intent,
        serde_json::Value::Array(results)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone, Utc};
    use sift_core::context::{
        FusionMode, Provenance, ResultSource, RetrievalFilters, SearchResult, SourceDetail,
    };
    use sift_core::memory::ConversationTurn;
    use sift_core::traits::PluginAdapter;
    use sift_core::types::{
        AdapterType, Complexity, Entity, EntityKind, HealthStatus, Intent, TimeRange,
    };

    struct JudgeLlm {
        payload: Option<serde_json::Value>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PluginAdapter for JudgeLlm {
        fn name(&self) -> &str {
            "judge"
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
    impl LlmAdapter for JudgeLlm {
        async fn analyze(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
        async fn evaluate(&self, _prompt: &str) -> Result<serde_json::Value, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload
                .clone()
                .ok_or_else(|| SiftError::provider("judge unavailable"))
        }
        async fn summarize(
            &self,
            _turns: &[ConversationTurn],
            _previous: Option<&str>,
        ) -> Result<serde_json::Value, SiftError> {
            Err(SiftError::provider("unused"))
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn result(id: &str, text: &str, hours_ago: i64) -> SearchResult {
        SearchResult {
            id: id.into(),
            content: text.into(),
            score: 1.0,
            timestamp: now() - Duration::hours(hours_ago),
            detail: SourceDetail::Content {
                platform: Some(Platform::Slack),
                title: None,
                user_id: "u1".into(),
            },
        }
    }

    fn context(content: Vec<SearchResult>) -> FusedContext {
        FusedContext {
            content,
            ..FusedContext::empty(Provenance {
                attempt: 1,
                filters: RetrievalFilters {
                    user_id: "u1".into(),
                    time_range: None,
                    platforms: BTreeSet::new(),
                    entities: vec![],
                    vector_top_k: 10,
                    event_limit: 20,
                    action_limit: 10,
                },
                fusion_mode: FusionMode::Weighted,
                failed_sources: vec![ResultSource::Event],
                from_cache: false,
            })
        }
    }

    fn needs() -> InformationNeeds {
        InformationNeeds {
            query: "what did Carol change yesterday".into(),
            user_id: "u1".into(),
            intent: Intent::QueryEvents,
            intent_confidence: 0.9,
            entities: vec![Entity::new(EntityKind::Name, "Carol", 0.5)],
            time_reference: Some(TimeRange::new(
                now() - Duration::hours(36),
                now() - Duration::hours(12),
                "yesterday",
            )),
            platforms: BTreeSet::new(),
            complexity: Complexity::Simple,
            required_context: Intent::QueryEvents.required_context(),
            references_previous_turn: false,
            strategies: vec![],
        }
    }

    fn evaluator(llm: Option<Arc<dyn LlmAdapter>>) -> SufficiencyEvaluator {
        SufficiencyEvaluator::new(
            SufficiencyConfig::default(),
            Arc::new(ParameterStore::default()),
            llm,
        )
    }

    #[test]
    fn dimensions_without_constraints_are_full() {
        let mut n = needs();
        n.entities.clear();
        n.time_reference = None;
        let ctx = context((0..5).map(|i| result(&format!("r{i}"), "x", i)).collect());
        let d = score_dimensions(&n, &ctx, 5);
        assert_eq!(d.entity_coverage, 1.0);
        assert_eq!(d.temporal_relevance, 1.0);
        assert_eq!(d.platform_diversity, 1.0);
        assert_eq!(d.result_volume, 1.0);
    }

    #[test]
    fn requested_window_with_no_results_scores_zero() {
        let d = score_dimensions(&needs(), &context(vec![]), 5);
        assert_eq!(d.temporal_relevance, 0.0);
        assert_eq!(d.result_volume, 0.0);
        assert_eq!(d.entity_coverage, 0.0);
    }

    #[test]
    fn temporal_relevance_is_fraction_inside_window() {
        let ctx = context(vec![
            result("a", "Carol merged", 20),
            result("b", "old", 100),
            result("c", "old", 200),
            result("d", "Carol again", 24),
        ]);
        let d = score_dimensions(&needs(), &ctx, 5);
        assert_eq!(d.temporal_relevance, 0.5);
        assert_eq!(d.entity_coverage, 1.0);
        assert!((d.result_volume - 0.8).abs() < 1e-9);
    }

    #[test]
    fn platform_diversity_counts_requested_platforms_present() {
        let mut n = needs();
        n.platforms = [Platform::Slack, Platform::Github].into_iter().collect();
        let d = score_dimensions(&n, &context(vec![result("a", "x", 1)]), 5);
        assert_eq!(d.platform_diversity, 0.5);
    }

    #[test]
    fn sufficient_scores_carry_no_gaps() {
        let dims = DimensionScores {
            entity_coverage: 0.0,
            temporal_relevance: 0.0,
            platform_diversity: 1.0,
            result_volume: 1.0,
            llm_judgment: None,
        };
        let e = classify(0.75, dims, vec![], 0.7, &ExpansionThresholds::default());
        assert!(e.is_sufficient());
        assert!(e.gaps.is_empty());
    }

    #[test]
    fn gaps_follow_priority_order() {
        let dims = DimensionScores {
            entity_coverage: 0.0,
            temporal_relevance: 0.1,
            platform_diversity: 1.0,
            result_volume: 0.1,
            llm_judgment: None,
        };
        let e = classify(0.3, dims, vec![], 0.7, &ExpansionThresholds::default());
        assert_eq!(
            e.gaps,
            vec![
                GapKind::TemporalCoverage,
                GapKind::EntityCoverage,
                GapKind::InsufficientResults
            ]
        );
        assert_eq!(
            e.outcome,
            Sufficiency::Insufficient {
                gaps: e.gaps.clone()
            }
        );
    }

    #[test]
    fn no_dimension_below_threshold_reports_low_overall_relevance() {
        let dims = DimensionScores {
            entity_coverage: 0.6,
            temporal_relevance: 0.6,
            platform_diversity: 0.6,
            result_volume: 0.6,
            llm_judgment: None,
        };
        let e = classify(0.6, dims, vec![], 0.7, &ExpansionThresholds::default());
        assert_eq!(e.gaps, vec![GapKind::LowOverallRelevance]);
    }

    #[tokio::test]
    async fn llm_judgment_is_blended_with_heuristics() {
        let llm = Arc::new(JudgeLlm {
            payload: Some(serde_json::json!({"score": 1.0, "missing_elements": ["deploy log"]})),
            calls: AtomicUsize::new(0),
        });
        let mut n = needs();
        n.entities.clear();
        n.time_reference = None;
        let ctx = context(vec![result("a", "x", 1)]);
        let e = evaluator(Some(llm.clone())).evaluate(&n, &ctx).await;
        // heuristic: (1 + 1 + 1 + 0.2) / 4 = 0.8; blended 0.5 * 0.8 + 0.5 * 1.0
        assert!((e.score - 0.9).abs() < 1e-9);
        assert_eq!(e.dimensions.llm_judgment, Some(1.0));
        assert_eq!(e.missing_elements, vec!["deploy log".to_string()]);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_heuristic_mean() {
        let llm = Arc::new(JudgeLlm {
            payload: None,
            calls: AtomicUsize::new(0),
        });
        let e = evaluator(Some(llm)).evaluate(&needs(), &context(vec![])).await;
        assert_eq!(e.dimensions.llm_judgment, None);
        assert_eq!(e.score, e.dimensions.heuristic_mean());
        assert!(!e.is_sufficient());
        assert_eq!(e.gaps[0], GapKind::TemporalCoverage);
    }

    #[tokio::test]
    async fn malformed_judgment_is_ignored() {
        let llm = Arc::new(JudgeLlm {
            payload: Some(serde_json::json!({"verdict": "fine"})),
            calls: AtomicUsize::new(0),
        });
        let e = evaluator(Some(llm)).evaluate(&needs(), &context(vec![])).await;
        assert_eq!(e.dimensions.llm_judgment, None);
    }

    #[tokio::test]
    async fn out_of_range_judgment_is_clamped() {
        let llm = Arc::new(JudgeLlm {
            payload: Some(serde_json::json!({"score": 7.5})),
            calls: AtomicUsize::new(0),
        });
        let ctx = context(vec![result("a", "Carol", 20)]);
        let e = evaluator(Some(llm)).evaluate(&needs(), &ctx).await;
        assert_eq!(e.dimensions.llm_judgment, Some(1.0));
        assert!((0.0..=1.0).contains(&e.score));
    }

    proptest::proptest! {
        #[test]
        fn score_stays_in_unit_interval(
            entity in 0.0f64..=1.0,
            temporal in 0.0f64..=1.0,
            platform in 0.0f64..=1.0,
            volume in 0.0f64..=1.0,
            threshold in 0.5f64..=0.9,
        ) {
            let dims = DimensionScores {
                entity_coverage: entity,
                temporal_relevance: temporal,
                platform_diversity: platform,
                result_volume: volume,
                llm_judgment: None,
            };
            let score = dims.heuristic_mean();
            let e = classify(score, dims, vec![], threshold, &ExpansionThresholds::default());
            proptest::prop_assert!((0.0..=1.0).contains(&e.score));
            proptest::prop_assert_eq!(e.is_sufficient(), e.score >= threshold);
            proptest::prop_assert_eq!(e.gaps.is_empty(), e.is_sufficient());
        }
    }
}
