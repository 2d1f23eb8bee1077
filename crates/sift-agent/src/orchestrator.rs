// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-turn state machine.
//!
//! A turn moves through `Analyze -> Retrieve -> Evaluate`, then either
//! `Generate` when the context is sufficient, or `Expand -> Retrieve ->
//! Evaluate` again until the attempt cap is hit, after which the best context
//! seen is answered from with low confidence. A failed generation ends in
//! `Error` with the configured fallback response.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sift_analyzer::QueryAnalyzer;
use sift_cache::{CachedResponse, ContextCache};
use sift_config::model::EngineConfig;
use sift_core::context::FusedContext;
use sift_core::evaluation::{ExpansionPlan, SufficiencyEvaluation};
use sift_core::memory::{ConversationTurn, SessionSnapshot};
use sift_core::traits::{GenerationAdapter, GenerationRequest, SessionStore};
use sift_core::types::{InformationNeeds, Intent};
use sift_learning::{QualityMetrics, TurnQuality};
use sift_memory::MemoryManager;
use sift_retrieval::HybridRetriever;
use sift_sufficiency::{ContextEvaluator, ContextExpander};
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::recording;
use crate::session::{SessionLocks, load_snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Analyze,
    Retrieve,
    Evaluate,
    Expand,
    Generate,
    Error,
}

/// One user query within a session.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub user_id: String,
    pub query: String,
}

impl TurnRequest {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            query: query.into(),
        }
    }
}

/// One retrieve/evaluate round.
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    /// 1 for the initial retrieval.
    pub sequence: u32,
    pub evaluation: SufficiencyEvaluation,
    pub result_count: usize,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub session_id: String,
    pub turn_index: u64,
    pub intent: Intent,
    pub sufficiency_score: f64,
    pub rounds: Vec<Round>,
    pub expansions: Vec<ExpansionPlan>,
    pub states: Vec<TurnState>,
    pub low_confidence: bool,
    pub errored: bool,
    pub from_response_cache: bool,
    /// Whether raw turns were folded into compressed memory before this turn.
    pub compressed: bool,
}

impl TurnOutcome {
    pub fn expansion_attempts(&self) -> u32 {
        self.expansions.len() as u32
    }
}

/// Everything the orchestrator calls.
pub struct TurnPipeline {
    pub analyzer: QueryAnalyzer,
    pub retriever: HybridRetriever,
    pub evaluator: Arc<dyn ContextEvaluator>,
    pub expander: ContextExpander,
    pub memory: MemoryManager,
    pub cache: Arc<ContextCache>,
    pub quality: Arc<QualityMetrics>,
    pub generator: Arc<dyn GenerationAdapter>,
    pub sessions: Arc<dyn SessionStore>,
}

pub struct Orchestrator {
    config: EngineConfig,
    pipeline: TurnPipeline,
    locks: SessionLocks,
}

/// Where a turn ended up after the expansion loop.
struct Resolved {
    context: FusedContext,
    evaluation: SufficiencyEvaluation,
    low_confidence: bool,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, pipeline: TurnPipeline) -> Self {
        Self {
            config,
            pipeline,
            locks: SessionLocks::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.pipeline.cache
    }

    pub fn quality(&self) -> &Arc<QualityMetrics> {
        &self.pipeline.quality
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.pipeline.sessions
    }

    /// Answer one query. Never fails: collaborator failures degrade inside the
    /// turn, and a failed generation yields the fallback response.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnOutcome {
        let guard = self.locks.acquire(&request.session_id).await;
        recording::set_active_sessions(self.locks.len());
        let outcome = self.run_turn(&request, Utc::now()).await;
        drop(guard);
        self.locks.prune();
        outcome
    }

    async fn run_turn(&self, request: &TurnRequest, now: DateTime<Utc>) -> TurnOutcome {
        let started = Instant::now();
        let p = &self.pipeline;

        let mut snapshot = load_snapshot(p.sessions.as_ref(), &request.session_id).await;
        let compressed = p.memory.maybe_compress(&mut snapshot, now).await;

        if let Some(outcome) = self
            .answer_from_cache(request, &mut snapshot, compressed, started, now)
            .await
        {
            return outcome;
        }

        let mut states = vec![TurnState::Analyze];
        let needs = self.analyze(request, &snapshot, now).await;
        debug!(
            session_id = %request.session_id,
            intent = %needs.intent,
            confidence = needs.intent_confidence,
            entities = needs.entities.len(),
            "query analyzed"
        );
        let memory = p.memory.relevant_memory(&snapshot, &needs);

        let mut rounds = Vec::new();
        let mut expansions = Vec::new();
        let resolved = self
            .resolve_context(&needs, now, &mut states, &mut rounds, &mut expansions)
            .await;

        states.push(TurnState::Generate);
        let generation = p
            .generator
            .generate(&GenerationRequest {
                needs: needs.clone(),
                context: resolved.context.clone(),
                memory,
                low_confidence: resolved.low_confidence,
            })
            .await;
        let (response, error) = match generation {
            Ok(text) => (text, None),
            Err(e) => {
                states.push(TurnState::Error);
                error!(
                    session_id = %request.session_id,
                    intent = %needs.intent,
                    rounds = rounds.len(),
                    score = resolved.evaluation.score,
                    error = %e,
                    "generation failed, returning fallback"
                );
                (self.config.fallback_response.clone(), Some(e.to_string()))
            }
        };
        let errored = error.is_some();

        let turn = ConversationTurn {
            turn_index: snapshot.next_turn_index,
            query: request.query.clone(),
            response: response.clone(),
            intent: needs.intent,
            entities: needs.entities.clone(),
            platforms: needs.platforms.clone(),
            context_ids: resolved.context.result_ids(),
            timestamp: now,
            sufficiency_score: resolved.evaluation.score,
            references_previous_turn: needs.references_previous_turn,
            errored,
        };
        self.persist(&request.session_id, &mut snapshot, turn).await;

        if resolved.evaluation.is_sufficient() && !errored {
            if !resolved.context.provenance.from_cache {
                p.cache.put_context(&needs, &resolved.context).await;
            }
            // A follow-up's answer depends on this session's history.
            if !needs.references_previous_turn {
                p.cache
                    .put_response(
                        &request.query,
                        &request.user_id,
                        CachedResponse {
                            response: response.clone(),
                            sufficiency_score: resolved.evaluation.score,
                            intent: needs.intent,
                            context_ids: resolved.context.result_ids(),
                        },
                    )
                    .await;
            }
        }

        let elapsed = started.elapsed();
        let expansion_attempts = expansions.len() as u32;
        p.quality.record_turn(TurnQuality {
            session_id: request.session_id.clone(),
            intent: needs.intent,
            response_time: elapsed,
            sufficiency_score: resolved.evaluation.score,
            expansion_attempts,
            gaps: resolved.evaluation.gaps.clone(),
            low_confidence: resolved.low_confidence,
            error,
            recorded_at: now,
        });
        let outcome = if errored {
            "error"
        } else if resolved.low_confidence {
            "low_confidence"
        } else {
            "sufficient"
        };
        recording::record_turn(
            &needs.intent.to_string(),
            outcome,
            elapsed.as_secs_f64(),
            expansion_attempts,
        );
        info!(
            session_id = %request.session_id,
            turn_index = snapshot.next_turn_index - 1,
            intent = %needs.intent,
            score = resolved.evaluation.score,
            rounds = rounds.len(),
            outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "turn completed"
        );

        TurnOutcome {
            response,
            session_id: request.session_id.clone(),
            turn_index: snapshot.next_turn_index - 1,
            intent: needs.intent,
            sufficiency_score: resolved.evaluation.score,
            rounds,
            expansions,
            states,
            low_confidence: resolved.low_confidence,
            errored,
            from_response_cache: false,
            compressed,
        }
    }

    /// Serve a cached answer as a full turn: logged to the session and
    /// recorded for learning. Follow-ups of the previous turn never hit.
    async fn answer_from_cache(
        &self,
        request: &TurnRequest,
        snapshot: &mut SessionSnapshot,
        compressed: bool,
        started: Instant,
        now: DateTime<Utc>,
    ) -> Option<TurnOutcome> {
        let p = &self.pipeline;
        let patterns =
            p.analyzer
                .analyze_patterns(&request.query, &request.user_id, snapshot.last_turn(), now);
        if patterns.references_previous_turn {
            debug!(session_id = %request.session_id, "follow-up query, response cache skipped");
            return None;
        }
        let cached = p.cache.get_response(&request.query, &request.user_id).await?;

        let turn_index = snapshot.next_turn_index;
        let turn = ConversationTurn {
            turn_index,
            query: request.query.clone(),
            response: cached.response.clone(),
            intent: cached.intent,
            entities: patterns.entities,
            platforms: patterns.platforms,
            context_ids: cached.context_ids,
            timestamp: now,
            sufficiency_score: cached.sufficiency_score,
            references_previous_turn: false,
            errored: false,
        };
        self.persist(&request.session_id, snapshot, turn).await;

        let elapsed = started.elapsed();
        p.quality.record_turn(TurnQuality {
            session_id: request.session_id.clone(),
            intent: cached.intent,
            response_time: elapsed,
            sufficiency_score: cached.sufficiency_score,
            expansion_attempts: 0,
            gaps: Vec::new(),
            low_confidence: false,
            error: None,
            recorded_at: now,
        });
        recording::record_turn(&cached.intent.to_string(), "cached", elapsed.as_secs_f64(), 0);
        info!(
            session_id = %request.session_id,
            turn_index,
            intent = %cached.intent,
            "answered from response cache"
        );

        Some(TurnOutcome {
            response: cached.response,
            session_id: request.session_id.clone(),
            turn_index,
            intent: cached.intent,
            sufficiency_score: cached.sufficiency_score,
            rounds: Vec::new(),
            expansions: Vec::new(),
            states: Vec::new(),
            low_confidence: false,
            errored: false,
            from_response_cache: true,
            compressed,
        })
    }

    /// Analysis results are only reused for a session's opening query, since
    /// follow-up detection depends on the previous turn.
    async fn analyze(
        &self,
        request: &TurnRequest,
        snapshot: &SessionSnapshot,
        now: DateTime<Utc>,
    ) -> InformationNeeds {
        let p = &self.pipeline;
        let previous = snapshot.last_turn();
        if previous.is_none()
            && let Some(needs) = p.cache.get_analysis(&request.query, &request.user_id).await
        {
            debug!(session_id = %request.session_id, "analysis cache hit");
            return needs;
        }
        let needs = p
            .analyzer
            .analyze_at(&request.query, &request.user_id, previous, now)
            .await;
        p.cache.put_analysis(&needs).await;
        needs
    }

    async fn resolve_context(
        &self,
        needs: &InformationNeeds,
        now: DateTime<Utc>,
        states: &mut Vec<TurnState>,
        rounds: &mut Vec<Round>,
        expansions: &mut Vec<ExpansionPlan>,
    ) -> Resolved {
        let p = &self.pipeline;
        let max_attempts = self.config.max_expansion_attempts;

        states.push(TurnState::Retrieve);
        let mut context = match p.cache.get_context(needs).await {
            Some(hit) => {
                debug!(similarity = hit.similarity, exact = hit.exact, "context served from cache");
                let mut context = hit.context;
                context.provenance.attempt = 1;
                context.provenance.from_cache = true;
                context
            }
            None => {
                let filters = p.retriever.initial_filters(needs);
                p.retriever.retrieve_at(needs, &filters, 1, now).await
            }
        };

        let mut best: Option<(FusedContext, SufficiencyEvaluation)> = None;
        let (context, evaluation) = loop {
            states.push(TurnState::Evaluate);
            let evaluation = p.evaluator.evaluate(needs, &context).await;
            let sequence = context.provenance.attempt;
            rounds.push(Round {
                sequence,
                evaluation: evaluation.clone(),
                result_count: context.total_results(),
                from_cache: context.provenance.from_cache,
            });

            if evaluation.is_sufficient() {
                debug!(sequence, score = evaluation.score, "context sufficient");
                return Resolved {
                    context,
                    evaluation,
                    low_confidence: false,
                };
            }

            // Ties keep the earlier round.
            let leader = match best.take() {
                Some((c, e)) if e.score >= evaluation.score => (c, e),
                _ => (context.clone(), evaluation.clone()),
            };

            let attempt = expansions.len() as u32 + 1;
            if attempt > max_attempts {
                break leader;
            }
            best = Some(leader);

            states.push(TurnState::Expand);
            let plan = p
                .expander
                .plan(&context.provenance.filters, &evaluation.gaps, attempt, now);
            debug!(
                attempt,
                strategy = %plan.strategy,
                focus = %plan.focus,
                score = evaluation.score,
                "expanding context"
            );
            states.push(TurnState::Retrieve);
            context = p
                .retriever
                .retrieve_at(needs, &plan.filters, attempt + 1, now)
                .await;
            expansions.push(plan);
        };

        warn!(
            attempts = expansions.len(),
            score = evaluation.score,
            "attempt cap reached, answering with low confidence"
        );
        Resolved {
            context,
            evaluation,
            low_confidence: true,
        }
    }

    async fn persist(&self, session_id: &str, snapshot: &mut SessionSnapshot, turn: ConversationTurn) {
        let p = &self.pipeline;
        if let Err(e) = p.sessions.append_turn(session_id, &turn).await {
            warn!(session_id, turn_index = turn.turn_index, error = %e, "turn log append failed");
        }
        snapshot.next_turn_index = turn.turn_index + 1;
        snapshot.turns.push(turn);

        let ttl = std::time::Duration::from_secs(self.config.session_ttl_secs);
        if let Err(e) = p.sessions.put_snapshot(session_id, snapshot, ttl).await {
            warn!(session_id, error = %e, "session snapshot write failed");
        }
    }

    /// Drop cached entries for `user_id` after its upstream data changed.
    pub async fn invalidate_user(&self, user_id: &str) -> usize {
        let removed = self.pipeline.cache.invalidate_user(user_id).await;
        info!(user_id, removed, "user cache invalidated");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_display_lowercase() {
        let labels: Vec<String> = [
            TurnState::Analyze,
            TurnState::Retrieve,
            TurnState::Evaluate,
            TurnState::Expand,
            TurnState::Generate,
            TurnState::Error,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            labels,
            ["analyze", "retrieve", "evaluate", "expand", "generate", "error"]
        );
    }

    #[test]
    fn expansion_attempts_counts_plans() {
        let outcome = TurnOutcome {
            response: String::new(),
            session_id: "s1".into(),
            turn_index: 0,
            intent: Intent::SearchContent,
            sufficiency_score: 0.9,
            rounds: vec![],
            expansions: vec![],
            states: vec![TurnState::Analyze],
            low_confidence: false,
            errored: false,
            from_response_cache: false,
            compressed: false,
        };
        assert_eq!(outcome.expansion_attempts(), 0);
    }
}
