// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic batch learning over the quality queue.
//!
//! Each pass drains up to `batch_size` records, summarizes them, and nudges
//! the shared [`SystemParameters`] by small additive steps scaled by the
//! learning rate. Bounds are enforced by [`ParameterStore::apply`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sift_config::model::LearningConfig;
use sift_core::evaluation::GapKind;
use sift_core::params::{OptimizationRecord, ParameterStore, SystemParameters};
use sift_core::types::Intent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::quality::{IntentStats, LearningRecord, QualityIssue};

/// Gap share treated as normal; more frequent gaps lower their sub-threshold.
const TARGET_GAP_RATE: f64 = 0.25;
/// An intent succeeding less often than this pulls the threshold up.
const INTENT_SUCCESS_FLOOR: f64 = 0.5;
/// Turns an intent needs in a batch before its success rate counts.
const INTENT_MIN_TURNS: u64 = 3;

/// Aggregate view of one drained batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub turns: u64,
    pub issue_counts: BTreeMap<QualityIssue, u64>,
    pub gap_counts: BTreeMap<GapKind, u64>,
    pub per_intent: BTreeMap<Intent, IntentStats>,
    pub average_sufficiency: f64,
    pub feedback_count: u64,
    pub average_relevance: f64,
    pub average_completeness: f64,
    pub helpful_rate: f64,
}

impl BatchSummary {
    pub fn from_records(records: &[LearningRecord]) -> Self {
        let mut summary = BatchSummary::default();
        let mut sufficiency_sum = 0.0;
        let mut relevance_sum = 0.0;
        let mut completeness_sum = 0.0;
        let mut helpful = 0u64;

        for record in records {
            match record {
                LearningRecord::Turn(q) => {
                    summary.turns += 1;
                    sufficiency_sum += q.sufficiency_score;
                    for issue in q.issues() {
                        *summary.issue_counts.entry(issue).or_default() += 1;
                    }
                    for gap in &q.gaps {
                        *summary.gap_counts.entry(*gap).or_default() += 1;
                    }
                    summary.per_intent.entry(q.intent).or_default().record(q);
                }
                LearningRecord::Feedback(f) => {
                    summary.feedback_count += 1;
                    relevance_sum += f.relevance_score;
                    completeness_sum += f.completeness_score;
                    if f.helpful {
                        helpful += 1;
                    }
                }
            }
        }

        if summary.turns > 0 {
            summary.average_sufficiency = sufficiency_sum / summary.turns as f64;
        }
        if summary.feedback_count > 0 {
            let n = summary.feedback_count as f64;
            summary.average_relevance = relevance_sum / n;
            summary.average_completeness = completeness_sum / n;
            summary.helpful_rate = helpful as f64 / n;
        }
        summary
    }

    /// Share of turns flagged with `issue`.
    pub fn issue_rate(&self, issue: QualityIssue) -> f64 {
        self.rate(self.issue_counts.get(&issue).copied().unwrap_or(0))
    }

    /// Share of turns that reported `gap` at least once.
    pub fn gap_rate(&self, gap: GapKind) -> f64 {
        self.rate(self.gap_counts.get(&gap).copied().unwrap_or(0))
    }

    /// Lowest success rate among intents with at least `INTENT_MIN_TURNS`
    /// turns in the batch.
    pub fn worst_intent_success(&self) -> Option<(Intent, f64)> {
        self.per_intent
            .iter()
            .filter(|(_, stats)| stats.turns >= INTENT_MIN_TURNS)
            .map(|(intent, stats)| (*intent, stats.success_rate()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn rate(&self, count: u64) -> f64 {
        if self.turns == 0 {
            return 0.0;
        }
        (count as f64 / self.turns as f64).min(1.0)
    }
}

/// Apply one batch's adjustments to `p`. Values may leave their bounds
/// here; the store clamps before publishing.
pub fn adjust(p: &mut SystemParameters, s: &BatchSummary, learning_rate: f64) {
    let lr = learning_rate.max(0.0);
    let expansion = s.issue_rate(QualityIssue::HighExpansionRate);
    let slow = s.issue_rate(QualityIssue::SlowResponse);
    let low_sufficiency = s.issue_rate(QualityIssue::LowSufficiency);
    let errors = s.issue_rate(QualityIssue::ErrorOccurred);

    // Threshold: expand less when turns are slow or keep expanding, demand
    // more when answers come back thin without expansion or are rated unhelpful.
    let mut threshold_step = 0.0;
    if slow > 0.2 || expansion > 0.5 {
        threshold_step -= 0.1;
    }
    if low_sufficiency > 0.3 && expansion < 0.2 {
        threshold_step += 0.1;
    }
    if s.feedback_count > 0 {
        if s.helpful_rate < 0.5 {
            threshold_step += 0.1;
        } else if s.helpful_rate > 0.8 && expansion > 0.3 {
            threshold_step -= 0.1;
        }
    }
    // One intent failing is hidden by the batch averages; demand more
    // context before answering.
    if let Some((intent, rate)) = s.worst_intent_success()
        && rate < INTENT_SUCCESS_FLOOR
    {
        debug!(%intent, success_rate = rate, "intent below success floor");
        threshold_step += 0.1;
    }
    p.sufficiency_threshold += lr * threshold_step;

    // Weights move toward the channel that fills the most frequent gaps.
    let w = &mut p.retrieval_weights;
    let vector_need = s.gap_rate(GapKind::EntityCoverage) + s.gap_rate(GapKind::LowOverallRelevance);
    let event_need = s.gap_rate(GapKind::TemporalCoverage) + s.gap_rate(GapKind::PlatformDiversity);
    let action_need = s.gap_rate(GapKind::InsufficientResults);
    let mean_need = (vector_need + event_need + action_need) / 3.0;
    w.vector += lr * 0.1 * (vector_need - mean_need);
    w.event += lr * 0.1 * (event_need - mean_need);
    w.action += lr * 0.1 * (action_need - mean_need);

    let t = &mut p.expansion_thresholds;
    t.entity_coverage += lr * 0.2 * (TARGET_GAP_RATE - s.gap_rate(GapKind::EntityCoverage));
    t.temporal_relevance += lr * 0.2 * (TARGET_GAP_RATE - s.gap_rate(GapKind::TemporalCoverage));
    t.platform_diversity += lr * 0.2 * (TARGET_GAP_RATE - s.gap_rate(GapKind::PlatformDiversity));
    t.result_volume += lr * 0.2 * (TARGET_GAP_RATE - s.gap_rate(GapKind::InsufficientResults));

    // Keep good answers longer; expire doubtful ones sooner.
    let m = &mut p.cache_ttl_multipliers;
    if s.turns > 0 && s.average_sufficiency >= 0.8 && errors < 0.05 {
        m.context += lr * 0.5;
        m.response += lr * 0.5;
        m.query += lr * 0.25;
    } else if low_sufficiency > 0.3 {
        m.context -= lr * 0.5;
    }
    if s.feedback_count > 0 && s.helpful_rate < 0.5 {
        m.response -= lr * 0.5;
    }
    if slow > 0.2 {
        m.embedding += lr * 0.25;
    }

    // Flatter fusion when ranking keeps missing.
    if expansion > 0.5 {
        p.rrf_k += lr * 10.0;
    } else if s.turns > 0 && s.average_sufficiency >= 0.8 {
        p.rrf_k -= lr * 5.0;
    }
}

/// Background learner over the quality queue.
pub struct LearningOptimizer {
    config: LearningConfig,
    params: Arc<ParameterStore>,
    rx: mpsc::Receiver<LearningRecord>,
    /// Records drained by passes that had too few turns, carried forward.
    pending: Vec<LearningRecord>,
}

impl LearningOptimizer {
    pub fn new(
        config: LearningConfig,
        params: Arc<ParameterStore>,
        rx: mpsc::Receiver<LearningRecord>,
    ) -> Self {
        Self {
            config,
            params,
            rx,
            pending: Vec::new(),
        }
    }

    /// Up to `batch_size` queued records, without waiting.
    pub fn drain_batch(&mut self) -> Vec<LearningRecord> {
        self.drain(self.config.batch_size)
    }

    /// Records carried over from passes below `min_batch`.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self, limit: usize) -> Vec<LearningRecord> {
        let mut batch = Vec::new();
        while batch.len() < limit {
            match self.rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }
        batch
    }

    /// One optimization pass. Returns the published update, if any.
    ///
    /// A batch with fewer than `min_batch` turn records is kept and merged
    /// into the next pass. A batch that reached `batch_size` records is
    /// always used.
    pub async fn step(&mut self) -> Option<OptimizationRecord> {
        let room = self.config.batch_size.saturating_sub(self.pending.len());
        let fresh = self.drain(room);
        self.pending.extend(fresh);

        let summary = BatchSummary::from_records(&self.pending);
        let full = self.pending.len() >= self.config.batch_size;
        if summary.turns < self.config.min_batch as u64 && !full {
            debug!(
                records = self.pending.len(),
                turns = summary.turns,
                "learning batch too small, carrying over"
            );
            return None;
        }
        self.pending.clear();

        let reason = format!(
            "batch of {} turns, {} feedback, avg sufficiency {:.3}",
            summary.turns, summary.feedback_count, summary.average_sufficiency
        );
        let lr = self.config.learning_rate;
        let record = self
            .params
            .apply(&reason, |p| adjust(p, &summary, lr))
            .await?;

        metrics::counter!("sift_parameter_updates_total").increment(1);
        info!(
            version = record.version,
            changes = record.changes.len(),
            turns = summary.turns,
            "parameters updated"
        );
        Some(record)
    }

    /// Run passes on the configured interval until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "learning optimizer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("learning optimizer stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.step().await;
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::tests::quality;
    use crate::quality::QualityMetrics;
    use proptest::prelude::*;
    use sift_core::params::SUFFICIENCY_THRESHOLD_BOUNDS;
    use sift_core::types::Feedback;

    fn config(min_batch: usize) -> LearningConfig {
        LearningConfig {
            min_batch,
            ..LearningConfig::default()
        }
    }

    #[tokio::test]
    async fn small_batches_leave_parameters_alone() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(config(10), params.clone(), rx);
        for _ in 0..5 {
            metrics.record_turn(quality(Intent::SearchContent, 0.3, 3));
        }
        assert!(optimizer.step().await.is_none());
        assert_eq!(params.snapshot().version, 0);
    }

    #[tokio::test]
    async fn small_batches_carry_over_into_the_next_pass() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(config(10), params.clone(), rx);

        for _ in 0..6 {
            metrics.record_turn(quality(Intent::QueryEvents, 0.75, 3));
        }
        metrics.record_feedback(Feedback {
            session_id: "s1".into(),
            relevance_score: 0.9,
            completeness_score: 0.9,
            helpful: true,
        });
        assert!(optimizer.step().await.is_none());
        assert_eq!(optimizer.pending(), 7);

        for _ in 0..6 {
            metrics.record_turn(quality(Intent::QueryEvents, 0.75, 3));
        }
        let record = optimizer.step().await.unwrap();
        assert_eq!(record.version, 1);
        assert!(record.reason.starts_with("batch of 12 turns, 1 feedback"));
        assert_eq!(optimizer.pending(), 0);
    }

    #[tokio::test]
    async fn a_full_batch_is_used_even_without_enough_turns() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(
            LearningConfig {
                batch_size: 4,
                min_batch: 10,
                ..LearningConfig::default()
            },
            params.clone(),
            rx,
        );
        metrics.record_turn(quality(Intent::SearchContent, 0.72, 0));
        for _ in 0..3 {
            metrics.record_feedback(Feedback {
                session_id: "s1".into(),
                relevance_score: 0.1,
                completeness_score: 0.1,
                helpful: false,
            });
        }
        assert!(optimizer.step().await.is_some());
        assert_eq!(optimizer.pending(), 0);
    }

    #[test]
    fn failing_intent_alone_raises_threshold() {
        let mut records = Vec::new();
        for _ in 0..5 {
            records.push(LearningRecord::Turn(quality(Intent::SearchContent, 0.75, 0)));
        }
        let healthy = BatchSummary::from_records(&records);
        for _ in 0..4 {
            let mut q = quality(Intent::QueryEvents, 0.75, 0);
            q.error = Some("generation failed".into());
            records.push(LearningRecord::Turn(q));
        }
        let mixed = BatchSummary::from_records(&records);
        assert_eq!(
            mixed.worst_intent_success(),
            Some((Intent::QueryEvents, 0.0))
        );

        let mut unchanged = SystemParameters::default();
        adjust(&mut unchanged, &healthy, 1.0);
        assert_eq!(unchanged.sufficiency_threshold, 0.7);

        let mut raised = SystemParameters::default();
        adjust(&mut raised, &mixed, 1.0);
        assert!(raised.sufficiency_threshold > 0.7);
        assert_eq!(raised.rrf_k, unchanged.rrf_k);
        assert_eq!(raised.retrieval_weights, unchanged.retrieval_weights);
    }

    #[test]
    fn intents_with_few_turns_do_not_count() {
        let mut q = quality(Intent::QueryEvents, 0.75, 0);
        q.error = Some("timeout".into());
        let s = BatchSummary::from_records(&[LearningRecord::Turn(q.clone()), LearningRecord::Turn(q)]);
        assert_eq!(s.worst_intent_success(), None);
    }

    #[tokio::test]
    async fn heavy_expansion_lowers_threshold_and_flattens_fusion() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(config(10), params.clone(), rx);
        for _ in 0..10 {
            let mut q = quality(Intent::QueryEvents, 0.75, 3);
            q.gaps = vec![GapKind::TemporalCoverage];
            metrics.record_turn(q);
        }

        let record = optimizer.step().await.unwrap();
        assert_eq!(record.version, 1);
        let p = params.snapshot();
        assert!(p.sufficiency_threshold < 0.7);
        assert!(p.rrf_k > 60.0);
        assert!(p.retrieval_weights.event > 0.35);
        assert!(p.expansion_thresholds.temporal_relevance < 0.5);
        assert!((p.retrieval_weights.sum() - 1.0).abs() < 1e-6);
        assert_eq!(params.history().await.len(), 1);
    }

    #[tokio::test]
    async fn unhelpful_feedback_raises_threshold() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(config(1), params.clone(), rx);
        metrics.record_turn(quality(Intent::SearchContent, 0.72, 0));
        for _ in 0..3 {
            metrics.record_feedback(Feedback {
                session_id: "s1".into(),
                relevance_score: 0.2,
                completeness_score: 0.1,
                helpful: false,
            });
        }
        optimizer.step().await.unwrap();
        let p = params.snapshot();
        assert!(p.sufficiency_threshold > 0.7);
        assert!(p.cache_ttl_multipliers.response < 1.0);
    }

    #[test]
    fn batch_summary_counts_issues_and_feedback() {
        let records = vec![
            LearningRecord::Turn(quality(Intent::QueryEvents, 0.5, 2)),
            LearningRecord::Turn(quality(Intent::QueryEvents, 0.9, 0)),
            LearningRecord::Feedback(Feedback {
                session_id: "s1".into(),
                relevance_score: 1.0,
                completeness_score: 0.5,
                helpful: true,
            }),
        ];
        let s = BatchSummary::from_records(&records);
        assert_eq!(s.turns, 2);
        assert_eq!(s.issue_rate(QualityIssue::LowSufficiency), 0.5);
        assert_eq!(s.issue_rate(QualityIssue::HighExpansionRate), 0.5);
        assert_eq!(s.feedback_count, 1);
        assert_eq!(s.helpful_rate, 1.0);
        assert!((s.average_sufficiency - 0.7).abs() < 1e-9);
        assert_eq!(s.per_intent[&Intent::QueryEvents].turns, 2);
    }

    #[test]
    fn drain_respects_batch_size() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        let mut optimizer = LearningOptimizer::new(
            LearningConfig {
                batch_size: 3,
                ..LearningConfig::default()
            },
            params,
            rx,
        );
        for _ in 0..5 {
            metrics.record_turn(quality(Intent::SearchContent, 0.8, 0));
        }
        assert_eq!(optimizer.drain_batch().len(), 3);
        assert_eq!(optimizer.drain_batch().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_on_cancel() {
        let params = Arc::new(ParameterStore::default());
        let (metrics, rx) = QualityMetrics::new(64);
        for _ in 0..10 {
            metrics.record_turn(quality(Intent::QueryEvents, 0.75, 3));
        }
        let cancel = CancellationToken::new();
        let handle = LearningOptimizer::new(config(10), params.clone(), rx).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(params.snapshot().version, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    proptest! {
        #[test]
        fn repeated_updates_stay_in_bounds(
            batches in proptest::collection::vec(
                proptest::collection::vec((0.0f64..=1.0, 0u32..4, any::<bool>(), 0usize..5), 1..20),
                1..30,
            ),
        ) {
            let mut p = SystemParameters::default();
            for batch in batches {
                let records: Vec<LearningRecord> = batch
                    .into_iter()
                    .map(|(score, attempts, low_confidence, gap)| {
                        let mut q = quality(Intent::SearchContent, score, attempts);
                        q.low_confidence = low_confidence;
                        q.gaps = vec![[
                            GapKind::TemporalCoverage,
                            GapKind::EntityCoverage,
                            GapKind::PlatformDiversity,
                            GapKind::InsufficientResults,
                            GapKind::LowOverallRelevance,
                        ][gap]];
                        LearningRecord::Turn(q)
                    })
                    .collect();
                let summary = BatchSummary::from_records(&records);
                adjust(&mut p, &summary, 1.0);
                p.clamp_to_bounds();

                prop_assert!(p.sufficiency_threshold >= SUFFICIENCY_THRESHOLD_BOUNDS.0);
                prop_assert!(p.sufficiency_threshold <= SUFFICIENCY_THRESHOLD_BOUNDS.1);
                prop_assert!((p.retrieval_weights.sum() - 1.0).abs() < 1e-6);
            }
        }
    }
}
