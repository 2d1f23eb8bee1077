// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn quality records, issue detection and the learning queue.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sift_core::evaluation::GapKind;
use sift_core::types::{Feedback, Intent};
use strum::{Display, EnumString};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Responses slower than this are flagged.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(2);
/// Final sufficiency scores below this are flagged.
pub const LOW_SUFFICIENCY: f64 = 0.6;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    SlowResponse,
    LowSufficiency,
    HighExpansionRate,
    ErrorOccurred,
    LowConfidence,
}

/// What the orchestrator reports about one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnQuality {
    pub session_id: String,
    pub intent: Intent,
    pub response_time: Duration,
    pub sufficiency_score: f64,
    /// Retrieval/evaluation rounds beyond the first.
    pub expansion_attempts: u32,
    pub gaps: Vec<GapKind>,
    pub low_confidence: bool,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TurnQuality {
    /// Issues flagged by the fixed thresholds.
    pub fn issues(&self) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        if self.response_time > SLOW_RESPONSE {
            issues.push(QualityIssue::SlowResponse);
        }
        if self.sufficiency_score < LOW_SUFFICIENCY {
            issues.push(QualityIssue::LowSufficiency);
        }
        if self.expansion_attempts > 1 {
            issues.push(QualityIssue::HighExpansionRate);
        }
        if self.error.is_some() {
            issues.push(QualityIssue::ErrorOccurred);
        }
        if self.low_confidence {
            issues.push(QualityIssue::LowConfidence);
        }
        issues
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.low_confidence
    }
}

/// An entry on the learning queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearningRecord {
    Turn(TurnQuality),
    Feedback(Feedback),
}

/// Rolling aggregate for one intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentStats {
    pub turns: u64,
    pub successes: u64,
    pub sufficiency_sum: f64,
    pub latency_sum_secs: f64,
}

impl IntentStats {
    pub fn record(&mut self, quality: &TurnQuality) {
        self.turns += 1;
        if quality.succeeded() {
            self.successes += 1;
        }
        self.sufficiency_sum += quality.sufficiency_score;
        self.latency_sum_secs += quality.response_time.as_secs_f64();
    }

    pub fn success_rate(&self) -> f64 {
        if self.turns == 0 {
            return 0.0;
        }
        self.successes as f64 / self.turns as f64
    }

    pub fn average_sufficiency(&self) -> f64 {
        if self.turns == 0 {
            return 0.0;
        }
        self.sufficiency_sum / self.turns as f64
    }

    pub fn average_latency_secs(&self) -> f64 {
        if self.turns == 0 {
            return 0.0;
        }
        self.latency_sum_secs / self.turns as f64
    }
}

/// Records turn quality and feedback, and feeds the learning queue.
///
/// Recording never waits: when the bounded queue is full the new record is
/// dropped and counted.
pub struct QualityMetrics {
    tx: mpsc::Sender<LearningRecord>,
    by_intent: DashMap<Intent, IntentStats>,
    dropped: AtomicU64,
}

impl QualityMetrics {
    /// A recorder with a queue of `capacity` records (minimum 1), and the
    /// receiving end for the optimizer.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LearningRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let metrics = Self {
            tx,
            by_intent: DashMap::new(),
            dropped: AtomicU64::new(0),
        };
        (metrics, rx)
    }

    /// Record a completed turn. Returns the issues it was flagged with.
    pub fn record_turn(&self, quality: TurnQuality) -> Vec<QualityIssue> {
        let issues = quality.issues();
        self.by_intent
            .entry(quality.intent)
            .or_default()
            .record(&quality);
        for issue in &issues {
            metrics::counter!("sift_quality_issues_total", "issue" => issue.to_string())
                .increment(1);
        }
        debug!(
            session_id = %quality.session_id,
            intent = %quality.intent,
            score = quality.sufficiency_score,
            issues = ?issues,
            "turn quality recorded"
        );
        self.enqueue(LearningRecord::Turn(quality));
        issues
    }

    pub fn record_feedback(&self, feedback: Feedback) {
        debug!(
            session_id = %feedback.session_id,
            helpful = feedback.helpful,
            "feedback recorded"
        );
        self.enqueue(LearningRecord::Feedback(feedback));
    }

    fn enqueue(&self, record: LearningRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("sift_learning_dropped_total").increment(1);
                warn!("learning queue full, dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("sift_learning_dropped_total").increment(1);
                debug!("learning queue closed, dropping record");
            }
        }
    }

    /// Records dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy of the rolling per-intent aggregates.
    pub fn intent_summary(&self) -> BTreeMap<Intent, IntentStats> {
        self.by_intent
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }
}
