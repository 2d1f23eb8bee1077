// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluator that replays scripted scores and gaps.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sift_core::context::FusedContext;
use sift_core::evaluation::{DimensionScores, GapKind, Sufficiency, SufficiencyEvaluation};
use sift_core::types::InformationNeeds;
use sift_sufficiency::ContextEvaluator;

/// Each evaluation pops the next `(score, gaps)` pair; once the script runs
/// out the last pair repeats.
pub struct ScriptedEvaluator {
    threshold: f64,
    script: Mutex<VecDeque<(f64, Vec<GapKind>)>>,
    last: Mutex<Option<(f64, Vec<GapKind>)>>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new(threshold: f64, script: Vec<(f64, Vec<GapKind>)>) -> Self {
        Self {
            threshold,
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always scores `score` with no gaps.
    pub fn constant(threshold: f64, score: f64) -> Self {
        Self::new(threshold, vec![(score, Vec::new())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> (f64, Vec<GapKind>) {
        let popped = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(step) = popped {
            *last = Some(step);
        }
        last.clone().unwrap_or((0.0, vec![GapKind::InsufficientResults]))
    }
}

#[async_trait]
impl ContextEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        _needs: &InformationNeeds,
        _context: &FusedContext,
    ) -> SufficiencyEvaluation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (score, gaps) = self.next();
        let outcome = if score >= self.threshold {
            Sufficiency::Sufficient
        } else {
            Sufficiency::Insufficient { gaps: gaps.clone() }
        };
        SufficiencyEvaluation {
            score,
            dimensions: DimensionScores {
                entity_coverage: score,
                temporal_relevance: score,
                platform_diversity: score,
                result_volume: score,
                llm_judgment: None,
            },
            gaps: if score >= self.threshold { Vec::new() } else { gaps },
            missing_elements: Vec::new(),
            outcome,
        }
    }
}
