// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sufficiency evaluation results and context expansion plans.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::context::RetrievalFilters;
use crate::types::TimeRange;

/// A named deficiency in a fused context.
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
pub enum GapKind {
    TemporalCoverage,
    EntityCoverage,
    PlatformDiversity,
    InsufficientResults,
    LowOverallRelevance,
}

impl GapKind {
    /// Fixed priority used to pick the dominant gap (lower is more urgent).
    pub fn priority(&self) -> u8 {
        match self {
            GapKind::TemporalCoverage => 0,
            GapKind::EntityCoverage => 1,
            GapKind::PlatformDiversity => 2,
            GapKind::InsufficientResults => 3,
            GapKind::LowOverallRelevance => 4,
        }
    }
}

/// Independent per-dimension scores, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub entity_coverage: f64,
    pub temporal_relevance: f64,
    pub platform_diversity: f64,
    pub result_volume: f64,
    /// Present only when the LLM judgment succeeded.
    pub llm_judgment: Option<f64>,
}

impl DimensionScores {
    /// Mean of the four heuristic dimensions.
    pub fn heuristic_mean(&self) -> f64 {
        (self.entity_coverage + self.temporal_relevance + self.platform_diversity + self.result_volume)
            / 4.0
    }
}

/// Typed outcome of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Sufficiency {
    Sufficient,
    Insufficient { gaps: Vec<GapKind> },
}

/// The result of judging one fused context against the information needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyEvaluation {
    /// Overall score in [0, 1].
    pub score: f64,
    pub dimensions: DimensionScores,
    pub gaps: Vec<GapKind>,
    /// Missing-element notes reported by the LLM judgment.
    pub missing_elements: Vec<String>,
    pub outcome: Sufficiency,
}

impl SufficiencyEvaluation {
    pub fn is_sufficient(&self) -> bool {
        matches!(self.outcome, Sufficiency::Sufficient)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    TargetedExpansion,
    BroadExpansion,
    ExhaustiveExpansion,
}

impl ExpansionStrategy {
    /// Strategy for a 1-indexed expansion attempt.
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            0 | 1 => ExpansionStrategy::TargetedExpansion,
            2 => ExpansionStrategy::BroadExpansion,
            _ => ExpansionStrategy::ExhaustiveExpansion,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpansionFocus {
    TemporalFirst,
    EntityFirst,
    PlatformFirst,
    VolumeFirst,
}

impl ExpansionFocus {
    pub fn from_gap(gap: GapKind) -> Self {
        match gap {
            GapKind::TemporalCoverage => ExpansionFocus::TemporalFirst,
            GapKind::EntityCoverage => ExpansionFocus::EntityFirst,
            GapKind::PlatformDiversity => ExpansionFocus::PlatformFirst,
            GapKind::InsufficientResults | GapKind::LowOverallRelevance => {
                ExpansionFocus::VolumeFirst
            }
        }
    }
}

/// One change applied to the retrieval filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modification {
    WidenTimeRange {
        factor: f64,
        from: Option<TimeRange>,
        to: TimeRange,
    },
    DropTimeRange,
    DropEntityFilter,
    DropPlatformFilter,
    RaiseLimits {
        vector_top_k: usize,
        event_limit: usize,
        action_limit: usize,
    },
}

/// How the next retrieval round should differ from the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionPlan {
    pub attempt: u32,
    pub strategy: ExpansionStrategy,
    pub focus: ExpansionFocus,
    pub modifications: Vec<Modification>,
    pub filters: RetrievalFilters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_escalates_with_attempt() {
        assert_eq!(
            ExpansionStrategy::for_attempt(1),
            ExpansionStrategy::TargetedExpansion
        );
        assert_eq!(
            ExpansionStrategy::for_attempt(2),
            ExpansionStrategy::BroadExpansion
        );
        assert_eq!(
            ExpansionStrategy::for_attempt(7),
            ExpansionStrategy::ExhaustiveExpansion
        );
    }

    #[test]
    fn gap_labels_use_snake_case() {
        assert_eq!(GapKind::TemporalCoverage.to_string(), "temporal_coverage");
        assert_eq!(ExpansionFocus::TemporalFirst.to_string(), "temporal_first");
        assert_eq!(
            ExpansionStrategy::TargetedExpansion.to_string(),
            "targeted_expansion"
        );
    }

    #[test]
    fn heuristic_mean_ignores_llm_judgment() {
        let d = DimensionScores {
            entity_coverage: 1.0,
            temporal_relevance: 0.0,
            platform_diversity: 1.0,
            result_volume: 0.0,
            llm_judgment: Some(1.0),
        };
        assert!((d.heuristic_mean() - 0.5).abs() < f64::EPSILON);
    }
}
