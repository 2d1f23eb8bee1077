// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalating filter relaxation between retrieval rounds.

use chrono::{DateTime, Duration, Utc};
use sift_config::model::ExpansionConfig;
use sift_core::context::RetrievalFilters;
use sift_core::evaluation::{
    ExpansionFocus, ExpansionPlan, ExpansionStrategy, GapKind, Modification,
};
use tracing::debug;

/// Plans how the next retrieval round relaxes the current filters.
#[derive(Debug, Clone)]
pub struct ContextExpander {
    config: ExpansionConfig,
}

impl ContextExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    /// Plan expansion attempt `attempt` (1-indexed) from the filters of the
    /// previous round and the gaps it left.
    pub fn plan(
        &self,
        filters: &RetrievalFilters,
        gaps: &[GapKind],
        attempt: u32,
        now: DateTime<Utc>,
    ) -> ExpansionPlan {
        let dominant = dominant_gap(gaps);
        let focus = ExpansionFocus::from_gap(dominant);
        let strategy = ExpansionStrategy::for_attempt(attempt);

        let mut next = filters.clone();
        let mut modifications = Vec::new();
        match strategy {
            ExpansionStrategy::TargetedExpansion => {
                self.targeted(&mut next, &mut modifications, focus, now)
            }
            ExpansionStrategy::BroadExpansion => self.broad(&mut next, &mut modifications, now),
            ExpansionStrategy::ExhaustiveExpansion => self.exhaustive(&mut next, &mut modifications),
        }

        debug!(
            attempt,
            strategy = %strategy,
            focus = %focus,
            modifications = modifications.len(),
            "expansion planned"
        );

        ExpansionPlan {
            attempt,
            strategy,
            focus,
            modifications,
            filters: next,
        }
    }

    /// Change only the filter tied to the dominant gap.
    fn targeted(
        &self,
        filters: &mut RetrievalFilters,
        mods: &mut Vec<Modification>,
        focus: ExpansionFocus,
        now: DateTime<Utc>,
    ) {
        match focus {
            ExpansionFocus::TemporalFirst if filters.time_range.is_some() => {
                self.widen(filters, mods, self.config.targeted_time_factor, None, now);
            }
            ExpansionFocus::EntityFirst if !filters.entities.is_empty() => {
                filters.entities.clear();
                mods.push(Modification::DropEntityFilter);
            }
            ExpansionFocus::PlatformFirst if !filters.platforms.is_empty() => {
                filters.platforms.clear();
                mods.push(Modification::DropPlatformFilter);
            }
            // Nothing specific left to relax.
            _ => self.raise_limits(filters, mods, self.config.limit_multiplier),
        }
    }

    /// Larger time window, no platform filter, raised limits.
    fn broad(&self, filters: &mut RetrievalFilters, mods: &mut Vec<Modification>, now: DateTime<Utc>) {
        if filters.time_range.is_some() {
            let min_span = Duration::days(self.config.default_window_days);
            self.widen(filters, mods, self.config.broad_time_factor, Some(min_span), now);
        }
        if !filters.platforms.is_empty() {
            filters.platforms.clear();
            mods.push(Modification::DropPlatformFilter);
        }
        self.raise_limits(filters, mods, self.config.limit_multiplier);
    }

    /// Drop every filter and search with maximal candidate limits.
    fn exhaustive(&self, filters: &mut RetrievalFilters, mods: &mut Vec<Modification>) {
        if filters.time_range.take().is_some() {
            mods.push(Modification::DropTimeRange);
        }
        if !filters.platforms.is_empty() {
            filters.platforms.clear();
            mods.push(Modification::DropPlatformFilter);
        }
        if !filters.entities.is_empty() {
            filters.entities.clear();
            mods.push(Modification::DropEntityFilter);
        }
        filters.vector_top_k = self.config.max_vector_top_k;
        filters.event_limit = self.config.max_event_limit;
        filters.action_limit = self.config.max_action_limit;
        mods.push(Modification::RaiseLimits {
            vector_top_k: filters.vector_top_k,
            event_limit: filters.event_limit,
            action_limit: filters.action_limit,
        });
    }

    fn widen(
        &self,
        filters: &mut RetrievalFilters,
        mods: &mut Vec<Modification>,
        factor: f64,
        min_span: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        let Some(from) = filters.time_range.clone() else {
            return;
        };
        let mut to = from.widen(factor, now);
        if let Some(min_span) = min_span
            && to.duration() < min_span
        {
            to.start = to.end - min_span;
        }
        filters.time_range = Some(to.clone());
        mods.push(Modification::WidenTimeRange {
            factor,
            from: Some(from),
            to,
        });
    }

    fn raise_limits(
        &self,
        filters: &mut RetrievalFilters,
        mods: &mut Vec<Modification>,
        multiplier: usize,
    ) {
        let m = multiplier.max(1);
        filters.vector_top_k = (filters.vector_top_k * m).min(self.config.max_vector_top_k);
        filters.event_limit = (filters.event_limit * m).min(self.config.max_event_limit);
        filters.action_limit = (filters.action_limit * m).min(self.config.max_action_limit);
        mods.push(Modification::RaiseLimits {
            vector_top_k: filters.vector_top_k,
            event_limit: filters.event_limit,
            action_limit: filters.action_limit,
        });
    }
}

/// Most urgent gap by fixed priority; volume when nothing was named.
pub fn dominant_gap(gaps: &[GapKind]) -> GapKind {
    gaps.iter()
        .copied()
        .min_by_key(GapKind::priority)
        .unwrap_or(GapKind::InsufficientResults)
}
