// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel score adjustment: recency decay, entity and platform boosts.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sift_config::model::RetrievalConfig;
use sift_core::context::SearchResult;
use sift_core::types::{Entity, Platform};

/// Inputs to [`rank`] that stay fixed for one retrieval round.
#[derive(Debug, Clone)]
pub struct RankingContext<'a> {
    pub entities: &'a [Entity],
    pub requested_platforms: &'a BTreeSet<Platform>,
    pub now: DateTime<Utc>,
    pub decay_rate: f64,
    pub entity_boost: f64,
    pub platform_boost: f64,
}

impl<'a> RankingContext<'a> {
    pub fn new(
        config: &RetrievalConfig,
        entities: &'a [Entity],
        requested_platforms: &'a BTreeSet<Platform>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entities,
            requested_platforms,
            now,
            decay_rate: config.decay_rate,
            entity_boost: config.entity_boost,
            platform_boost: config.platform_boost,
        }
    }

    /// Adjusted score for one result.
    pub fn score(&self, result: &SearchResult) -> f64 {
        let age_hours = ((self.now - result.timestamp).num_seconds().max(0) as f64) / 3600.0;
        let recency = (-self.decay_rate * age_hours).exp();

        let entity_factor = 1.0
            + self
                .entities
                .iter()
                .filter(|e| result.mentions(e))
                .map(|e| self.entity_boost * e.confidence)
                .sum::<f64>();

        let platform_factor = match result.detail.platform() {
            Some(p) if self.requested_platforms.contains(&p) => self.platform_boost,
            _ => 1.0,
        };

        result.score * recency * entity_factor * platform_factor
    }
}

/// Rescore `results` in place, sort descending and keep at most `limit`.
///
/// Ties keep a deterministic order by id.
pub fn rank(results: &mut Vec<SearchResult>, ctx: &RankingContext<'_>, limit: usize) {
    for r in results.iter_mut() {
        r.score = ctx.score(r);
    }
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
}
