// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learned system parameters and their single-writer store.
//!
//! Readers take a lock-free snapshot through [`ParameterStore::snapshot`].
//! Writers are serialized behind one async mutex; every write is clamped to
//! the bound table, published atomically, and appended to the optimization
//! history.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

pub const SUFFICIENCY_THRESHOLD_BOUNDS: (f64, f64) = (0.5, 0.9);
pub const RETRIEVAL_WEIGHT_BOUNDS: (f64, f64) = (0.05, 0.8);
pub const EXPANSION_THRESHOLD_BOUNDS: (f64, f64) = (0.2, 0.8);
pub const TTL_MULTIPLIER_BOUNDS: (f64, f64) = (0.25, 4.0);
pub const RRF_K_BOUNDS: (f64, f64) = (10.0, 120.0);

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

/// Per-channel fusion weights. Always sum to 1 after [`RetrievalWeights::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalWeights {
    pub vector: f64,
    pub event: f64,
    pub action: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            vector: 0.4,
            event: 0.35,
            action: 0.25,
        }
    }
}

impl RetrievalWeights {
    pub fn sum(&self) -> f64 {
        self.vector + self.event + self.action
    }

    /// Rescale so the three sum to 1 with every weight inside its bound.
    ///
    /// A weight that would cross a bound while rescaling is pinned there and
    /// the remainder is shared among the others in proportion.
    pub fn normalize(&mut self) {
        let (lo, hi) = RETRIEVAL_WEIGHT_BOUNDS;
        let mut w = [self.vector, self.event, self.action].map(|v| clamp(v, (lo, hi)));
        let mut pinned = [false; 3];

        for _ in 0..w.len() {
            let pinned_sum: f64 = (0..3).filter(|&i| pinned[i]).map(|i| w[i]).sum();
            let free_sum: f64 = (0..3).filter(|&i| !pinned[i]).map(|i| w[i]).sum();
            if free_sum <= 0.0 {
                break;
            }
            let scale = (1.0 - pinned_sum) / free_sum;
            let mut crossed = false;
            let snapshot = pinned;
            for i in (0..3).filter(|&i| !snapshot[i]) {
                let scaled = w[i] * scale;
                if scaled > hi || scaled < lo {
                    w[i] = scaled.clamp(lo, hi);
                    pinned[i] = true;
                    crossed = true;
                }
            }
            if !crossed {
                for i in (0..3).filter(|&i| !pinned[i]) {
                    w[i] *= scale;
                }
                break;
            }
        }

        [self.vector, self.event, self.action] = w;
    }
}

/// Sub-thresholds below which an evaluation dimension is reported as a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpansionThresholds {
    pub entity_coverage: f64,
    pub temporal_relevance: f64,
    pub platform_diversity: f64,
    pub result_volume: f64,
}

impl Default for ExpansionThresholds {
    fn default() -> Self {
        Self {
            entity_coverage: 0.5,
            temporal_relevance: 0.5,
            platform_diversity: 0.5,
            result_volume: 0.3,
        }
    }
}

/// Scale factors applied to each cache store's base TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheTtlMultipliers {
    pub query: f64,
    pub context: f64,
    pub embedding: f64,
    pub response: f64,
}

impl Default for CacheTtlMultipliers {
    fn default() -> Self {
        Self {
            query: 1.0,
            context: 1.0,
            embedding: 1.0,
            response: 1.0,
        }
    }
}

/// The tunable knobs adjusted by the learning optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// Incremented on every published change.
    pub version: u64,
    pub sufficiency_threshold: f64,
    pub retrieval_weights: RetrievalWeights,
    pub expansion_thresholds: ExpansionThresholds,
    pub cache_ttl_multipliers: CacheTtlMultipliers,
    pub rrf_k: f64,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            version: 0,
            sufficiency_threshold: 0.7,
            retrieval_weights: RetrievalWeights::default(),
            expansion_thresholds: ExpansionThresholds::default(),
            cache_ttl_multipliers: CacheTtlMultipliers::default(),
            rrf_k: 60.0,
        }
    }
}

impl SystemParameters {
    /// Force every value into the bound table and renormalize the weights.
    pub fn clamp_to_bounds(&mut self) {
        self.sufficiency_threshold =
            clamp(self.sufficiency_threshold, SUFFICIENCY_THRESHOLD_BOUNDS);
        self.retrieval_weights.normalize();

        let t = &mut self.expansion_thresholds;
        t.entity_coverage = clamp(t.entity_coverage, EXPANSION_THRESHOLD_BOUNDS);
        t.temporal_relevance = clamp(t.temporal_relevance, EXPANSION_THRESHOLD_BOUNDS);
        t.platform_diversity = clamp(t.platform_diversity, EXPANSION_THRESHOLD_BOUNDS);
        t.result_volume = clamp(t.result_volume, EXPANSION_THRESHOLD_BOUNDS);

        let m = &mut self.cache_ttl_multipliers;
        m.query = clamp(m.query, TTL_MULTIPLIER_BOUNDS);
        m.context = clamp(m.context, TTL_MULTIPLIER_BOUNDS);
        m.embedding = clamp(m.embedding, TTL_MULTIPLIER_BOUNDS);
        m.response = clamp(m.response, TTL_MULTIPLIER_BOUNDS);

        self.rrf_k = clamp(self.rrf_k, RRF_K_BOUNDS);
    }

    /// Flattened `(name, value)` view used for change diffs.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("sufficiency_threshold", self.sufficiency_threshold),
            ("retrieval_weights.vector", self.retrieval_weights.vector),
            ("retrieval_weights.event", self.retrieval_weights.event),
            ("retrieval_weights.action", self.retrieval_weights.action),
            (
                "expansion_thresholds.entity_coverage",
                self.expansion_thresholds.entity_coverage,
            ),
            (
                "expansion_thresholds.temporal_relevance",
                self.expansion_thresholds.temporal_relevance,
            ),
            (
                "expansion_thresholds.platform_diversity",
                self.expansion_thresholds.platform_diversity,
            ),
            (
                "expansion_thresholds.result_volume",
                self.expansion_thresholds.result_volume,
            ),
            ("cache_ttl_multipliers.query", self.cache_ttl_multipliers.query),
            (
                "cache_ttl_multipliers.context",
                self.cache_ttl_multipliers.context,
            ),
            (
                "cache_ttl_multipliers.embedding",
                self.cache_ttl_multipliers.embedding,
            ),
            (
                "cache_ttl_multipliers.response",
                self.cache_ttl_multipliers.response,
            ),
            ("rrf_k", self.rrf_k),
        ]
    }
}

/// One parameter value changed by an optimization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub name: String,
    pub old: f64,
    pub new: f64,
}

/// Append-only record of a published parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub changes: Vec<ParameterChange>,
}

/// Values smaller than this are not reported as changes.
const CHANGE_EPSILON: f64 = 1e-9;

/// Shared, atomically published [`SystemParameters`].
pub struct ParameterStore {
    current: ArcSwap<SystemParameters>,
    history: Mutex<Vec<OptimizationRecord>>,
}

impl ParameterStore {
    /// Create a store seeded with `initial`, clamped to the bound table.
    pub fn new(mut initial: SystemParameters) -> Self {
        initial.clamp_to_bounds();
        Self {
            current: ArcSwap::from_pointee(initial),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Immutable snapshot of the current parameters.
    pub fn snapshot(&self) -> Arc<SystemParameters> {
        self.current.load_full()
    }

    /// Apply `update` under the writer lock.
    ///
    /// The result is clamped, and published with a bumped version only if at
    /// least one value changed. Returns the history record for a published
    /// change.
    pub async fn apply<F>(&self, reason: &str, update: F) -> Option<OptimizationRecord>
    where
        F: FnOnce(&mut SystemParameters),
    {
        let mut history = self.history.lock().await;
        let before = self.current.load_full();
        let mut next = (*before).clone();
        update(&mut next);
        next.clamp_to_bounds();

        let changes: Vec<ParameterChange> = before
            .entries()
            .into_iter()
            .zip(next.entries())
            .filter(|((_, old), (_, new))| (old - new).abs() > CHANGE_EPSILON)
            .map(|((name, old), (_, new))| ParameterChange {
                name: name.to_string(),
                old,
                new,
            })
            .collect();

        if changes.is_empty() {
            return None;
        }

        next.version = before.version + 1;
        let record = OptimizationRecord {
            version: next.version,
            timestamp: Utc::now(),
            reason: reason.to_string(),
            changes,
        };
        debug!(
            version = next.version,
            changes = record.changes.len(),
            reason,
            "publishing parameter update"
        );
        self.current.store(Arc::new(next));
        history.push(record.clone());
        Some(record)
    }

    /// Copy of the optimization history, oldest first.
    pub async fn history(&self) -> Vec<OptimizationRecord> {
        self.history.lock().await.clone()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(SystemParameters::default())
    }
}
