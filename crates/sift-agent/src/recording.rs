// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and per-turn recording helpers.
//!
//! Everything goes through the `metrics` facade; installing a recorder is
//! left to the embedding application.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register descriptions for every metric the engine emits.
pub fn register_metrics() {
    describe_counter!("sift_turns_total", "Completed turns by intent and outcome");
    describe_histogram!("sift_turn_latency_seconds", "End-to-end turn latency in seconds");
    describe_histogram!(
        "sift_expansion_attempts",
        "Expansion rounds run per turn after the initial retrieval"
    );
    describe_counter!("sift_cache_hits_total", "Cache hits by store");
    describe_counter!("sift_cache_misses_total", "Cache misses by store");
    describe_counter!("sift_cache_evictions_total", "Cache evictions by store");
    describe_counter!("sift_quality_issues_total", "Quality issues flagged by kind");
    describe_counter!(
        "sift_learning_dropped_total",
        "Learning records dropped because the queue was full"
    );
    describe_counter!("sift_parameter_updates_total", "Published parameter updates");
    describe_gauge!("sift_active_sessions", "Sessions with a live lock entry");
}

pub fn record_turn(intent: &str, outcome: &str, latency_secs: f64, expansion_attempts: u32) {
    metrics::counter!(
        "sift_turns_total",
        "intent" => intent.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("sift_turn_latency_seconds").record(latency_secs);
    metrics::histogram!("sift_expansion_attempts").record(f64::from(expansion_attempts));
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("sift_active_sessions").set(count as f64);
}
