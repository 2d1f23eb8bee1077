// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks ranges and cross-field constraints serde cannot express. All
//! errors are collected; validation never fails fast.

use sift_core::params::{
    EXPANSION_THRESHOLD_BOUNDS, RETRIEVAL_WEIGHT_BOUNDS, RRF_K_BOUNDS,
    SUFFICIENCY_THRESHOLD_BOUNDS, TTL_MULTIPLIER_BOUNDS,
};

use crate::diagnostic::ConfigError;
use crate::model::SiftConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &SiftConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut range = |key: &str, value: f64, (min, max): (f64, f64)| {
        if !(min..=max).contains(&value) {
            errors.push(ConfigError::OutOfRange {
                key: key.to_string(),
                value,
                min,
                max,
            });
        }
    };

    range(
        "analyzer.llm_confidence_threshold",
        config.analyzer.llm_confidence_threshold,
        (0.0, 1.0),
    );
    range("analyzer.entity_overlap", config.analyzer.entity_overlap, (0.0, 1.0));
    range("retrieval.decay_rate", config.retrieval.decay_rate, (0.0, 1.0));
    range("retrieval.entity_boost", config.retrieval.entity_boost, (0.0, 2.0));
    range("retrieval.platform_boost", config.retrieval.platform_boost, (1.0, 3.0));
    range("sufficiency.llm_weight", config.sufficiency.llm_weight, (0.0, 1.0));
    range(
        "expansion.targeted_time_factor",
        config.expansion.targeted_time_factor,
        (1.0, 100.0),
    );
    range(
        "expansion.broad_time_factor",
        config.expansion.broad_time_factor,
        (1.0, 100.0),
    );
    range("cache.fuzzy_threshold", config.cache.fuzzy_threshold, (0.0, 1.0));
    range("learning.learning_rate", config.learning.learning_rate, (0.0, 1.0));

    let p = &config.parameters;
    range(
        "parameters.sufficiency_threshold",
        p.sufficiency_threshold,
        SUFFICIENCY_THRESHOLD_BOUNDS,
    );
    range("parameters.rrf_k", p.rrf_k, RRF_K_BOUNDS);
    for (name, value) in [
        ("vector", p.retrieval_weights.vector),
        ("event", p.retrieval_weights.event),
        ("action", p.retrieval_weights.action),
    ] {
        range(
            &format!("parameters.retrieval_weights.{name}"),
            value,
            RETRIEVAL_WEIGHT_BOUNDS,
        );
    }
    for (name, value) in [
        ("entity_coverage", p.expansion_thresholds.entity_coverage),
        ("temporal_relevance", p.expansion_thresholds.temporal_relevance),
        ("platform_diversity", p.expansion_thresholds.platform_diversity),
        ("result_volume", p.expansion_thresholds.result_volume),
    ] {
        range(
            &format!("parameters.expansion_thresholds.{name}"),
            value,
            EXPANSION_THRESHOLD_BOUNDS,
        );
    }
    for (name, value) in [
        ("query", p.cache_ttl_multipliers.query),
        ("context", p.cache_ttl_multipliers.context),
        ("embedding", p.cache_ttl_multipliers.embedding),
        ("response", p.cache_ttl_multipliers.response),
    ] {
        range(
            &format!("parameters.cache_ttl_multipliers.{name}"),
            value,
            TTL_MULTIPLIER_BOUNDS,
        );
    }

    if !LOG_LEVELS.contains(&config.engine.log_level.as_str()) {
        errors.push(ConfigError::InvalidValue {
            key: "engine.log_level".to_string(),
            detail: format!(
                "`{}` is not one of {}",
                config.engine.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.engine.max_expansion_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_expansion_attempts must be at least 1".to_string(),
        });
    }

    if config.memory.compression_threshold == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.compression_threshold must be at least 1".to_string(),
        });
    }

    if config.memory.max_recent_turns >= config.memory.compression_threshold {
        errors.push(ConfigError::Validation {
            message: format!(
                "memory.max_recent_turns ({}) must be below memory.compression_threshold ({})",
                config.memory.max_recent_turns, config.memory.compression_threshold
            ),
        });
    }

    if config.memory.max_key_events > config.memory.key_event_candidates {
        errors.push(ConfigError::Validation {
            message: "memory.max_key_events must not exceed memory.key_event_candidates"
                .to_string(),
        });
    }

    for (key, capacity) in [
        ("cache.query_capacity", config.cache.query_capacity),
        ("cache.context_capacity", config.cache.context_capacity),
        ("cache.embedding_capacity", config.cache.embedding_capacity),
        ("cache.response_capacity", config.cache.response_capacity),
        ("learning.queue_capacity", config.learning.queue_capacity),
        ("learning.batch_size", config.learning.batch_size),
        ("sufficiency.min_results", config.sufficiency.min_results),
    ] {
        if capacity == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be at least 1"),
            });
        }
    }

    if config.cache.realtime_max_age_secs > config.cache.context_max_age_secs {
        errors.push(ConfigError::Validation {
            message: "cache.realtime_max_age_secs must not exceed cache.context_max_age_secs"
                .to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
