// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};
use sift_core::context::FusionMode;
use sift_core::params::{
    CacheTtlMultipliers, ExpansionThresholds, RetrievalWeights, SystemParameters,
};

/// Top-level Sift configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiftConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub sufficiency: SufficiencyConfig,

    #[serde(default)]
    pub expansion: ExpansionConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    /// Initial values for the learned parameters.
    #[serde(default)]
    pub parameters: ParametersConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of expansion rounds after the initial retrieval.
    #[serde(default = "default_max_expansion_attempts")]
    pub max_expansion_attempts: u32,

    /// How long an idle session's snapshot survives.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Response returned when a turn cannot be completed.
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_expansion_attempts: default_max_expansion_attempts(),
            session_ttl_secs: default_session_ttl_secs(),
            fallback_response: default_fallback_response(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_expansion_attempts() -> u32 {
    3
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_fallback_response() -> String {
    "I'm sorry, I ran into a problem while answering that. Please try again.".to_string()
}

/// Query analyzer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Pattern confidence below which the LLM analysis is consulted.
    #[serde(default = "default_llm_confidence_threshold")]
    pub llm_confidence_threshold: f64,

    /// Disable to run pattern analysis only.
    #[serde(default = "default_true")]
    pub llm_enabled: bool,

    /// Number of leading words searched for a back-reference pronoun.
    #[serde(default = "default_pronoun_window")]
    pub pronoun_window: usize,

    /// Entity overlap with the previous turn above which a query is a follow-up.
    #[serde(default = "default_entity_overlap")]
    pub entity_overlap: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            llm_confidence_threshold: default_llm_confidence_threshold(),
            llm_enabled: true,
            pronoun_window: default_pronoun_window(),
            entity_overlap: default_entity_overlap(),
        }
    }
}

fn default_llm_confidence_threshold() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_pronoun_window() -> usize {
    5
}

fn default_entity_overlap() -> f64 {
    0.5
}

/// Hybrid retrieval settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_vector_top_k")]
    pub vector_top_k: usize,

    #[serde(default = "default_event_limit")]
    pub event_limit: usize,

    #[serde(default = "default_action_limit")]
    pub action_limit: usize,

    /// Exponential recency decay per hour of age.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Score boost per matched entity, scaled by entity confidence.
    #[serde(default = "default_entity_boost")]
    pub entity_boost: f64,

    /// Multiplier for results on a requested platform.
    #[serde(default = "default_platform_boost")]
    pub platform_boost: f64,

    #[serde(default)]
    pub fusion_mode: FusionMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: default_vector_top_k(),
            event_limit: default_event_limit(),
            action_limit: default_action_limit(),
            decay_rate: default_decay_rate(),
            entity_boost: default_entity_boost(),
            platform_boost: default_platform_boost(),
            fusion_mode: FusionMode::default(),
        }
    }
}

fn default_vector_top_k() -> usize {
    10
}

fn default_event_limit() -> usize {
    20
}

fn default_action_limit() -> usize {
    10
}

fn default_decay_rate() -> f64 {
    0.005
}

fn default_entity_boost() -> f64 {
    0.3
}

fn default_platform_boost() -> f64 {
    1.2
}

/// Sufficiency evaluation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SufficiencyConfig {
    /// Consult the LLM judgment in addition to the heuristic dimensions.
    #[serde(default = "default_true")]
    pub llm_enabled: bool,

    /// Share of the overall score taken from the LLM judgment.
    #[serde(default = "default_llm_weight")]
    pub llm_weight: f64,

    /// Result count at which the volume dimension saturates.
    #[serde(default = "default_min_results")]
    pub min_results: usize,
}

impl Default for SufficiencyConfig {
    fn default() -> Self {
        Self {
            llm_enabled: true,
            llm_weight: default_llm_weight(),
            min_results: default_min_results(),
        }
    }
}

fn default_llm_weight() -> f64 {
    0.5
}

fn default_min_results() -> usize {
    5
}

/// Context expansion settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExpansionConfig {
    /// Time window growth for targeted expansion.
    #[serde(default = "default_targeted_time_factor")]
    pub targeted_time_factor: f64,

    /// Time window growth for broad expansion.
    #[serde(default = "default_broad_time_factor")]
    pub broad_time_factor: f64,

    /// Window introduced when expanding a query that had no time reference.
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,

    /// Candidate limit growth per targeted/broad round.
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: usize,

    #[serde(default = "default_max_vector_top_k")]
    pub max_vector_top_k: usize,

    #[serde(default = "default_max_event_limit")]
    pub max_event_limit: usize,

    #[serde(default = "default_max_action_limit")]
    pub max_action_limit: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            targeted_time_factor: default_targeted_time_factor(),
            broad_time_factor: default_broad_time_factor(),
            default_window_days: default_window_days(),
            limit_multiplier: default_limit_multiplier(),
            max_vector_top_k: default_max_vector_top_k(),
            max_event_limit: default_max_event_limit(),
            max_action_limit: default_max_action_limit(),
        }
    }
}

fn default_targeted_time_factor() -> f64 {
    2.0
}

fn default_broad_time_factor() -> f64 {
    4.0
}

fn default_window_days() -> i64 {
    7
}

fn default_limit_multiplier() -> usize {
    2
}

fn default_max_vector_top_k() -> usize {
    50
}

fn default_max_event_limit() -> usize {
    100
}

fn default_max_action_limit() -> usize {
    50
}

/// Compressive memory settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Raw turn count at which the session is compressed.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Raw turns kept verbatim after compression.
    #[serde(default = "default_max_recent_turns")]
    pub max_recent_turns: usize,

    /// Key events kept after diversification.
    #[serde(default = "default_max_key_events")]
    pub max_key_events: usize,

    /// Candidate key events considered before diversification.
    #[serde(default = "default_key_event_candidates")]
    pub key_event_candidates: usize,

    /// Earliest turns handed to the profile summarizer.
    #[serde(default = "default_profile_turns")]
    pub profile_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            compression_threshold: default_compression_threshold(),
            max_recent_turns: default_max_recent_turns(),
            max_key_events: default_max_key_events(),
            key_event_candidates: default_key_event_candidates(),
            profile_turns: default_profile_turns(),
        }
    }
}

fn default_compression_threshold() -> usize {
    20
}

fn default_max_recent_turns() -> usize {
    5
}

fn default_max_key_events() -> usize {
    10
}

fn default_key_event_candidates() -> usize {
    20
}

fn default_profile_turns() -> usize {
    10
}

/// Capacities and base TTLs of the four cache stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_query_capacity")]
    pub query_capacity: usize,
    #[serde(default = "default_query_ttl_secs")]
    pub query_ttl_secs: u64,

    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
    #[serde(default = "default_context_ttl_secs")]
    pub context_ttl_secs: u64,

    #[serde(default = "default_embedding_capacity")]
    pub embedding_capacity: usize,
    #[serde(default = "default_embedding_ttl_secs")]
    pub embedding_ttl_secs: u64,

    #[serde(default = "default_response_capacity")]
    pub response_capacity: usize,
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,

    /// Minimum similarity for a fuzzy context hit.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Cached contexts older than this are never served.
    #[serde(default = "default_context_max_age_secs")]
    pub context_max_age_secs: u64,

    /// Freshness bound for queries about the last hour.
    #[serde(default = "default_realtime_max_age_secs")]
    pub realtime_max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_capacity: default_query_capacity(),
            query_ttl_secs: default_query_ttl_secs(),
            context_capacity: default_context_capacity(),
            context_ttl_secs: default_context_ttl_secs(),
            embedding_capacity: default_embedding_capacity(),
            embedding_ttl_secs: default_embedding_ttl_secs(),
            response_capacity: default_response_capacity(),
            response_ttl_secs: default_response_ttl_secs(),
            fuzzy_threshold: default_fuzzy_threshold(),
            context_max_age_secs: default_context_max_age_secs(),
            realtime_max_age_secs: default_realtime_max_age_secs(),
        }
    }
}

fn default_query_capacity() -> usize {
    1000
}

fn default_query_ttl_secs() -> u64 {
    300
}

fn default_context_capacity() -> usize {
    500
}

fn default_context_ttl_secs() -> u64 {
    600
}

fn default_embedding_capacity() -> usize {
    5000
}

fn default_embedding_ttl_secs() -> u64 {
    86_400
}

fn default_response_capacity() -> usize {
    500
}

fn default_response_ttl_secs() -> u64 {
    300
}

fn default_fuzzy_threshold() -> f64 {
    0.7
}

fn default_context_max_age_secs() -> u64 {
    3600
}

fn default_realtime_max_age_secs() -> u64 {
    300
}

/// Quality metrics and learning optimizer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between optimizer passes.
    #[serde(default = "default_learning_interval_secs")]
    pub interval_secs: u64,

    /// Bound on queued learning records; a full queue drops new records.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum records drained per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Passes with fewer records than this leave parameters untouched.
    #[serde(default = "default_min_batch")]
    pub min_batch: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_learning_interval_secs(),
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            min_batch: default_min_batch(),
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_learning_interval_secs() -> u64 {
    300
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_min_batch() -> usize {
    10
}

fn default_learning_rate() -> f64 {
    0.1
}

/// Starting values for the learned parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersConfig {
    #[serde(default = "default_sufficiency_threshold")]
    pub sufficiency_threshold: f64,

    #[serde(default)]
    pub retrieval_weights: RetrievalWeights,

    #[serde(default)]
    pub expansion_thresholds: ExpansionThresholds,

    #[serde(default)]
    pub cache_ttl_multipliers: CacheTtlMultipliers,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
}

impl Default for ParametersConfig {
    fn default() -> Self {
        let p = SystemParameters::default();
        Self {
            sufficiency_threshold: p.sufficiency_threshold,
            retrieval_weights: p.retrieval_weights,
            expansion_thresholds: p.expansion_thresholds,
            cache_ttl_multipliers: p.cache_ttl_multipliers,
            rrf_k: p.rrf_k,
        }
    }
}

impl ParametersConfig {
    /// Initial parameter set at version 0.
    pub fn to_system_parameters(&self) -> SystemParameters {
        SystemParameters {
            version: 0,
            sufficiency_threshold: self.sufficiency_threshold,
            retrieval_weights: self.retrieval_weights.clone(),
            expansion_thresholds: self.expansion_thresholds.clone(),
            cache_ttl_multipliers: self.cache_ttl_multipliers.clone(),
            rrf_k: self.rrf_k,
        }
    }
}

fn default_sufficiency_threshold() -> f64 {
    0.7
}

fn default_rrf_k() -> f64 {
    60.0
}

/// Session turn log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite turn log.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sift").join("sift.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("sift.db"))
        .to_string_lossy()
        .into_owned()
}
