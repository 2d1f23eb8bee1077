// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sift retrieval engine.
//!
//! Collaborator failures (analysis, retrieval, evaluation) are caught at their
//! call sites and downgraded to heuristic results; only generation failures and
//! unexpected internal errors reach the orchestrator's terminal error state.

use thiserror::Error;

use crate::context::ResultSource;

/// The primary error type used across all Sift crates.
#[derive(Debug, Error)]
pub enum SiftError {
    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM or embedding provider errors (API failure, malformed output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The LLM analysis collaborator failed or returned an unusable payload.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// One retrieval channel failed.
    #[error("retrieval failed on {channel} channel: {message}")]
    Retrieval {
        channel: ResultSource,
        message: String,
    },

    /// The LLM sufficiency judgment failed or returned an unusable payload.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The final answer generation call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SiftError {
    /// Convenience constructor for provider failures without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        SiftError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Convenience constructor for storage failures from any error-like value.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SiftError::Storage { source: err.into() }
    }
}
