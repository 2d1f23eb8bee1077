// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM collaborator used for analysis, sufficiency judgment and profiling.

use async_trait::async_trait;

use crate::error::SiftError;
use crate::memory::ConversationTurn;
use crate::traits::adapter::PluginAdapter;

/// Structured-output LLM calls.
///
/// Every method returns raw JSON. Callers parse it themselves and fall back to
/// heuristics when the call fails or the payload does not have the expected
/// shape.
#[async_trait]
pub trait LlmAdapter: PluginAdapter {
    /// Query analysis. Expected shape: `{intent, confidence, entities: [{type, value, confidence}]}`.
    async fn analyze(&self, prompt: &str) -> Result<serde_json::Value, SiftError>;

    /// Sufficiency judgment. Expected shape: `{score, missing_elements: [..]}`.
    async fn evaluate(&self, prompt: &str) -> Result<serde_json::Value, SiftError>;

    /// User profiling over a run of turns, optionally refining a previous summary.
    /// Expected shape: `{summary, interests: [..], preferred_platforms: [..]}`.
    async fn summarize(
        &self,
        turns: &[ConversationTurn],
        previous_summary: Option<&str>,
    ) -> Result<serde_json::Value, SiftError>;
}
