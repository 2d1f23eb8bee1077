// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM collaborator.
//!
//! Each call kind pops from its own FIFO queue. An empty queue is a provider
//! error, so an unscripted call exercises the heuristic fallbacks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use sift_core::error::SiftError;
use sift_core::memory::ConversationTurn;
use sift_core::traits::{LlmAdapter, PluginAdapter};
use sift_core::types::{AdapterType, HealthStatus};
use tokio::sync::Mutex;

type Script = Mutex<VecDeque<Result<Value, String>>>;

#[derive(Default)]
pub struct MockLlm {
    analyses: Script,
    evaluations: Script,
    summaries: Script,
    analyze_calls: AtomicUsize,
    evaluate_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_analysis(&self, payload: Value) {
        self.analyses.lock().await.push_back(Ok(payload));
    }

    pub async fn push_evaluation(&self, payload: Value) {
        self.evaluations.lock().await.push_back(Ok(payload));
    }

    pub async fn push_summary(&self, payload: Value) {
        self.summaries.lock().await.push_back(Ok(payload));
    }

    /// Script a failure for the next `summarize` call.
    pub async fn fail_next_summary(&self, message: &str) {
        self.summaries.lock().await.push_back(Err(message.to_string()));
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    async fn next(script: &Script, kind: &str) -> Result<Value, SiftError> {
        match script.lock().await.pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(SiftError::provider(message)),
            None => Err(SiftError::provider(format!("no scripted {kind} response"))),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockLlm {
    fn name(&self) -> &str {
        "mock-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        Ok(())
    }
}

#[async_trait]
impl LlmAdapter for MockLlm {
    async fn analyze(&self, _prompt: &str) -> Result<Value, SiftError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.analyses, "analysis").await
    }

    async fn evaluate(&self, _prompt: &str) -> Result<Value, SiftError> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.evaluations, "evaluation").await
    }

    async fn summarize(
        &self,
        _turns: &[ConversationTurn],
        _previous_summary: Option<&str>,
    ) -> Result<Value, SiftError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.summaries, "summary").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_responses_pop_in_order() {
        let llm = MockLlm::new();
        llm.push_analysis(json!({"intent": "query_events"})).await;
        llm.push_analysis(json!({"intent": "search_content"})).await;

        assert_eq!(llm.analyze("a").await.unwrap()["intent"], "query_events");
        assert_eq!(llm.analyze("b").await.unwrap()["intent"], "search_content");
        assert!(llm.analyze("c").await.is_err());
        assert_eq!(llm.analyze_calls(), 3);
    }

    #[tokio::test]
    async fn scripted_failure_is_a_provider_error() {
        let llm = MockLlm::new();
        llm.fail_next_summary("rate limited").await;
        let err = llm.summarize(&[], None).await.unwrap_err();
        assert_eq!(err.to_string(), "provider error: rate limited");
    }
}
