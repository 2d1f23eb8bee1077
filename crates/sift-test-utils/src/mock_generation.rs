// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording generation collaborator.

use std::collections::VecDeque;

use async_trait::async_trait;
use sift_core::error::SiftError;
use sift_core::traits::{GenerationAdapter, GenerationRequest, PluginAdapter};
use sift_core::types::{AdapterType, HealthStatus};
use tokio::sync::Mutex;

/// Returns queued answers, then `answer: <query>`, and keeps every request.
#[derive(Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    failing: bool,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().await.last().cloned()
    }
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generation
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationAdapter for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SiftError> {
        self.requests.lock().await.push(request.clone());
        if self.failing {
            return Err(SiftError::Generation("mock generator offline".into()));
        }
        Ok(self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| format!("answer: {}", request.needs.query)))
    }
}
