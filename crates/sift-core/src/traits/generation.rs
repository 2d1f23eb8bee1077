// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The opaque final answer generation call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::FusedContext;
use crate::error::SiftError;
use crate::memory::RelevantMemory;
use crate::traits::adapter::PluginAdapter;
use crate::types::InformationNeeds;

/// Everything the generator is given to answer one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub needs: InformationNeeds,
    pub context: FusedContext,
    pub memory: RelevantMemory,
    /// The context did not reach the sufficiency threshold.
    pub low_confidence: bool,
}

#[async_trait]
pub trait GenerationAdapter: PluginAdapter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SiftError>;
}
