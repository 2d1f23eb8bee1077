// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for query vectorization.

use async_trait::async_trait;

use crate::error::SiftError;
use crate::traits::adapter::PluginAdapter;

/// Converts text into a dense vector for similarity search.
///
/// Implementations must be deterministic for a given text so results can be
/// cached by normalized text.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SiftError>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;
}
