// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder for offline use.
//!
//! Terms are hashed into fixed buckets with FNV-1a, weighted by frequency and
//! L2-normalized, so the dot product of two vectors is their cosine.

use std::collections::HashMap;

use async_trait::async_trait;
use sift_core::error::SiftError;
use sift_core::traits::{EmbeddingAdapter, PluginAdapter};
use sift_core::types::{AdapterType, HealthStatus};

pub const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, term: &str) -> usize {
        let hash = term.bytes().fold(FNV_OFFSET, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
        });
        (hash % self.dimensions as u64) as usize
    }

    /// Embed synchronously. Text without any terms yields the zero vector.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut counts: HashMap<String, f32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2)
        {
            *counts.entry(term.to_lowercase()).or_default() += 1.0;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (term, count) in &counts {
            // Weight grows with term length.
            let weight = 1.0 + (term.len() as f32).ln();
            vector[self.bucket(term)] += count * weight;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// Cosine similarity of two vectors, 0.0 when either is zero or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    f64::from(dot / (na * nb))
}

#[async_trait]
impl PluginAdapter for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, SiftError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiftError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SiftError> {
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
