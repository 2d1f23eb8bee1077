// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline answer generation that quotes the best-ranked context.

use async_trait::async_trait;
use sift_core::context::{FusedContext, SearchResult};
use sift_core::error::SiftError;
use sift_core::traits::{GenerationAdapter, GenerationRequest, PluginAdapter};
use sift_core::types::{AdapterType, HealthStatus};

/// Lists the top fused results verbatim instead of calling a model.
pub struct ExtractiveGenerator {
    max_items: usize,
}

impl ExtractiveGenerator {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
        }
    }

    fn compose(&self, request: &GenerationRequest) -> String {
        let query = request.needs.query.trim();
        let items: Vec<&SearchResult> = ranked(&request.context).take(self.max_items).collect();
        if items.is_empty() {
            return format!("I could not find anything relevant to \"{query}\".");
        }

        let mut out = format!("Here is what I found for \"{query}\":\n");
        for item in items {
            out.push_str(&format!(
                "- [{}] {} ({})\n",
                item.source(),
                first_line(&item.content),
                item.timestamp.format("%Y-%m-%d %H:%M"),
            ));
        }
        if request.needs.references_previous_turn
            && let Some(previous) = request.memory.recent_turns.last()
        {
            out.push_str(&format!("(following up on \"{}\")\n", previous.query));
        }
        if request.low_confidence {
            out.push_str("These results may be incomplete.\n");
        }
        out.trim_end().to_string()
    }
}

/// Results in fused order, resolved against their channel lists.
fn ranked(context: &FusedContext) -> impl Iterator<Item = &SearchResult> {
    context.ranking.iter().filter_map(|entry| {
        [&context.content, &context.events, &context.actions]
            .into_iter()
            .flatten()
            .find(|r| r.source() == entry.source && r.id == entry.id)
    })
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

#[async_trait]
impl PluginAdapter for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
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
impl GenerationAdapter for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SiftError> {
        Ok(self.compose(request))
    }
}
