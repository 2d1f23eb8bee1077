// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified cross-channel ordering: weighted scores or Reciprocal Rank Fusion.

use std::cmp::Ordering;
use std::collections::HashMap;

use sift_core::context::{FusedEntry, ResultSource, SearchResult};
use sift_core::params::RetrievalWeights;

fn sort_entries(entries: &mut [FusedEntry]) {
    entries.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.source.cmp(&b.source))
    });
}

fn weight_for(weights: &RetrievalWeights, source: ResultSource) -> f64 {
    match source {
        ResultSource::Vector => weights.vector,
        ResultSource::Event => weights.event,
        ResultSource::Action => weights.action,
    }
}

/// Each ranked score times its channel weight.
pub fn weighted_fusion(
    lists: &[(ResultSource, &[SearchResult])],
    weights: &RetrievalWeights,
) -> Vec<FusedEntry> {
    let mut entries: Vec<FusedEntry> = lists
        .iter()
        .flat_map(|(source, results)| {
            let weight = weight_for(weights, *source);
            results.iter().map(move |r| FusedEntry {
                source: *source,
                id: r.id.clone(),
                fused_score: r.score * weight,
            })
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Reciprocal Rank Fusion over independently ranked lists.
///
/// score(d) = Σ 1 / (k + rank) with 1-based rank, summed over every list
/// containing `d`. Items are identified by id; an id appearing in several
/// lists is reported under the channel where it ranked best.
pub fn reciprocal_rank_fusion(lists: &[(ResultSource, &[SearchResult])], k: f64) -> Vec<FusedEntry> {
    let mut scores: HashMap<&str, (f64, ResultSource, usize)> = HashMap::new();
    for (source, results) in lists {
        for (i, r) in results.iter().enumerate() {
            let rank = i + 1;
            let contribution = 1.0 / (k + rank as f64);
            scores
                .entry(r.id.as_str())
                .and_modify(|(score, best_source, best_rank)| {
                    *score += contribution;
                    if rank < *best_rank {
                        *best_source = *source;
                        *best_rank = rank;
                    }
                })
                .or_insert((contribution, *source, rank));
        }
    }

    let mut entries: Vec<FusedEntry> = scores
        .into_iter()
        .map(|(id, (score, source, _))| FusedEntry {
            source,
            id: id.to_string(),
            fused_score: score,
        })
        .collect();
    sort_entries(&mut entries);
    entries
}
