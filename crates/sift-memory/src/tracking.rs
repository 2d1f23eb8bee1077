// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental entity, relationship and pattern statistics over turns.
//!
//! Every function folds new turns into existing state, so re-compression
//! adds counts instead of recomputing them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Timelike;
use sift_core::memory::{
    ConversationPatterns, ConversationTurn, EntityMention, EntityRecord, IntentTransition,
    RelationshipGraph,
};
use sift_core::types::{Entity, Intent};

const SNIPPET_CHARS: usize = 120;

fn turn_keys(turn: &ConversationTurn) -> BTreeSet<String> {
    turn.entities.iter().map(Entity::key).collect()
}

pub fn track_entities(tracking: &mut BTreeMap<String, EntityRecord>, turns: &[ConversationTurn]) {
    for turn in turns {
        let keys = turn_keys(turn);
        for key in &keys {
            let record = tracking.entry(key.clone()).or_insert_with(|| EntityRecord {
                key: key.clone(),
                mention_count: 0,
                first_turn: turn.turn_index,
                last_turn: turn.turn_index,
                mentions: Vec::new(),
                co_occurring: BTreeSet::new(),
            });
            record.mention_count += 1;
            record.first_turn = record.first_turn.min(turn.turn_index);
            record.last_turn = record.last_turn.max(turn.turn_index);
            record.mentions.push(EntityMention {
                turn_index: turn.turn_index,
                snippet: turn.query.chars().take(SNIPPET_CHARS).collect(),
            });
            record
                .co_occurring
                .extend(keys.iter().filter(|k| *k != key).cloned());
        }
    }
}

/// Fold `turns` into the graph. `previous_intent` is the intent of the last
/// turn already folded, so a transition across the batch boundary is kept.
pub fn track_relationships(
    graph: &mut RelationshipGraph,
    turns: &[ConversationTurn],
    mut previous_intent: Option<Intent>,
) {
    for turn in turns {
        let keys = turn_keys(turn);
        for key in &keys {
            *graph.affinity.entry(key.clone()).or_default() += 1;
            for other in keys.iter().filter(|k| *k != key) {
                *graph
                    .co_occurrence
                    .entry(key.clone())
                    .or_default()
                    .entry(other.clone())
                    .or_default() += 1;
            }
        }

        if let Some(from) = previous_intent
            && from != turn.intent
        {
            graph.intent_transitions.push(IntentTransition {
                turn_index: turn.turn_index,
                from,
                to: turn.intent,
            });
        }
        previous_intent = Some(turn.intent);
    }
}

pub fn track_patterns(patterns: &mut ConversationPatterns, turns: &[ConversationTurn]) {
    for turn in turns {
        *patterns.intent_histogram.entry(turn.intent).or_default() += 1;
        *patterns
            .hour_histogram
            .entry(turn.timestamp.hour())
            .or_default() += 1;
        for platform in &turn.platforms {
            *patterns.platform_histogram.entry(*platform).or_default() += 1;
        }
        if turn.references_previous_turn {
            patterns.follow_up_count += 1;
        }
        patterns.turn_count += 1;
    }
    patterns.follow_up_rate = if patterns.turn_count > 1 {
        patterns.follow_up_count as f64 / (patterns.turn_count - 1) as f64
    } else {
        0.0
    };
}
