// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn importance scoring and diversified key-event selection.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use sift_core::memory::{ConversationTurn, KeyEvent};
use sift_core::types::{Entity, Intent};

const EXCERPT_CHARS: usize = 200;
const LONG_RESPONSE_CHARS: usize = 500;

/// Importance of a turn in a session of `total_turns` turns.
pub fn importance(turn: &ConversationTurn, total_turns: u64) -> f64 {
    let mut score = (turn.entities.len() as f64 * 0.1).min(0.3);
    if matches!(turn.intent, Intent::QueryEvents | Intent::ExplainAction) {
        score += 0.2;
    }
    if turn.context_ids.len() > 3 {
        score += 0.2;
    }
    if turn.references_previous_turn {
        score += 0.1;
    }
    if turn.response.chars().count() > LONG_RESPONSE_CHARS {
        score += 0.15;
    }
    if total_turns > 0 {
        score += (turn.turn_index as f64 / total_turns as f64) * 0.2;
    }
    score.clamp(0.0, 1.0)
}

pub fn key_event(turn: &ConversationTurn, total_turns: u64) -> KeyEvent {
    KeyEvent {
        turn_index: turn.turn_index,
        query: turn.query.clone(),
        response_excerpt: turn.response.chars().take(EXCERPT_CHARS).collect(),
        intent: turn.intent,
        entity_keys: turn.entities.iter().map(Entity::key).collect(),
        importance: importance(turn, total_turns),
        timestamp: turn.timestamp,
    }
}

/// Highest importance first; later turns win ties.
fn by_importance(a: &KeyEvent, b: &KeyEvent) -> Ordering {
    b.importance
        .total_cmp(&a.importance)
        .then_with(|| b.turn_index.cmp(&a.turn_index))
}

/// Keep the top `candidates` events, then pick up to `keep`: the best event
/// of each distinct intent first, then the next best not yet selected.
pub fn select(mut events: Vec<KeyEvent>, candidates: usize, keep: usize) -> Vec<KeyEvent> {
    events.sort_by(by_importance);
    let mut seen = BTreeSet::new();
    events.retain(|e| seen.insert(e.turn_index));
    events.truncate(candidates);

    let mut chosen: BTreeSet<u64> = BTreeSet::new();
    let mut intents: BTreeSet<Intent> = BTreeSet::new();
    for e in &events {
        if chosen.len() >= keep {
            break;
        }
        if intents.insert(e.intent) {
            chosen.insert(e.turn_index);
        }
    }
    for e in &events {
        if chosen.len() >= keep {
            break;
        }
        chosen.insert(e.turn_index);
    }

    events.retain(|e| chosen.contains(&e.turn_index));
    events
}
