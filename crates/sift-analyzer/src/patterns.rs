// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zero-cost pattern rules: intent, platforms, entities and complexity.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use sift_core::types::{Complexity, Entity, EntityKind, Intent, Platform};

/// Confidence assigned to any intent pattern hit.
pub const PATTERN_CONFIDENCE: f64 = 0.9;
/// Confidence of the `general_help` fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

const QUOTED_CONFIDENCE: f64 = 0.8;
const NAME_CONFIDENCE: f64 = 0.5;
const MENTION_CONFIDENCE: f64 = 0.9;

/// Ordered intent table; the first matching pattern wins.
static INTENT_PATTERNS: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Intent::ExplainAction,
            Regex::new(
                r"\b(why|explain|reason)\b.*\b(action|task|todo|to-do|assigned|created|flagged)s?\b",
            )
            .unwrap(),
        ),
        (
            Intent::QueryActions,
            Regex::new(
                r"\b(action items?|tasks?|todos?|to-dos?|pending|follow[- ]ups?|assigned to me|what do i need to|what should i do)\b",
            )
            .unwrap(),
        ),
        (
            Intent::TimelineQuery,
            Regex::new(r"\b(timeline|history of|chronolog\w*|sequence of|what happened (between|during|since))\b")
                .unwrap(),
        ),
        (
            Intent::QueryEvents,
            Regex::new(
                r"\b(what happened|events?|activity|updates?|changes?|commits?|deploy(ed|ments?|s)?|merged|released?)\b",
            )
            .unwrap(),
        ),
        (
            Intent::SearchContent,
            Regex::new(r"\b(find|search|look for|look up|locate|show me|where is|where's)\b").unwrap(),
        ),
        (
            Intent::GetContext,
            Regex::new(
                r"\b(context|background|summar(y|ize|ise)|overview|catch me up|status of|what('s| is) going on)\b",
            )
            .unwrap(),
        ),
    ]
});

static PLATFORM_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Platform::Slack,
            Regex::new(r"\b(slack|channel|dms?|direct messages?|threads?)\b").unwrap(),
        ),
        (
            Platform::Github,
            Regex::new(r"\b(github|prs?|pull requests?|issues?|commits?|repos?|repositor(y|ies))\b")
                .unwrap(),
        ),
        (
            Platform::Notion,
            Regex::new(r"\b(notion|pages?|docs?|documents?|wiki)\b").unwrap(),
        ),
    ]
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”"#).unwrap());

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9][A-Za-z0-9_.\-]*)").unwrap());

/// Capitalized words that are never entities.
const STOP_WORDS: &[&str] = &[
    "I", "I'm", "I've", "I'd", "The", "A", "An", "And", "Or", "But", "Is", "Are", "Was", "Were",
    "What", "When", "Where", "Why", "Who", "How", "Which", "Can", "Could", "Would", "Should",
    "Do", "Does", "Did", "Please", "Thanks", "Hi", "Hello", "Monday", "Tuesday", "Wednesday",
    "Thursday", "Friday", "Saturday", "Sunday", "OK", "Ok",
];

/// Match the query against the ordered intent table.
pub fn classify_intent(lower: &str) -> (Intent, f64) {
    INTENT_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(lower))
        .map(|(intent, _)| (*intent, PATTERN_CONFIDENCE))
        .unwrap_or((Intent::GeneralHelp, FALLBACK_CONFIDENCE))
}

pub fn detect_platforms(lower: &str) -> BTreeSet<Platform> {
    PLATFORM_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(lower))
        .map(|(p, _)| *p)
        .collect()
}

/// Extract quoted strings, `@mentions`, and capitalized non-initial words.
pub fn extract_entities(query: &str) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    let mut push = |entity: Entity| {
        if seen.insert(entity.key()) {
            entities.push(entity);
        }
    };

    for caps in QUOTED.captures_iter(query) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            let value = m.as_str().trim();
            if !value.is_empty() {
                push(Entity::new(EntityKind::Quoted, value, QUOTED_CONFIDENCE));
            }
        }
    }

    for caps in MENTION.captures_iter(query) {
        let value = caps[1].trim_end_matches(['.', '-']);
        push(Entity::new(EntityKind::Mention, value, MENTION_CONFIDENCE));
    }

    // Quoted spans and mentions are already covered above.
    let unquoted = QUOTED.replace_all(query, " ");
    let unquoted = MENTION.replace_all(&unquoted, " ");
    let mut sentence_start = true;
    for raw in unquoted.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
        let starts_sentence = sentence_start;
        sentence_start = raw.ends_with(['.', '?', '!']);

        if starts_sentence || word.is_empty() {
            continue;
        }
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        if !capitalized || STOP_WORDS.contains(&word) || is_platform_name(word) {
            continue;
        }
        push(Entity::new(EntityKind::Name, word, NAME_CONFIDENCE));
    }

    entities
}

fn is_platform_name(word: &str) -> bool {
    word.to_lowercase().parse::<Platform>().is_ok()
}

/// Word, entity and platform counts mapped to a complexity tier.
pub fn classify_complexity(word_count: usize, entities: usize, platforms: usize) -> Complexity {
    if word_count > 20 || entities > 3 || platforms > 2 {
        Complexity::Complex
    } else if word_count > 10 || entities > 1 || platforms > 1 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}
