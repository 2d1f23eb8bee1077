// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-hash cache keys over normalized inputs.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Separator between key parts; never appears in normalized text.
const SEP: &[u8] = b"\x1f";

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(SEP);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Query-analysis key. Includes the UTC day so relative time expressions
/// ("yesterday") are never served across a date change.
pub fn query_key(query: &str, user_id: &str, now: DateTime<Utc>) -> String {
    let day = now.format("%Y-%m-%d").to_string();
    digest(&["query", &normalize(query), user_id, &day])
}

pub fn context_key(query: &str, user_id: &str) -> String {
    digest(&["context", &normalize(query), user_id])
}

/// Embeddings are keyed by text alone and shared across users.
pub fn embedding_key(text: &str) -> String {
    digest(&["embedding", &normalize(text)])
}

pub fn response_key(query: &str, user_id: &str) -> String {
    digest(&["response", &normalize(query), user_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(
            context_key("  Find   the BUG ", "u1"),
            context_key("find the bug", "u1")
        );
        assert_ne!(context_key("find the bug", "u1"), context_key("find the bug", "u2"));
    }

    #[test]
    fn query_key_changes_with_the_day() {
        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let day2 = day1 + Duration::hours(2);
        assert_eq!(query_key("q", "u", day1), query_key("q", "u", day1 + Duration::minutes(30)));
        assert_ne!(query_key("q", "u", day1), query_key("q", "u", day2));
    }

    #[test]
    fn keys_are_hex_sha256() {
        let key = embedding_key("hello");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn stores_do_not_share_keys() {
        assert_ne!(context_key("q", "u"), response_key("q", "u"));
    }
}
