// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relative and absolute time expression parsing.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use regex::Regex;
use sift_core::types::TimeRange;

static LAST_N_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:last|past)\s+(\d{1,4})\s+(hour|day|week|month)s?\b").unwrap()
});

static N_DAYS_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,4})\s+days?\s+ago\b").unwrap());

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

/// Fixed phrases, tried in order after the numeric forms.
const PHRASES: &[&str] = &[
    "yesterday",
    "today",
    "this hour",
    "last hour",
    "past hour",
    "this week",
    "last week",
    "past week",
    "this month",
    "last month",
    "past month",
];

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1).and_then(midnight)
}

/// Parse the first recognizable time expression in `text` relative to `now`.
///
/// `text` is expected in lowercase. Relative expressions win over an
/// absolute `YYYY-MM-DD` date.
pub fn parse_time_reference(text: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    if let Some(caps) = LAST_N_UNITS.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let span = match &caps[2] {
            "hour" => Duration::hours(n),
            "day" => Duration::days(n),
            "week" => Duration::weeks(n),
            _ => Duration::days(30 * n),
        };
        return Some(TimeRange::new(now - span, now, &caps[0]));
    }

    if let Some(caps) = N_DAYS_AGO.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let start = midnight((now - Duration::days(n)).date_naive())?;
        return Some(TimeRange::new(start, start + Duration::days(1), &caps[0]));
    }

    let phrase = PHRASES.iter().find(|p| contains_phrase(text, p));
    if let Some(phrase) = phrase {
        return phrase_range(phrase, now);
    }

    let caps = ISO_DATE.captures(text)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    let start = midnight(date)?;
    Some(TimeRange::new(start, start + Duration::days(1), &caps[0]))
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn phrase_range(phrase: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let today = midnight(now.date_naive())?;
    let week_start = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    let this_month = month_start(now.year(), now.month())?;
    let (start, end) = match phrase {
        "today" => (today, now),
        "yesterday" => (today - Duration::days(1), today),
        "this hour" => (
            now.with_minute(0)?.with_second(0)?.with_nanosecond(0)?,
            now,
        ),
        "last hour" | "past hour" => (now - Duration::hours(1), now),
        "this week" => (week_start, now),
        "last week" => (week_start - Duration::weeks(1), week_start),
        "past week" => (now - Duration::weeks(1), now),
        "this month" => (this_month, now),
        "last month" => {
            let (y, m) = if now.month() == 1 {
                (now.year() - 1, 12)
            } else {
                (now.year(), now.month() - 1)
            };
            (month_start(y, m)?, this_month)
        }
        "past month" => (now - Duration::days(30), now),
        _ => return None,
    };
    Some(TimeRange::new(start, end, phrase))
}
