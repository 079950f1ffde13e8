//! Entry filter: keyword matching plus the recency window.
//!
//! An entry is kept iff at least one configured keyword occurs,
//! case-insensitively, in the concatenation of its title and description.
//! Outside backfill mode, entries older than [`RECENCY_WINDOW_DAYS`] are
//! dropped. The window keys on the resolved publish date (structured
//! timestamp, raw date string, or a date in the URL); only entries where
//! the whole chain comes up empty are treated as recent and kept.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::FeedEntry;
use crate::normalize::known_published;

/// Entries older than this many days are dropped outside backfill mode.
pub const RECENCY_WINDOW_DAYS: i64 = 7;

/// Keywords that match an entry, in configured order.
pub fn matched_keywords(entry: &FeedEntry, keywords: &[String]) -> Vec<String> {
    let haystack = format!("{} {}", entry.title, entry.description).to_lowercase();
    keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .cloned()
        .collect()
}

/// Whether an entry's publish date falls inside the recency window.
///
/// Backfill mode accepts everything. A missing date counts as recent.
pub fn within_window(published: Option<DateTime<Utc>>, backfill: bool, now: DateTime<Utc>) -> bool {
    if backfill {
        return true;
    }
    match published {
        Some(ts) => now - ts <= Duration::days(RECENCY_WINDOW_DAYS),
        None => true,
    }
}

/// Apply keyword matching and the recency window to a batch of entries.
///
/// Returns each kept entry paired with the keywords that matched it. Zero
/// matches is not an error; the result is simply empty.
pub fn filter_entries(
    entries: Vec<FeedEntry>,
    keywords: &[String],
    backfill: bool,
) -> Vec<(FeedEntry, Vec<String>)> {
    let now = Utc::now();
    let total = entries.len();
    let kept: Vec<(FeedEntry, Vec<String>)> = entries
        .into_iter()
        .filter(|entry| within_window(known_published(entry), backfill, now))
        .filter_map(|entry| {
            let matched = matched_keywords(&entry, keywords);
            if matched.is_empty() {
                None
            } else {
                Some((entry, matched))
            }
        })
        .collect();
    debug!(total, kept = kept.len(), backfill, "Filtered feed entries");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, description: &str, age_days: Option<i64>) -> FeedEntry {
        FeedEntry {
            title: title.to_string(),
            description: description.to_string(),
            link: "http://x.com/a".to_string(),
            published: age_days.map(|d| Utc::now() - Duration::days(d)),
            ..FeedEntry::default()
        }
    }

    fn keywords() -> Vec<String> {
        vec!["파이프트리".to_string(), "paiptree".to_string()]
    }

    #[test]
    fn test_unmatched_entries_are_excluded() {
        let entries = vec![entry("다른 회사 소식", "관련 없음", Some(1))];
        assert!(filter_entries(entries, &keywords(), false).is_empty());
    }

    #[test]
    fn test_match_is_case_insensitive_and_checks_description() {
        let entries = vec![
            entry("Paiptree in the news", "", Some(1)),
            entry("headline only", "설명에 파이프트리 언급", Some(1)),
        ];
        let kept = filter_entries(entries, &keywords(), false);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].1, vec!["paiptree".to_string()]);
        assert_eq!(kept[1].1, vec!["파이프트리".to_string()]);
    }

    #[test]
    fn test_old_entries_are_dropped() {
        let entries = vec![entry("파이프트리 옛날 기사", "", Some(8))];
        assert!(filter_entries(entries, &keywords(), false).is_empty());
    }

    #[test]
    fn test_backfill_keeps_old_entries() {
        let entries = vec![entry("파이프트리 옛날 기사", "", Some(400))];
        assert_eq!(filter_entries(entries, &keywords(), true).len(), 1);
    }

    #[test]
    fn test_undated_entries_are_treated_as_recent() {
        let entries = vec![entry("파이프트리 날짜 없음", "", None)];
        assert_eq!(filter_entries(entries, &keywords(), false).len(), 1);
    }

    #[test]
    fn test_stale_raw_date_only_entries_are_dropped() {
        let entries = vec![FeedEntry {
            title: "파이프트리 2020년 기사".to_string(),
            link: "http://x.com/a".to_string(),
            raw_date: Some("2020-01-15T10:00:00+09:00".to_string()),
            ..FeedEntry::default()
        }];
        assert!(filter_entries(entries.clone(), &keywords(), false).is_empty());
        assert_eq!(filter_entries(entries, &keywords(), true).len(), 1);
    }

    #[test]
    fn test_stale_url_date_ages_an_entry_out() {
        let entries = vec![FeedEntry {
            title: "파이프트리 기록 보관 기사".to_string(),
            link: "http://news.site/2019/03/02/story".to_string(),
            ..FeedEntry::default()
        }];
        assert!(filter_entries(entries, &keywords(), false).is_empty());
    }

    #[test]
    fn test_multiple_keyword_matches_are_recorded_in_order() {
        let entries = vec![entry("파이프트리 paiptree 동시 언급", "", Some(1))];
        let kept = filter_entries(entries, &keywords(), false);
        assert_eq!(
            kept[0].1,
            vec!["파이프트리".to_string(), "paiptree".to_string()]
        );
    }
}
