//! Text normalizer: turns a filtered feed entry into a clean [`NewsRecord`].
//!
//! Responsibilities, in pipeline order:
//! - strip HTML tags and decode entities from descriptions
//! - remove trailing byline/source annotations (`- <source>`, `(<source>)`,
//!   bracketed tags, `(<name> 기자)` credit lines)
//! - collapse repeated whitespace and truncate title/description
//! - resolve the publish date through a fallback chain
//! - resolve a human-readable source name
//! - strip tracking parameters from the article URL

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::models::{self, FeedEntry, NewsRecord, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};

/// Substituted for empty or whitespace-only descriptions after stripping.
pub const EMPTY_DESCRIPTION_PLACEHOLDER: &str = "No description available.";

/// Known outlet names whose trailing annotations are stripped even when the
/// feed failed to identify the source itself.
const KNOWN_OUTLETS: &[&str] = &[
    "연합뉴스",
    "매일경제",
    "한국경제",
    "조선일보",
    "중앙일보",
    "동아일보",
    "전자신문",
    "머니투데이",
    "서울경제",
    "아시아경제",
    "ZDNet Korea",
    "디지털타임스",
];

/// Query parameters that only exist for tracking.
const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_"];
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid"];

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_BRACKET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]{1,30}\]").unwrap());
static RE_REPORTER_CREDIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*[^()]{1,20}\s*(기자|특파원)\s*\)").unwrap());
static RE_URL_DATE_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})/").unwrap());
static RE_URL_DATE_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/-](\d{4})-(\d{2})-(\d{2})[/-]").unwrap());

/// Strip HTML tags, decode entities, and collapse whitespace.
pub fn strip_html(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input).to_string();
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

/// Remove byline/source annotations from already-stripped text.
///
/// Drops bracketed tags like `[단독]`, `(<name> 기자)` credit lines, and a
/// trailing `- <source>` or `(<source>)` for both the detected source and
/// the static known-outlet list.
pub fn strip_bylines(input: &str, source: Option<&str>) -> String {
    let mut out = RE_BRACKET_TAG.replace_all(input, " ").to_string();
    out = RE_REPORTER_CREDIT.replace_all(&out, " ").to_string();
    out = RE_WS.replace_all(&out, " ").trim().to_string();

    let mut names: Vec<&str> = KNOWN_OUTLETS.to_vec();
    if let Some(src) = source {
        let src = src.trim();
        if !src.is_empty() {
            names.push(src);
        }
    }

    loop {
        let before = out.len();
        for name in &names {
            for suffix in [format!("- {name}"), format!("({name})")] {
                if let Some(rest) = out.strip_suffix(&suffix) {
                    out = rest.trim_end().to_string();
                }
            }
        }
        if out.len() == before {
            break;
        }
    }
    out
}

/// Split a trailing `" - <source>"` suffix off a title.
///
/// Only short suffixes count as a source name; a long tail after the dash is
/// part of the headline and left alone.
pub fn split_title_source(title: &str) -> (String, Option<String>) {
    if let Some((head, tail)) = title.rsplit_once(" - ") {
        let tail = tail.trim();
        if !head.trim().is_empty() && !tail.is_empty() && tail.chars().count() <= 30 {
            return (head.trim().to_string(), Some(tail.to_string()));
        }
    }
    (title.trim().to_string(), None)
}

/// Truncate to at most `max` characters, on a char boundary.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        input.to_string()
    } else {
        input.chars().take(max).collect()
    }
}

/// Strip tracking parameters (`utm_*`, `fbclid`, `gclid`, `igshid`) from a
/// URL, keeping the rest of the query. Unparseable URLs pass through as-is.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.trim().to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            !TRACKING_PARAM_PREFIXES.iter().any(|p| key.starts_with(p))
                && !TRACKING_PARAMS.iter().any(|p| key == p)
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }
    url.to_string()
}

/// Strip the full query off a URL; the deduplicator's equivalence key.
pub fn url_without_query(raw: &str) -> String {
    match raw.split_once('?') {
        Some((head, _)) => head.to_string(),
        None => raw.to_string(),
    }
}

/// Resolve the publish timestamp through the fallback chain:
/// structured timestamp, generic parse of the raw date string, a date
/// pattern in the URL, and finally the current time.
pub fn resolve_published(entry: &FeedEntry) -> DateTime<Utc> {
    known_published(entry).unwrap_or_else(Utc::now)
}

/// The fallback chain without the current-time step: what the entry itself
/// says about its publish date. The recency filter keys on this, so a stale
/// date carried only in the raw string or the URL still ages the entry out.
pub fn known_published(entry: &FeedEntry) -> Option<DateTime<Utc>> {
    entry
        .published
        .or_else(|| entry.raw_date.as_deref().and_then(parse_date_string))
        .or_else(|| extract_date_from_url(&entry.link))
}

/// Parse a free-text date string: RFC 2822, RFC 3339, then a handful of
/// common formats seen in Korean news feeds.
pub fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(
                date.and_hms_opt(12, 0, 0)?,
                Utc,
            ));
        }
    }
    None
}

/// Recognize `/2026/08/29/` and `/2026-08-29/` style date segments in URLs.
pub fn extract_date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let caps = RE_URL_DATE_SLASH
        .captures(url)
        .or_else(|| RE_URL_DATE_DASH.captures(url))?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(12, 0, 0)?,
        Utc,
    ))
}

/// Resolve the display source: a trailing title suffix wins, then the
/// entry's own source element, the feed title, and finally the hostname
/// with a leading `www.` stripped.
pub fn resolve_source(
    title_source: Option<&str>,
    entry: &FeedEntry,
) -> String {
    if let Some(src) = title_source {
        return src.to_string();
    }
    if let Some(src) = entry.entry_source.as_deref().map(str::trim) {
        if !src.is_empty() {
            return src.to_string();
        }
    }
    if let Some(title) = entry.feed_title.as_deref().map(str::trim) {
        if !title.is_empty() {
            return title.to_string();
        }
    }
    hostname_of(&entry.link).unwrap_or_else(|| "Unknown".to_string())
}

fn hostname_of(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Build a clean [`NewsRecord`] from a filtered entry and its tag list.
///
/// The record's thumbnail starts out empty; the image resolver fills it in
/// afterwards.
pub fn normalize_entry(entry: &FeedEntry, tags: &[String], tab: &str) -> NewsRecord {
    let (bare_title, title_source) = split_title_source(entry.title.trim());
    let category = resolve_source(title_source.as_deref(), entry);

    let title = truncate_chars(&strip_html(&bare_title), TITLE_MAX_CHARS);

    let mut description = strip_bylines(&strip_html(&entry.description), Some(&category));
    if description.is_empty() {
        description = EMPTY_DESCRIPTION_PLACEHOLDER.to_string();
    }
    let description = truncate_chars(&description, DESCRIPTION_MAX_CHARS);

    let published_at = resolve_published(entry);
    let original_url = normalize_url(&entry.link);

    NewsRecord {
        id: models::record_id(tab, &original_url),
        title,
        description,
        category,
        tags: tags.join(","),
        date: published_at.format("%Y-%m-%d").to_string(),
        download_count: 0,
        thumbnail: None,
        original_url,
        tab: tab.to_string(),
        published_at,
    }
}
