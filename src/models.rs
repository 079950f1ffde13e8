//! Data models for harvested news records.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`NewsRecord`]: a cleaned, persisted news mention (one sink row)
//! - [`FeedEntry`]: a transient view of one raw feed item before filtering
//!
//! Records are created fresh each run from feed entries; they are never
//! updated in place and never deleted by this code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum stored title length, in characters.
pub const TITLE_MAX_CHARS: usize = 200;

/// Maximum stored description length, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// A cleaned news mention ready for persistence.
///
/// One `NewsRecord` corresponds to one row in the destination sink. The
/// `original_url` is unique within a single run's output after deduplication,
/// and `id` is unique within the destination sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsRecord {
    /// Deterministic content-hash identifier, see [`record_id`].
    pub id: String,
    /// Article headline, at most [`TITLE_MAX_CHARS`] characters, with any
    /// trailing `" - <source>"` suffix stripped.
    pub title: String,
    /// HTML-stripped summary, at most [`DESCRIPTION_MAX_CHARS`] characters.
    pub description: String,
    /// Human-readable source/outlet name.
    pub category: String,
    /// Comma-joined list of the keywords that matched this entry.
    pub tags: String,
    /// Publish date in `YYYY-MM-DD` format.
    pub date: String,
    /// Always 0 at creation; maintained by downstream consumers.
    pub download_count: u32,
    /// Representative image: a URL or an inline `data:image/jpeg;base64,`
    /// payload. Absent when no acceptable image was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Article URL with tracking parameters stripped.
    pub original_url: String,
    /// Content-type / worksheet label this record belongs to.
    pub tab: String,
    /// Full publish timestamp, kept for chronological sorting only.
    #[serde(skip, default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

/// A transient, read-only view of one raw feed item.
///
/// Produced by the feed fetcher and consumed by the filter and normalizer.
/// Fields mirror what RSS and Atom entries actually carry; everything except
/// `title` and `link` is best-effort.
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    /// Entry title as published (may carry a `" - <source>"` suffix).
    pub title: String,
    /// Raw description or summary HTML.
    pub description: String,
    /// Article link.
    pub link: String,
    /// Structured publish timestamp, when the feed supplied one.
    pub published: Option<DateTime<Utc>>,
    /// Free-text date string for the generic-parse fallback chain.
    pub raw_date: Option<String>,
    /// Title of the entry's own `<source>` element, if present.
    pub entry_source: Option<String>,
    /// Title of the feed the entry came from.
    pub feed_title: Option<String>,
    /// Image URL from `media:thumbnail`, `media:content`, or an image-MIME
    /// enclosure, if the feed supplied one.
    pub media_image: Option<String>,
}

/// Derive the deterministic record identifier for a tab + URL pair.
///
/// The ID is `news_` followed by the first 12 hex characters of the SHA-256
/// digest of `tab`, a newline, and the normalized URL. The same article in
/// the same tab always hashes to the same ID, across runs and sinks.
pub fn record_id(tab: &str, original_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tab.as_bytes());
    hasher.update(b"\n");
    hasher.update(original_url.as_bytes());
    let digest = hasher.finalize();
    format!("news_{}", &hex::encode(digest)[..12])
}
