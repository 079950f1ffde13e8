//! Feed fetcher: one parse request per feed URL.
//!
//! Fetches a feed with the shared HTTP client and parses the bytes first as
//! RSS 2.0, then as Atom. Raw items are mapped into [`FeedEntry`] values,
//! surfacing the extras the normalizer and image resolver care about:
//! `media:thumbnail` / `media:content` extension URLs, image-MIME enclosures,
//! the entry's own `<source>` title, and the feed title.

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::HarvestError;
use crate::models::FeedEntry;

/// Fetch and parse one feed URL into entries.
///
/// # Errors
///
/// Returns [`HarvestError`] when the request fails, the server answers with
/// a non-success status, or the payload parses as neither RSS nor Atom.
/// Callers log the error and continue with the next feed.
#[instrument(level = "info", skip(client))]
pub async fn fetch_feed(client: &Client, url: &str) -> Result<Vec<FeedEntry>, HarvestError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(HarvestError::BadStatus {
            status: response.status().as_u16(),
            context: url.to_string(),
        });
    }

    let content = response.bytes().await?;

    // Try parsing as RSS first, then Atom
    if let Ok(channel) = rss::Channel::read_from(&content[..]) {
        let entries = parse_rss_channel(&channel);
        debug!(count = entries.len(), "Parsed RSS channel");
        return Ok(entries);
    }

    if let Ok(feed) = atom_syndication::Feed::read_from(&content[..]) {
        let entries = parse_atom_feed(&feed);
        debug!(count = entries.len(), "Parsed Atom feed");
        return Ok(entries);
    }

    Err(HarvestError::ParseFailed(format!(
        "payload is neither RSS nor Atom: {url}"
    )))
}

fn parse_rss_channel(channel: &rss::Channel) -> Vec<FeedEntry> {
    let feed_title = non_empty(channel.title());

    channel
        .items()
        .iter()
        .filter_map(|item| {
            let link = item.link()?.to_string();
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc));

            // dc:date fills in for feeds that omit pubDate
            let raw_date = item.pub_date().map(String::from).or_else(|| {
                item.dublin_core_ext()
                    .and_then(|dc| dc.dates().first().cloned())
            });

            Some(FeedEntry {
                title: item.title().unwrap_or_default().to_string(),
                description: item.description().unwrap_or_default().to_string(),
                link,
                published,
                raw_date,
                entry_source: item.source().and_then(|s| s.title()).map(String::from),
                feed_title: feed_title.clone(),
                media_image: enclosure_image(item).or_else(|| media_extension_image(item)),
            })
        })
        .collect()
}

fn parse_atom_feed(feed: &atom_syndication::Feed) -> Vec<FeedEntry> {
    let feed_title = non_empty(feed.title());

    feed.entries()
        .iter()
        .filter_map(|entry| {
            let link = entry.links().first().map(|l| l.href().to_string())?;
            let published = entry
                .published()
                .copied()
                .or_else(|| Some(*entry.updated()))
                .map(|d| d.with_timezone(&Utc));

            let summary = entry.summary().map(|s| s.to_string()).unwrap_or_default();
            let content = entry
                .content()
                .and_then(|c| c.value())
                .unwrap_or_default()
                .to_string();

            Some(FeedEntry {
                title: entry.title().to_string(),
                description: if summary.is_empty() { content } else { summary },
                link,
                published,
                raw_date: entry.published().map(|d| d.to_rfc3339()),
                entry_source: entry.source().and_then(|s| non_empty(s.title())),
                feed_title: feed_title.clone(),
                media_image: None,
            })
        })
        .collect()
}

/// Image URL from an enclosure carrying an image MIME type.
fn enclosure_image(item: &rss::Item) -> Option<String> {
    item.enclosure()
        .filter(|e| e.mime_type().starts_with("image/"))
        .map(|e| e.url().to_string())
}

/// Image URL from `media:content` or `media:thumbnail` extensions.
fn media_extension_image(item: &rss::Item) -> Option<String> {
    let media = item.extensions().get("media")?;

    if let Some(content_list) = media.get("content") {
        for content in content_list {
            if let Some(url) = content.attrs().get("url") {
                let medium = content.attrs().get("medium").map(|s| s.as_str());
                let mime = content.attrs().get("type").map(|s| s.as_str());
                let looks_image = medium == Some("image")
                    || mime.map(|m| m.starts_with("image/")).unwrap_or(false)
                    || [".jpg", ".jpeg", ".png", ".webp"]
                        .iter()
                        .any(|ext| url.ends_with(ext));
                if looks_image {
                    return Some(url.clone());
                }
            }
        }
    }

    if let Some(thumbnail_list) = media.get("thumbnail") {
        for thumbnail in thumbnail_list {
            if let Some(url) = thumbnail.attrs().get("url") {
                return Some(url.clone());
            }
        }
    }

    None
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>네이버 뉴스 검색 :: 파이프트리</title>
    <item>
      <title>파이프트리 투자 유치 - 매일경제</title>
      <link>http://x.com/a?utm_source=rss</link>
      <description>&lt;p&gt;회사 소개&lt;/p&gt;</description>
      <pubDate>Mon, 24 Aug 2026 09:30:00 +0900</pubDate>
      <source url="http://mk.co.kr/rss">매일경제</source>
      <enclosure url="http://img.x.com/a.jpg" length="1000" type="image/jpeg"/>
    </item>
    <item>
      <title>undated entry</title>
      <link>http://x.com/b</link>
      <description>plain</description>
    </item>
    <item>
      <title>dc-dated entry</title>
      <link>http://x.com/c</link>
      <description>plain</description>
      <dc:date>2026-08-23T10:00:00+09:00</dc:date>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Brand Mentions</title>
  <updated>2026-08-24T00:00:00Z</updated>
  <id>urn:feed</id>
  <entry>
    <title>paiptree raises round</title>
    <id>urn:entry</id>
    <updated>2026-08-24T01:00:00Z</updated>
    <link href="http://y.com/article"/>
    <summary>summary text</summary>
  </entry>
  <entry>
    <title>farmersmind launch</title>
    <id>urn:entry2</id>
    <updated>2026-08-24T02:00:00Z</updated>
    <link href="http://y.com/other"/>
    <source>
      <id>urn:origin</id>
      <title>매일경제</title>
      <updated>2026-08-24T00:00:00Z</updated>
    </source>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_channel_maps_fields() {
        let channel = rss::Channel::read_from(RSS_FIXTURE.as_bytes()).unwrap();
        let entries = parse_rss_channel(&channel);
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.title, "파이프트리 투자 유치 - 매일경제");
        assert_eq!(first.link, "http://x.com/a?utm_source=rss");
        assert!(first.published.is_some());
        assert_eq!(first.entry_source.as_deref(), Some("매일경제"));
        assert_eq!(
            first.feed_title.as_deref(),
            Some("네이버 뉴스 검색 :: 파이프트리")
        );
        assert_eq!(first.media_image.as_deref(), Some("http://img.x.com/a.jpg"));

        assert!(entries[1].published.is_none());
        assert!(entries[1].raw_date.is_none());
        assert!(entries[1].media_image.is_none());

        assert!(entries[2].published.is_none());
        assert_eq!(
            entries[2].raw_date.as_deref(),
            Some("2026-08-23T10:00:00+09:00")
        );
    }

    #[test]
    fn test_parse_atom_feed_falls_back_to_updated() {
        let feed = atom_syndication::Feed::read_from(ATOM_FIXTURE.as_bytes()).unwrap();
        let entries = parse_atom_feed(&feed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "http://y.com/article");
        assert_eq!(entries[0].description, "summary text");
        assert!(entries[0].published.is_some());
        assert!(entries[0].entry_source.is_none());
    }

    #[test]
    fn test_parse_atom_feed_surfaces_source_title() {
        let feed = atom_syndication::Feed::read_from(ATOM_FIXTURE.as_bytes()).unwrap();
        let entries = parse_atom_feed(&feed);
        assert_eq!(entries[1].entry_source.as_deref(), Some("매일경제"));
    }
}
