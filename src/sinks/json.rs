//! Local JSON sink: a `{tab, rows}` envelope per tab.
//!
//! The file at `{output_dir}/{tab}.json` is read back if it exists and
//! incoming rows whose `original_url` is already present are skipped, so
//! repeated runs accumulate without duplicating.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::HarvestError;
use crate::models::NewsRecord;
use crate::sinks::AppendStats;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    tab: String,
    rows: Vec<NewsRecord>,
}

/// Merge incoming rows into existing ones, skipping already-present URLs.
fn merge_rows(existing: Vec<NewsRecord>, incoming: Vec<NewsRecord>) -> (Vec<NewsRecord>, AppendStats) {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.original_url.clone()).collect();
    let mut rows = existing;
    let mut stats = AppendStats::default();
    for record in incoming {
        if seen.insert(record.original_url.clone()) {
            rows.push(record);
            stats.appended += 1;
        } else {
            stats.skipped += 1;
        }
    }
    (rows, stats)
}

/// Write (or merge into) the JSON envelope for a tab.
#[instrument(level = "info", skip(records), fields(%output_dir, %tab, incoming = records.len()))]
pub async fn write_records(
    output_dir: &str,
    tab: &str,
    records: Vec<NewsRecord>,
) -> Result<AppendStats, HarvestError> {
    let path = format!("{}/{}.json", output_dir.trim_end_matches('/'), tab);

    let existing = match fs::read(&path).await {
        Ok(bytes) => serde_json::from_slice::<Envelope>(&bytes)
            .map_err(|e| HarvestError::SinkAppend(format!("existing envelope unreadable: {e}")))?
            .rows,
        Err(_) => Vec::new(),
    };

    let (rows, stats) = merge_rows(existing, records);
    let envelope = Envelope {
        tab: tab.to_string(),
        rows,
    };

    let json = serde_json::to_string_pretty(&envelope)
        .map_err(|e| HarvestError::SinkAppend(e.to_string()))?;
    fs::write(&path, json)
        .await
        .map_err(|e| HarvestError::SinkAppend(format!("write {path} failed: {e}")))?;

    info!(path = %path, appended = stats.appended, skipped = stats.skipped, "Wrote JSON envelope");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(url: &str, title: &str) -> NewsRecord {
        NewsRecord {
            id: crate::models::record_id("news_data", url),
            title: title.to_string(),
            description: "desc".to_string(),
            category: "매일경제".to_string(),
            tags: "파이프트리".to_string(),
            date: "2026-08-24".to_string(),
            download_count: 0,
            thumbnail: None,
            original_url: url.to_string(),
            tab: "news_data".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_skips_existing_urls() {
        let existing = vec![record("http://x.com/a", "old")];
        let incoming = vec![record("http://x.com/a", "dup"), record("http://x.com/b", "new")];
        let (rows, stats) = merge_rows(existing, incoming);
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.skipped, 1);
        // first-seen content wins
        assert_eq!(rows[0].title, "old");
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope {
            tab: "news_data".to_string(),
            rows: vec![record("http://x.com/a", "t")],
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.starts_with(r#"{"tab":"news_data","rows":["#));
    }

    #[tokio::test]
    async fn test_write_records_round_trip() {
        let dir = std::env::temp_dir().join("newshound_json_sink_test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let dir = dir.to_str().unwrap().to_string();
        let _ = tokio::fs::remove_file(format!("{dir}/news_data.json")).await;

        let first = write_records(&dir, "news_data", vec![record("http://x.com/a", "t1")])
            .await
            .unwrap();
        assert_eq!(first.appended, 1);

        let second = write_records(
            &dir,
            "news_data",
            vec![record("http://x.com/a", "t1"), record("http://x.com/b", "t2")],
        )
        .await
        .unwrap();
        assert_eq!(second.appended, 1);
        assert_eq!(second.skipped, 1);
    }
}
