//! Local CSV sink with a fixed header.
//!
//! The file at `{output_dir}/{tab}.csv` is created with the header row when
//! absent; subsequent runs append rows whose `original_url` is not already
//! present. The column order is fixed and the thumbnail is deliberately
//! omitted: inline base64 payloads do not belong in a CSV.

use std::collections::HashSet;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::error::HarvestError;
use crate::models::NewsRecord;
use crate::sinks::AppendStats;

/// Fixed CSV column order.
pub const HEADER: [&str; 9] = [
    "id",
    "title",
    "description",
    "category",
    "tags",
    "date",
    "download_count",
    "original_url",
    "tab",
];

fn record_fields(record: &NewsRecord) -> [String; 9] {
    [
        record.id.clone(),
        record.title.clone(),
        record.description.clone(),
        record.category.clone(),
        record.tags.clone(),
        record.date.clone(),
        record.download_count.to_string(),
        record.original_url.clone(),
        record.tab.clone(),
    ]
}

/// URLs already present in an existing CSV file's bytes.
fn existing_urls(bytes: &[u8]) -> Result<HashSet<String>, HarvestError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let url_index = reader
        .headers()
        .map_err(|e| HarvestError::SinkAppend(format!("existing CSV header unreadable: {e}")))?
        .iter()
        .position(|h| h == "original_url")
        .ok_or_else(|| HarvestError::SinkAppend("existing CSV lacks original_url column".into()))?;

    let mut urls = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| HarvestError::SinkAppend(e.to_string()))?;
        if let Some(url) = row.get(url_index) {
            urls.insert(url.to_string());
        }
    }
    Ok(urls)
}

/// Serialize rows (no header) into CSV bytes.
fn encode_rows(records: &[&NewsRecord]) -> Result<Vec<u8>, HarvestError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .write_record(record_fields(record))
            .map_err(|e| HarvestError::SinkAppend(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| HarvestError::SinkAppend(e.to_string()))
}

/// Create-or-append records to the CSV file for a tab.
#[instrument(level = "info", skip(records), fields(%output_dir, %tab, incoming = records.len()))]
pub async fn append_records(
    output_dir: &str,
    tab: &str,
    records: &[NewsRecord],
) -> Result<AppendStats, HarvestError> {
    let path = format!("{}/{}.csv", output_dir.trim_end_matches('/'), tab);

    let (seen, file_exists) = match fs::read(&path).await {
        Ok(bytes) => (existing_urls(&bytes)?, true),
        Err(_) => (HashSet::new(), false),
    };

    let mut stats = AppendStats::default();
    let fresh: Vec<&NewsRecord> = records
        .iter()
        .filter(|r| {
            if seen.contains(&r.original_url) {
                stats.skipped += 1;
                false
            } else {
                stats.appended += 1;
                true
            }
        })
        .collect();

    let mut payload = Vec::new();
    if !file_exists {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(HEADER)
            .map_err(|e| HarvestError::SinkAppend(e.to_string()))?;
        payload = writer
            .into_inner()
            .map_err(|e| HarvestError::SinkAppend(e.to_string()))?;
    }
    payload.extend(encode_rows(&fresh)?);

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| HarvestError::SinkAppend(format!("open {path} failed: {e}")))?;
    file.write_all(&payload)
        .await
        .map_err(|e| HarvestError::SinkAppend(e.to_string()))?;

    info!(path = %path, appended = stats.appended, skipped = stats.skipped, "Appended CSV rows");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(url: &str) -> NewsRecord {
        NewsRecord {
            id: crate::models::record_id("news_data", url),
            title: "파이프트리, \"따옴표\" 포함 제목".to_string(),
            description: "줄바꿈 없는 설명".to_string(),
            category: "매일경제".to_string(),
            tags: "파이프트리,paiptree".to_string(),
            date: "2026-08-24".to_string(),
            download_count: 0,
            thumbnail: Some("unused-in-csv".to_string()),
            original_url: url.to_string(),
            tab: "news_data".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_header_order_is_fixed() {
        assert_eq!(
            HEADER.join(","),
            "id,title,description,category,tags,date,download_count,original_url,tab"
        );
    }

    #[test]
    fn test_rows_omit_thumbnail_and_quote_safely() {
        let r = record("http://x.com/a");
        let bytes = encode_rows(&[&r]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("unused-in-csv"));
        // the quoted title survives a csv round trip
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.get(1).unwrap(), "파이프트리, \"따옴표\" 포함 제목");
    }

    #[tokio::test]
    async fn test_append_records_deduplicates_across_runs() {
        let dir = std::env::temp_dir().join("newshound_csv_sink_test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let dir = dir.to_str().unwrap().to_string();
        let _ = tokio::fs::remove_file(format!("{dir}/news_data.csv")).await;

        let first = append_records(&dir, "news_data", &[record("http://x.com/a")])
            .await
            .unwrap();
        assert_eq!(first.appended, 1);

        let second = append_records(
            &dir,
            "news_data",
            &[record("http://x.com/a"), record("http://x.com/b")],
        )
        .await
        .unwrap();
        assert_eq!(second.appended, 1);
        assert_eq!(second.skipped, 1);

        let contents = tokio::fs::read_to_string(format!("{dir}/news_data.csv"))
            .await
            .unwrap();
        assert_eq!(contents.lines().count(), 3); // header + two rows
        assert!(contents.lines().next().unwrap().starts_with("id,title"));
    }
}
