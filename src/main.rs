//! # newshound
//!
//! A brand-mention harvester that polls news-search RSS/Atom feeds for
//! configured keywords, cleans and deduplicates the matched entries,
//! scrapes a representative image from each article page, and archives the
//! records to a JSON file, a CSV file, or a Google Sheets worksheet
//! (optionally hosting thumbnails on Google Drive).
//!
//! ## Usage
//!
//! ```sh
//! # Local JSON archive of the last 7 days
//! newshound --sink json -o ./output
//!
//! # Historical backfill into a Google Sheet
//! INITIAL_COLLECTION=true GOOGLE_CREDENTIALS=... GOOGLE_SHEETS_ID=... \
//!     newshound --sink sheets --schema materials
//! ```
//!
//! ## Architecture
//!
//! The application is a strictly sequential pipeline, driven per feed URL
//! and then across all feeds:
//! 1. **Fetch**: parse each feed as RSS, falling back to Atom
//! 2. **Filter**: keyword match plus the 7-day recency window
//! 3. **Normalize**: strip HTML/bylines, resolve dates, clean URLs
//! 4. **Resolve image**: og:image/JSON-LD/DOM heuristics, measured ranking
//! 5. **Dedup**: one configurable pass over the whole run
//! 6. **Sink**: append-only write with per-row duplicate checks

use clap::Parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dedup;
mod error;
mod feeds;
mod filter;
mod images;
mod models;
mod normalize;
mod sinks;
mod utils;

use cli::Cli;
use config::{Config, SinkKind};
use error::SetupError;
use images::ImageResolver;
use models::NewsRecord;
use sinks::drive::DriveUploader;
use sinks::sheets::SheetsSink;
use sinks::AppendStats;
use utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), SetupError> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newshound starting up");

    // Parse CLI and build the run configuration; any failure here is fatal
    // and happens before network work begins.
    let args = Cli::parse();
    debug!(?args.sink, ?args.tab, backfill = args.backfill, "Parsed CLI arguments");
    let config = Config::from_cli(args).inspect_err(|e| {
        error!(error = %e, "Configuration invalid");
    })?;

    if config.backfill {
        info!("Backfill mode: recency window disabled, collecting all matches");
    } else {
        info!(days = filter::RECENCY_WINDOW_DAYS, "Normal mode: recent news only");
    }

    // Early check: file sinks need a writable output directory
    if matches!(config.sink, SinkKind::Json | SinkKind::Csv) {
        if let Err(e) = ensure_writable_dir(&config.output_dir).await {
            error!(
                path = %config.output_dir,
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(SetupError::OutputPath(e));
        }
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config::HTTP_TIMEOUT_SECS))
        .user_agent(config::USER_AGENT)
        .build()
        .map_err(SetupError::HttpClient)?;

    // ---- Sink bootstrap (fatal) and optional Drive hosting (degradable) ----
    let token = match &config.service_account {
        Some(sa) => Some(sinks::sheets::access_token(&client, sa).await?),
        None => None,
    };

    let mut sheets = match (config.sink, &token, &config.sheets_id) {
        (SinkKind::Sheets, Some(token), Some(id)) => Some(
            SheetsSink::connect(client.clone(), token.clone(), id, &config.tab, config.schema)
                .await?,
        ),
        _ => None,
    };

    let drive = match (&config.drive_folder, &token) {
        (Some(folder), Some(token)) => {
            match DriveUploader::connect(client.clone(), token.clone(), folder).await {
                Ok(uploader) => Some(uploader),
                Err(e) => {
                    warn!(error = %e, folder = %folder, "Drive setup failed; thumbnails stay inline");
                    None
                }
            }
        }
        _ => None,
    };

    // ---- Harvest: one feed fully processed before the next ----
    let resolver = ImageResolver::new(client.clone(), config.images.clone());
    info!(
        feeds = config.feeds.len(),
        keywords = ?config.keywords,
        "Searching feeds for brand mentions"
    );

    let mut all_records: Vec<NewsRecord> = Vec::new();
    let mut total_found = 0usize;
    for (i, feed_url) in config.feeds.iter().enumerate() {
        if i > 0 && config.feed_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(config.feed_delay_secs)).await;
        }

        let entries = match feeds::fetch_feed(&client, feed_url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, feed = %feed_url, "Feed fetch failed; skipping");
                continue;
            }
        };
        info!(count = entries.len(), feed = %feed_url, "Fetched feed entries");

        let matched = filter::filter_entries(entries, &config.keywords, config.backfill);
        total_found += matched.len();

        let records: Vec<NewsRecord> = stream::iter(matched)
            .then(|(entry, matched_keywords)| {
                let config = &config;
                let resolver = &resolver;
                let drive = &drive;
                async move {
                    let tags = config.expand_tags(&matched_keywords);
                    let mut record = normalize::normalize_entry(&entry, &tags, &config.tab);
                    debug!(
                        title = %truncate_for_log(&record.title, 50),
                        date = %record.date,
                        tags = %record.tags,
                        "Keyword match"
                    );

                    if !config.images.skip {
                        let resolved = resolver
                            .resolve(
                                &record.original_url,
                                entry.media_image.as_deref(),
                                config.default_image_for(&matched_keywords),
                            )
                            .await;
                        if let Some(image) = resolved {
                            record.thumbnail = Some(match (&drive, image.jpeg) {
                                (Some(uploader), Some(jpeg)) => {
                                    let filename = format!("{}.jpg", record.id);
                                    match uploader.upload_jpeg(jpeg, &filename).await {
                                        Ok(url) => url,
                                        Err(e) => {
                                            warn!(error = %e, "Drive upload failed; keeping local thumbnail");
                                            image.thumbnail
                                        }
                                    }
                                }
                                _ => image.thumbnail,
                            });
                        }
                    }
                    record
                }
            })
            .collect()
            .await;

        info!(count = records.len(), feed = %feed_url, "Matched news in feed");
        all_records.extend(records);
    }

    // ---- Sort chronologically, then dedup across the whole run ----
    all_records.sort_by_key(|r| r.published_at);
    let unique = dedup::dedup(all_records, config.dedup);
    info!(found = total_found, unique = unique.len(), "Deduplicated run output");

    // ---- Persist ----
    let stats = match config.sink {
        SinkKind::Json => {
            match sinks::json::write_records(&config.output_dir, &config.tab, unique).await {
                Ok(stats) => stats,
                Err(e) => {
                    error!(error = %e, "Failed to write JSON output");
                    AppendStats::default()
                }
            }
        }
        SinkKind::Csv => {
            match sinks::csv::append_records(&config.output_dir, &config.tab, &unique).await {
                Ok(stats) => stats,
                Err(e) => {
                    error!(error = %e, "Failed to write CSV output");
                    AppendStats::default()
                }
            }
        }
        SinkKind::Sheets => match sheets.as_mut() {
            Some(sink) => {
                let mut stats = AppendStats::default();
                for record in &unique {
                    match sink.append(record).await {
                        Ok(true) => stats.appended += 1,
                        Ok(false) => stats.skipped += 1,
                        Err(e) => {
                            warn!(
                                error = %e,
                                url = %record.original_url,
                                "Row append failed; continuing with next record"
                            );
                        }
                    }
                }
                stats
            }
            None => {
                return Err(SetupError::MissingConfig(
                    "sheets sink selected but no worksheet connection was established",
                ));
            }
        },
    };

    let elapsed = start_time.elapsed();
    info!(
        found = total_found,
        appended = stats.appended,
        skipped = stats.skipped,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Harvest complete"
    );
    if stats.appended == 0 {
        info!("No new news this run");
    }

    Ok(())
}
