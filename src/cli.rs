//! Command-line interface definitions for the newshound harvester.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can be provided as a command-line flag or through the
//! environment variable named alongside it, matching the surfaces the
//! harvester is deployed with in CI.

use clap::{Parser, ValueEnum};

/// Which destination persists the final records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    /// Local JSON file with a `{tab, rows}` envelope.
    Json,
    /// Local CSV file with a fixed header.
    Csv,
    /// Remote Google Sheets worksheet.
    Sheets,
}

/// Worksheet column layout for the sheets sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaArg {
    /// 9-column schema: id through original_url.
    Standard,
    /// 21-column Materials schema with file-metadata placeholders.
    Materials,
}

/// Deduplication strategy for the final record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DedupArg {
    /// Exact match on the query-stripped URL only.
    Url,
    /// URL match plus fuzzy title similarity above 0.85.
    Comprehensive,
}

/// Command-line arguments for the newshound harvester.
///
/// # Examples
///
/// ```sh
/// # Default JSON output into ./output
/// newshound
///
/// # Historical backfill into a Google Sheet
/// INITIAL_COLLECTION=true GOOGLE_SHEETS_ID=... GOOGLE_CREDENTIALS=... \
///     newshound --sink sheets --schema materials
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Backfill mode: ignore the 7-day recency window and collect everything
    #[arg(long, env = "INITIAL_COLLECTION", default_value_t = false)]
    pub backfill: bool,

    /// Tab / worksheet label attached to every record
    #[arg(long, env = "OUTPUT_TAB", default_value = "news_data")]
    pub tab: String,

    /// Destination sink for the final records
    #[arg(long, env = "NEWSHOUND_SINK", value_enum, default_value_t = SinkArg::Json)]
    pub sink: SinkArg,

    /// Output directory for file sinks
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "./output")]
    pub output_dir: String,

    /// Worksheet column layout (sheets sink only)
    #[arg(long, env = "SHEET_SCHEMA", value_enum, default_value_t = SchemaArg::Materials)]
    pub schema: SchemaArg,

    /// Inline service-account credential JSON (sheets/drive)
    #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true)]
    pub google_credentials: Option<String>,

    /// Spreadsheet ID to append rows to (sheets sink only)
    #[arg(long, env = "GOOGLE_SHEETS_ID")]
    pub sheets_id: Option<String>,

    /// Google Drive folder name for hosted thumbnails (optional)
    #[arg(long, env = "DRIVE_FOLDER")]
    pub drive_folder: Option<String>,

    /// Comma-separated keyword list overriding the built-in brand keywords
    #[arg(long, env = "KEYWORDS", value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Feed URLs overriding the built-in news-search feeds
    #[arg(long, env = "RSS_FEEDS", value_delimiter = ',')]
    pub feeds: Vec<String>,

    /// Deduplication strategy
    #[arg(long, env = "DEDUP_STRATEGY", value_enum, default_value_t = DedupArg::Comprehensive)]
    pub dedup: DedupArg,

    /// Expand tags to every alias of a matched brand group
    #[arg(long, env = "CROSS_TAGS", default_value_t = false)]
    pub cross_tags: bool,

    /// Skip article-image resolution entirely
    #[arg(long, default_value_t = false)]
    pub skip_images: bool,

    /// Keep the winning image URL as-is instead of re-encoding it
    #[arg(long, default_value_t = false)]
    pub no_image_optimize: bool,

    /// Embed optimized thumbnails as base64 data URLs instead of source URLs
    #[arg(long, env = "INLINE_THUMBNAILS", default_value_t = false)]
    pub inline_thumbnails: bool,

    /// Per-keyword fallback image, as repeated `keyword=url` pairs
    #[arg(long = "default-image", value_name = "KEYWORD=URL")]
    pub default_images: Vec<String>,

    /// Flat delay between successive feed fetches, in seconds
    #[arg(long, env = "FEED_DELAY_SECS", default_value_t = 1)]
    pub feed_delay_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["newshound"]);
        assert!(!cli.backfill);
        assert_eq!(cli.tab, "news_data");
        assert_eq!(cli.sink, SinkArg::Json);
        assert_eq!(cli.dedup, DedupArg::Comprehensive);
        assert_eq!(cli.feed_delay_secs, 1);
        assert!(cli.keywords.is_empty());
    }

    #[test]
    fn test_cli_sink_and_schema() {
        let cli = Cli::parse_from([
            "newshound",
            "--sink",
            "sheets",
            "--schema",
            "standard",
            "--sheets-id",
            "abc123",
        ]);
        assert_eq!(cli.sink, SinkArg::Sheets);
        assert_eq!(cli.schema, SchemaArg::Standard);
        assert_eq!(cli.sheets_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cli_comma_separated_keywords() {
        let cli = Cli::parse_from(["newshound", "--keywords", "paiptree,farmersmind"]);
        assert_eq!(cli.keywords, vec!["paiptree", "farmersmind"]);
    }

    #[test]
    fn test_cli_repeated_default_images() {
        let cli = Cli::parse_from([
            "newshound",
            "--default-image",
            "paiptree=https://cdn.example.com/p.jpg",
            "--default-image",
            "farmersmind=https://cdn.example.com/f.jpg",
        ]);
        assert_eq!(cli.default_images.len(), 2);
    }
}
