//! Sink writers: persist the final record set.
//!
//! Three mutually exclusive destinations are supported per run:
//!
//! - [`json`]: local file with a `{tab, rows}` envelope
//! - [`csv`]: local file with a fixed 9-field header
//! - [`sheets`]: row-append to a Google Sheets worksheet
//!
//! [`drive`] is not a record sink; it optionally hosts optimized thumbnails
//! so the spreadsheet can carry a short public URL instead of a base64 blob.
//!
//! All sinks are append-only with a duplicate check by `original_url`
//! against rows already present; no sink ever updates or deletes a row.

pub mod csv;
pub mod drive;
pub mod json;
pub mod sheets;

/// What an append pass did.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendStats {
    /// Rows newly written.
    pub appended: usize,
    /// Rows skipped because their URL (or ID) was already present.
    pub skipped: usize,
}
