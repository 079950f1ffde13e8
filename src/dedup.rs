//! Deduplicator: one configurable pass over the run's matched records.
//!
//! The scan is stable and left-to-right; the first occurrence of an
//! equivalence class keeps its position. When a later duplicate carries a
//! longer description, its content replaces the kept record's in place.
//! Running the pass on its own output is a fixpoint.

use strsim::normalized_levenshtein;
use tracing::debug;

use crate::models::NewsRecord;
use crate::normalize::url_without_query;

/// Fuzzy title similarity above this makes two records duplicates under the
/// comprehensive strategy.
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Which equivalences collapse two records into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Exact match on the query-stripped URL only.
    UrlOnly,
    /// Query-stripped URL match, or fuzzy title similarity above
    /// [`TITLE_SIMILARITY_THRESHOLD`].
    UrlAndTitle,
}

/// Collapse duplicate records, keeping one per equivalence class.
pub fn dedup(records: Vec<NewsRecord>, strategy: DedupStrategy) -> Vec<NewsRecord> {
    let total = records.len();
    let mut kept: Vec<NewsRecord> = Vec::with_capacity(total);

    for record in records {
        let url_key = url_without_query(&record.original_url);
        let title_key = comparable_title(&record.title);

        let existing = kept.iter_mut().find(|prior| {
            if url_without_query(&prior.original_url) == url_key {
                return true;
            }
            strategy == DedupStrategy::UrlAndTitle
                && normalized_levenshtein(&comparable_title(&prior.title), &title_key)
                    > TITLE_SIMILARITY_THRESHOLD
        });

        match existing {
            Some(prior) => {
                if record.description.chars().count() > prior.description.chars().count() {
                    prior.description = record.description;
                }
            }
            None => kept.push(record),
        }
    }

    debug!(total, unique = kept.len(), ?strategy, "Deduplicated records");
    kept
}

/// Lowercase a title and drop punctuation/whitespace before comparison.
fn comparable_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
