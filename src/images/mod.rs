//! Image resolver: pick one representative image for a news record.
//!
//! Resolution cascade, each step degrading gracefully to the next:
//! 1. A feed-provided media thumbnail or enclosure short-circuits scraping.
//! 2. Otherwise the article page is fetched (with retries) and candidates
//!    are collected and heuristically scored ([`extract`]).
//! 3. The top candidates are probe-downloaded to measure true pixel area;
//!    anything below the minimum size is dropped and the largest wins.
//! 4. The winner is optionally downloaded in full, flattened, resized, and
//!    re-encoded as JPEG ([`optimize`]).
//! 5. A per-keyword default image is the last resort.
//!
//! No failure in this module is ever fatal to the run; the worst outcome is
//! a record without a thumbnail.

pub mod extract;
pub mod fetch;
pub mod optimize;

use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ImageOptions;
use extract::{ImageCandidate, MIN_HEIGHT, MIN_WIDTH};
use fetch::Fetcher;

/// How many top-scored candidates get a measured-dimension probe.
const MEASURE_TOP_N: usize = 5;

/// The resolver's result: what goes in the record, plus the optimized JPEG
/// bytes when re-encoding ran (kept for optional Drive hosting).
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// Image URL or inline `data:image/jpeg;base64,` payload.
    pub thumbnail: String,
    /// Optimized JPEG bytes, present only when optimization ran.
    pub jpeg: Option<Vec<u8>>,
}

/// Resolves one representative image per article, sequentially.
#[derive(Debug)]
pub struct ImageResolver {
    fetcher: Fetcher,
    options: ImageOptions,
}

impl ImageResolver {
    pub fn new(client: Client, options: ImageOptions) -> Self {
        Self {
            fetcher: Fetcher::new(client),
            options,
        }
    }

    /// Resolve the best image for an article.
    ///
    /// `feed_image` is a thumbnail the feed itself supplied; `fallback` is
    /// the per-keyword default URL. Returns `None` when nothing acceptable
    /// was found anywhere.
    #[instrument(level = "info", skip(self, feed_image, fallback), fields(%article_url))]
    pub async fn resolve(
        &self,
        article_url: &str,
        feed_image: Option<&str>,
        fallback: Option<String>,
    ) -> Option<ResolvedImage> {
        if self.options.skip {
            return None;
        }

        if let Some(url) = feed_image {
            debug!(%url, "Using feed-provided thumbnail");
            return Some(self.finalize(url).await);
        }

        match self.scrape_best_url(article_url).await {
            Some(url) => Some(self.finalize(&url).await),
            None => {
                debug!(%article_url, "No acceptable article image; using fallback");
                fallback.map(|url| ResolvedImage {
                    thumbnail: url,
                    jpeg: None,
                })
            }
        }
    }

    /// Scrape the article page and pick the winning candidate URL.
    async fn scrape_best_url(&self, article_url: &str) -> Option<String> {
        let base = Url::parse(article_url).ok()?;
        let html = match self.fetcher.page_text(article_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, %article_url, "Article fetch failed; no image");
                return None;
            }
        };

        let candidates = extract::collect_candidates(&html, &base);
        if candidates.is_empty() {
            return None;
        }

        match self.pick_by_measured_area(&candidates).await {
            Some(winner) => Some(winner),
            // every probe failed; trust the heuristic ranking
            None => candidates.first().map(|c| c.url.clone()),
        }
    }

    /// Probe the top candidates and keep the largest measured image.
    ///
    /// Candidates measuring below the minimum size are dropped even when
    /// their heuristic score was high. Returns `None` when no probe
    /// produced usable dimensions.
    async fn pick_by_measured_area(&self, candidates: &[ImageCandidate]) -> Option<String> {
        let mut best: Option<(u64, &ImageCandidate)> = None;
        for candidate in candidates.iter().take(MEASURE_TOP_N) {
            let Some((w, h)) = self.fetcher.probe_dimensions(&candidate.url).await else {
                continue;
            };
            if w < MIN_WIDTH || h < MIN_HEIGHT {
                debug!(url = %candidate.url, w, h, "Measured below minimum size; dropped");
                continue;
            }
            let area = w as u64 * h as u64;
            if best.map(|(prev, _)| area > prev).unwrap_or(true) {
                best = Some((area, candidate));
            }
        }
        best.map(|(_, c)| c.url.clone())
    }

    /// Turn a winning URL into the final thumbnail, optimizing if enabled.
    async fn finalize(&self, url: &str) -> ResolvedImage {
        if !self.options.optimize {
            return ResolvedImage {
                thumbnail: url.to_string(),
                jpeg: None,
            };
        }

        let bytes = match self.fetcher.image_bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, %url, "Image download failed; keeping source URL");
                return ResolvedImage {
                    thumbnail: url.to_string(),
                    jpeg: None,
                };
            }
        };

        match optimize::optimize(&bytes, self.options.max_size) {
            Ok(jpeg) => {
                let thumbnail = if self.options.inline {
                    optimize::to_data_url(&jpeg)
                } else {
                    url.to_string()
                };
                ResolvedImage {
                    thumbnail,
                    jpeg: Some(jpeg),
                }
            }
            Err(e) => {
                warn!(error = %e, %url, "Image re-encode failed; keeping source URL");
                ResolvedImage {
                    thumbnail: url.to_string(),
                    jpeg: None,
                }
            }
        }
    }
}
