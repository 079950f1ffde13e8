//! Retrying HTTP fetch for article pages and images.
//!
//! # Retry Strategy
//!
//! - Maximum 3 attempts per URL
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! Dimension probing downloads only a prefix of the image (2 KB, doubling up
//! to 50 KB) and decodes just the header, so losing candidates never cost a
//! full download.

use image::ImageReader;
use rand::{rng, Rng};
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::HarvestError;

/// First probe prefix size in bytes; doubled each step up to the cap.
const PROBE_INITIAL_BYTES: usize = 2 * 1024;
/// Largest probe prefix before the candidate is given up on.
const PROBE_MAX_BYTES: usize = 50 * 1024;

/// Article/image fetcher with bounded exponential-backoff retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl Fetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Fetch a page body as text, retrying transient failures.
    #[instrument(level = "debug", skip(self))]
    pub async fn page_text(&self, url: &str) -> Result<String, HarvestError> {
        let bytes = self.get_with_backoff(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch a full image body, retrying transient failures.
    #[instrument(level = "debug", skip(self))]
    pub async fn image_bytes(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        self.get_with_backoff(url).await
    }

    /// Measure an image's true pixel dimensions from a partial download.
    ///
    /// Requests a byte-range prefix and decodes only the header, growing the
    /// prefix until the decoder can report dimensions. Returns `None` when
    /// every prefix up to the cap fails; probe failures are never fatal.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe_dimensions(&self, url: &str) -> Option<(u32, u32)> {
        let mut limit = PROBE_INITIAL_BYTES;
        loop {
            match self.fetch_prefix(url, limit).await {
                Ok(bytes) => {
                    if let Some(dims) = decode_dimensions(&bytes) {
                        debug!(width = dims.0, height = dims.1, bytes = bytes.len(), "Probed image dimensions");
                        return Some(dims);
                    }
                }
                Err(e) => {
                    warn!(error = %e, %url, "Dimension probe request failed");
                    return None;
                }
            }
            if limit >= PROBE_MAX_BYTES {
                return None;
            }
            limit = (limit * 2).min(PROBE_MAX_BYTES);
        }
    }

    /// Single-attempt ranged GET; servers that ignore Range get truncated.
    async fn fetch_prefix(&self, url: &str, limit: usize) -> Result<Vec<u8>, HarvestError> {
        let response = self
            .client
            .get(url)
            .header("Range", format!("bytes=0-{}", limit - 1))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::BadStatus {
                status: response.status().as_u16(),
                context: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        let take = body.len().min(limit);
        Ok(body[..take].to_vec())
    }

    async fn get_with_backoff(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        let mut attempt = 0usize;
        loop {
            match self.fetch_full(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        %url,
                        "Fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_full(&self, url: &str) -> Result<Vec<u8>, HarvestError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(HarvestError::BadStatus {
                status: response.status().as_u16(),
                context: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Decode width x height from (possibly truncated) image bytes.
fn decode_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
