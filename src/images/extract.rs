//! Candidate extraction and heuristic scoring for article images.
//!
//! Candidates are collected in priority order: the `og:image` meta tag,
//! JSON-LD structured-data image fields (string, `{url}` object, array, and
//! `@graph` shapes), images under a prioritized list of content-area
//! selectors, and finally a bare `<img>` scan when too few candidates were
//! found. Logos, icons, share buttons, ad slots, and tracking pixels are
//! rejected up front, as is anything whose URL encodes a size below the
//! minimum threshold.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Minimum acceptable image dimensions.
pub const MIN_WIDTH: u32 = 200;
pub const MIN_HEIGHT: u32 = 150;

/// A bare `<img>` scan only runs when fewer candidates than this were found.
const MIN_CANDIDATES_BEFORE_SCAN: usize = 3;

/// Content-area selectors, in priority order. Earlier matches score higher.
const CONTENT_SELECTORS: &[&str] = &[
    "article img",
    ".article-body img",
    ".article_body img",
    "#articleBody img",
    ".news-content img",
    ".news_body img",
    "figure img",
    ".content img",
    "main img",
];

/// URL substrings associated with logos, icons, social/share chrome, ads,
/// tracking pixels, and platform logos.
const EXCLUDE_SUBSTRINGS: &[&str] = &[
    "logo",
    "icon",
    "favicon",
    "sprite",
    "banner",
    "button",
    "btn_",
    "share",
    "sns",
    "/ad/",
    "/ads/",
    "ad_",
    "pixel",
    "1x1",
    "spacer",
    "blank",
    "facebook",
    "twitter",
    "kakao",
    "naver_",
    "youtube",
];

static RE_URL_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2,4})x(\d{2,4})").unwrap());

/// Where a candidate was found; earlier origins are more trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    OgImage,
    JsonLd,
    /// Index into [`CONTENT_SELECTORS`].
    Selector(usize),
    ImgScan,
}

/// One scored image candidate. Transient within the resolver.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub url: String,
    pub origin: CandidateOrigin,
    pub score: i32,
    /// Width/height declared in markup, when present.
    pub declared: Option<(u32, u32)>,
}

/// Collect and score image candidates from an article page.
///
/// The result is sorted best-first. An empty result means the page offered
/// nothing acceptable (for instance, only a site logo).
pub fn collect_candidates(html: &str, base: &Url) -> Vec<ImageCandidate> {
    let document = Html::parse_document(html);
    let mut candidates: Vec<ImageCandidate> = Vec::new();

    // 1. og:image meta tag
    if let Some(url) = meta_content(&document, "og:image") {
        if let Some(resolved) = acceptable_url(&url, base) {
            let declared = meta_dimensions(&document);
            candidates.push(scored(resolved, CandidateOrigin::OgImage, declared, None, None, false));
        }
    }

    // 2. JSON-LD image fields
    for url in json_ld_images(&document) {
        if let Some(resolved) = acceptable_url(&url, base) {
            if !candidates.iter().any(|c| c.url == resolved) {
                candidates.push(scored(resolved, CandidateOrigin::JsonLd, None, None, None, false));
            }
        }
    }

    // 3. Prioritized content-area selectors
    for (rank, selector) in CONTENT_SELECTORS.iter().enumerate() {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&sel) {
            push_img_element(&mut candidates, element, base, CandidateOrigin::Selector(rank));
        }
    }

    // 4. Bare <img> scan, only if the page yielded too little
    if candidates.len() < MIN_CANDIDATES_BEFORE_SCAN {
        if let Ok(sel) = Selector::parse("img") {
            for element in document.select(&sel) {
                push_img_element(&mut candidates, element, base, CandidateOrigin::ImgScan);
            }
        }
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.score));
    candidates
}

fn push_img_element(
    candidates: &mut Vec<ImageCandidate>,
    element: scraper::ElementRef<'_>,
    base: &Url,
    origin: CandidateOrigin,
) {
    let value = element.value();
    let src = value.attr("src");
    let data_src = value.attr("data-src");
    let lazy_only = src.is_none() && data_src.is_some();
    let Some(raw) = src.or(data_src) else {
        return;
    };
    let Some(resolved) = acceptable_url(raw, base) else {
        return;
    };
    if candidates.iter().any(|c| c.url == resolved) {
        return;
    }

    let declared = declared_dimensions(value.attr("width"), value.attr("height"));
    if let Some((w, h)) = declared {
        if w < MIN_WIDTH || h < MIN_HEIGHT {
            return;
        }
    }

    candidates.push(scored(
        resolved,
        origin,
        declared,
        value.attr("alt"),
        value.attr("class"),
        lazy_only,
    ));
}

fn scored(
    url: String,
    origin: CandidateOrigin,
    declared: Option<(u32, u32)>,
    alt: Option<&str>,
    class: Option<&str>,
    lazy_only: bool,
) -> ImageCandidate {
    let mut score = match origin {
        CandidateOrigin::OgImage => 120,
        CandidateOrigin::JsonLd => 110,
        CandidateOrigin::Selector(rank) => 80 - 5 * rank as i32,
        CandidateOrigin::ImgScan => 10,
    };

    if let Some((w, h)) = declared {
        let area = w as u64 * h as u64;
        if area >= 400 * 300 {
            score += 30;
        } else if area >= MIN_WIDTH as u64 * MIN_HEIGHT as u64 {
            score += 15;
        }
    }

    if let Some(alt) = alt {
        let lowered = alt.to_lowercase();
        if ["logo", "icon", "button", "배너"].iter().any(|w| lowered.contains(w)) {
            score -= 40;
        } else if alt.chars().count() >= 10 {
            score += 15;
        }
    }

    if let Some(class) = class {
        let lowered = class.to_lowercase();
        if ["logo", "icon", "banner", "btn"].iter().any(|w| lowered.contains(w)) {
            score -= 40;
        } else if ["photo", "article", "news", "thumb"].iter().any(|w| lowered.contains(w)) {
            score += 10;
        }
    }

    if lazy_only {
        score -= 5;
    }

    ImageCandidate {
        url,
        origin,
        score,
        declared,
    }
}

/// Resolve a raw src against the page URL and apply the exclusion rules.
fn acceptable_url(raw: &str, base: &Url) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("data:") {
        return None;
    }
    let resolved = base.join(trimmed).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    let as_str = resolved.to_string();
    let lowered = as_str.to_lowercase();
    if EXCLUDE_SUBSTRINGS.iter().any(|pat| lowered.contains(pat)) {
        return None;
    }
    if let Some((w, h)) = url_encoded_size(&lowered) {
        if w < MIN_WIDTH || h < MIN_HEIGHT {
            return None;
        }
    }
    Some(as_str)
}

/// Size hints encoded in the URL itself, like `thumb_120x90.jpg`.
fn url_encoded_size(url: &str) -> Option<(u32, u32)> {
    let caps = RE_URL_SIZE.captures(url)?;
    let w: u32 = caps.get(1)?.as_str().parse().ok()?;
    let h: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some((w, h))
}

fn declared_dimensions(width: Option<&str>, height: Option<&str>) -> Option<(u32, u32)> {
    let w: u32 = width?.trim().parse().ok()?;
    let h: u32 = height?.trim().parse().ok()?;
    Some((w, h))
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(String::from)
}

fn meta_dimensions(document: &Html) -> Option<(u32, u32)> {
    let w: u32 = meta_content(document, "og:image:width")?.trim().parse().ok()?;
    let h: u32 = meta_content(document, "og:image:height")?.trim().parse().ok()?;
    Some((w, h))
}

/// Image URLs from JSON-LD blocks. We try several shapes: a plain string,
/// an object with a `url`, arrays of either, and `@graph` members.
fn json_ld_images(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };
    let mut urls = Vec::new();
    for node in document.select(&selector) {
        let text: String = node.text().collect();
        if let Ok(json) = serde_json::from_str::<Value>(&text) {
            collect_jsonld_image_urls(&json, &mut urls);
        }
    }
    urls
}

fn collect_jsonld_image_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(image) = obj.get("image") {
                collect_image_field(image, out);
            }
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                for member in graph {
                    collect_jsonld_image_urls(member, out);
                }
            }
        }
        Value::Array(arr) => {
            for member in arr {
                collect_jsonld_image_urls(member, out);
            }
        }
        _ => {}
    }
}

fn collect_image_field(image: &Value, out: &mut Vec<String>) {
    match image {
        Value::String(s) => out.push(s.clone()),
        Value::Object(obj) => {
            if let Some(Value::String(s)) = obj.get("url") {
                out.push(s.clone());
            }
        }
        Value::Array(arr) => {
            for member in arr {
                collect_image_field(member, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://news.example.com/2026/08/24/story").unwrap()
    }

    #[test]
    fn test_logo_only_page_yields_nothing() {
        let html = r#"<html><body>
            <img src="/static/logo.png" class="logo" alt="site logo">
        </body></html>"#;
        assert!(collect_candidates(html, &base()).is_empty());
    }

    #[test]
    fn test_og_image_ranks_first() {
        let html = r#"<html><head>
            <meta property="og:image" content="http://cdn.example.com/main.jpg">
        </head><body>
            <article><img src="/photos/inline.jpg" width="640" height="480"></article>
        </body></html>"#;
        let candidates = collect_candidates(html, &base());
        assert!(candidates.len() >= 2);
        assert_eq!(candidates[0].origin, CandidateOrigin::OgImage);
        assert_eq!(candidates[0].url, "http://cdn.example.com/main.jpg");
    }

    #[test]
    fn test_larger_declared_image_wins() {
        let html = r#"<html><body><article>
            <img src="/photos/small.jpg" width="100" height="100">
            <img src="/photos/large.jpg" width="500" height="400">
        </article></body></html>"#;
        let candidates = collect_candidates(html, &base());
        assert_eq!(candidates[0].url, "http://news.example.com/photos/large.jpg");
        // the 100x100 image is below the minimum threshold entirely
        assert!(candidates.iter().all(|c| !c.url.ends_with("small.jpg")));
    }

    #[test]
    fn test_url_encoded_size_below_threshold_is_rejected() {
        let html = r#"<html><body><article>
            <img src="/photos/thumb_120x90.jpg">
            <img src="/photos/wide_800x600.jpg">
        </article></body></html>"#;
        let candidates = collect_candidates(html, &base());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.ends_with("wide_800x600.jpg"));
    }

    #[test]
    fn test_json_ld_shapes() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
                {"@type":"NewsArticle","image":{"url":"http://cdn.example.com/graph.jpg"}},
                {"@type":"Organization","image":"http://cdn.example.com/second.jpg"}
            ]}
            </script>
        </head><body></body></html>"#;
        let candidates = collect_candidates(html, &base());
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert!(urls.contains(&"http://cdn.example.com/graph.jpg"));
        assert!(urls.contains(&"http://cdn.example.com/second.jpg"));
        assert_eq!(candidates[0].origin, CandidateOrigin::JsonLd);
    }

    #[test]
    fn test_share_buttons_and_pixels_are_excluded() {
        let html = r#"<html><body><article>
            <img src="/sns/share_facebook.png" width="640" height="480">
            <img src="http://tracker.example.com/pixel.gif">
            <img src="/photos/story.jpg" width="640" height="480" alt="현장 사진이 담긴 보도 이미지">
        </article></body></html>"#;
        let candidates = collect_candidates(html, &base());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.ends_with("story.jpg"));
        // descriptive alt text earned a bonus
        assert!(candidates[0].score > 80);
    }

    #[test]
    fn test_lazy_loaded_images_are_kept_with_penalty() {
        let html = r#"<html><body><article>
            <img src="/photos/eager.jpg">
            <img data-src="/photos/lazy.jpg">
        </article></body></html>"#;
        let candidates = collect_candidates(html, &base());
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].url.ends_with("eager.jpg"));
    }
}
