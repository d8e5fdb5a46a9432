//! Built-in fetch-and-parse extractor.
//!
//! [`HttpExtractor`] downloads a page with `reqwest` and pulls readable text
//! out of the first content container that holds enough of it. It declares no
//! escalation hooks, so it always gets exactly one basic-level attempt.
//! Only HTML responses that decode as UTF-8 are parsed; anything else is a
//! parse error, which sends the executor down the fallback chain.
//!
//! Two header profiles are provided: a desktop browser, and a mobile browser
//! arriving from a search engine (which gets past some bot walls that block
//! desktop agents).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, REFERER,
};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{ExtractRequest, ExtractedContent, Extractor, ExtractorError, METADATA_TITLE};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

/// Containers tried in order; the first one holding enough text wins.
const CONTENT_SELECTORS: [&str; 8] = [
    "article",
    "main",
    "[role=\"main\"]",
    ".article-content",
    ".post-content",
    ".entry-content",
    "#content",
    "body",
];

/// A container must hold at least this many characters to be picked over later ones.
const SELECTOR_MIN_CHARS: usize = 50;

/// Elements whose text is never content.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
/// Media types parsed as HTML. A response without `Content-Type` is parsed too.
const HTML_MEDIA_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Request header profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserProfile {
    /// Desktop Chrome.
    Desktop,
    /// Mobile Safari referred from a search engine.
    Mobile,
}

impl BrowserProfile {
    /// Name the built-in extractor using this profile is registered under.
    #[must_use]
    pub fn extractor_name(self) -> &'static str {
        match self {
            Self::Desktop => "http",
            Self::Mobile => "http-mobile",
        }
    }

    fn user_agent(self) -> &'static str {
        match self {
            Self::Desktop => DESKTOP_USER_AGENT,
            Self::Mobile => MOBILE_USER_AGENT,
        }
    }

    fn headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if self == Self::Mobile {
            headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
            for (name, value) in [
                ("dnt", "1"),
                ("upgrade-insecure-requests", "1"),
                ("sec-fetch-dest", "document"),
                ("sec-fetch-mode", "navigate"),
                ("sec-fetch-site", "cross-site"),
            ] {
                headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
            }
        }
        headers
    }
}

/// Fetches a page over HTTP and extracts its readable text.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    profile: BrowserProfile,
}

impl HttpExtractor {
    /// Creates an extractor using the given header profile.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error when the client cannot be built
    /// (e.g. TLS backend initialization failure).
    pub fn new(profile: BrowserProfile) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .user_agent(profile.user_agent())
            .default_headers(profile.headers())
            .gzip(true)
            .build()?;
        Ok(Self { client, profile })
    }

    /// Returns the header profile.
    #[must_use]
    pub fn profile(&self) -> BrowserProfile {
        self.profile
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    #[tracing::instrument(skip(self, request), fields(url = %request.url, profile = ?self.profile))]
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractedContent, ExtractorError> {
        let url = request.url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractorError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractorError::http_status(url, status.as_u16()));
        }

        if let Some(media_type) = media_type(response.headers())
            && !HTML_MEDIA_TYPES.contains(&media_type.as_str())
        {
            return Err(ExtractorError::parse(
                url,
                format!("unsupported content type '{media_type}'"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExtractorError::network(url, e))?;
        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractorError::parse(url, format!("body is not valid UTF-8: {e}")))?;

        let (text, title) = readable_text(&body);
        debug!(chars = text.chars().count(), "parsed page");

        let mut metadata = HashMap::new();
        if let Some(title) = title.or_else(|| request.context.title.clone()) {
            metadata.insert(METADATA_TITLE.to_string(), title);
        }
        Ok(ExtractedContent::with_metadata(text, metadata))
    }
}

/// Lowercased media type of the `Content-Type` header, parameters dropped.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() { None } else { Some(essence) }
}

/// Extracts readable text and the `<title>` from an HTML document.
///
/// Tries [`CONTENT_SELECTORS`] in order and returns the first container with
/// at least [`SELECTOR_MIN_CHARS`] characters; if none qualifies, the longest
/// text seen is returned so the caller's validator can make the final call.
#[must_use]
pub fn readable_text(html: &str) -> (String, Option<String>) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
            .filter(|title| !title.is_empty())
    });

    let mut best = String::new();
    for source in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(source) else {
            continue;
        };
        let Some(element) = document.select(&selector).next() else {
            continue;
        };
        let text = element_text(element);
        if text.chars().count() >= SELECTOR_MIN_CHARS {
            return (text, title);
        }
        if text.len() > best.len() {
            best = text;
        }
    }
    (best, title)
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name().to_string()))
            .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name.as_str()));
        if !skipped {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
