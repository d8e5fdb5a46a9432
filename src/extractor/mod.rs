//! Extractor capability interface and built-in HTTP extractors.
//!
//! An extractor turns a URL into text plus metadata, or fails with an
//! [`ExtractorError`]. Extractors that can benefit from progressive retries
//! (browser-backed ones, typically) also expose [`EscalationHooks`]; the
//! escalation controller checks for them at call time via
//! [`Extractor::escalation`].
//!
//! # Architecture
//!
//! - [`Extractor`] - Async trait every extraction capability implements
//! - [`EscalationHooks`] - Optional consent-dismissal and scroll-trigger hooks
//! - [`ExtractRequest`] - One invocation's inputs (URL, caller context, level)
//! - [`HttpExtractor`] - Built-in fetch-and-parse extractor (`http`, `http-mobile`)

mod error;
mod http;

pub use error::ExtractorError;
pub use http::{BrowserProfile, HttpExtractor, readable_text};

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;

use crate::escalation::EscalationLevel;

/// Metadata key naming the extractor that produced the content.
pub const METADATA_EXTRACTION_METHOD: &str = "extraction_method";
/// Metadata key naming the escalation strategy that produced the content.
pub const METADATA_STRATEGY: &str = "strategy";
/// Metadata key for the page title.
pub const METADATA_TITLE: &str = "title";

/// Caller-supplied context for one extraction request.
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    /// Title already known from the feed entry, if any.
    pub title: Option<String>,
    /// Free-form options from the matching site override.
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ExtractContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context carrying a known title.
    #[must_use]
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            options: BTreeMap::new(),
        }
    }
}

/// Inputs for a single extractor invocation at one escalation level.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// URL to extract.
    pub url: String,
    /// Caller context plus override options.
    pub context: ExtractContext,
    /// Escalation level this invocation runs at.
    pub level: EscalationLevel,
    /// Extra settle time granted at this level. The controller has already
    /// paused for it before invoking the extractor.
    pub extra_wait: Duration,
}

impl ExtractRequest {
    /// Creates a basic-level request with no extra wait.
    #[must_use]
    pub fn basic(url: impl Into<String>, context: ExtractContext) -> Self {
        Self {
            url: url.into(),
            context,
            level: EscalationLevel::Basic,
            extra_wait: Duration::ZERO,
        }
    }
}

/// Text and metadata produced by an extractor.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    /// Extracted plain text.
    pub text: String,
    /// Optional metadata (title, byline, ...).
    pub metadata: HashMap<String, String>,
}

impl ExtractedContent {
    /// Creates content with no metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Creates content with metadata.
    #[must_use]
    pub fn with_metadata(text: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Returns the title metadata, if present.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata.get(METADATA_TITLE).map(String::as_str)
    }
}

/// Trait that all extraction capabilities implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn Extractor>`, which the pattern catalog stores.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Attempts to extract text from `request.url`.
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractedContent, ExtractorError>;

    /// Escalation hooks, if this extractor supports progressive retries.
    ///
    /// Extractors returning `None` get exactly one basic-level attempt.
    fn escalation(&self) -> Option<&dyn EscalationHooks> {
        None
    }
}

/// Optional interaction hooks run by the escalation controller before an
/// extraction attempt at levels above basic.
#[async_trait]
pub trait EscalationHooks: Send + Sync {
    /// Tries to dismiss a cookie-consent banner. Returns whether one was dismissed.
    async fn dismiss_consent(&self, _request: &ExtractRequest) -> Result<bool, ExtractorError> {
        Ok(false)
    }

    /// Scrolls the page to trigger lazy-loaded content.
    async fn trigger_scroll(&self, _request: &ExtractRequest) -> Result<(), ExtractorError> {
        Ok(())
    }
}
