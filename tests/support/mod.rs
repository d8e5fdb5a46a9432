//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use digestor_core::{
    EscalationController, EscalationHooks, EscalationLevel, EscalationPolicy, ExtractRequest,
    ExtractedContent, ExtractionExecutor, ExtractionPattern, Extractor, ExtractorError,
    FailureCache, MetricsRecorder, PatternCatalog, RoutePlanner, RoutingDefaults,
};

/// Extractor whose output per escalation level is fixed up front.
///
/// Levels without a script fail with an extraction error.
#[derive(Default)]
pub struct ScriptedExtractor {
    texts: HashMap<EscalationLevel, String>,
    hooks: bool,
    delay: Duration,
    calls: AtomicUsize,
    levels: Mutex<Vec<EscalationLevel>>,
    consent_calls: AtomicUsize,
    scroll_calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `text` at every level.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut extractor = Self::new();
        for level in EscalationLevel::ALL {
            extractor.texts.insert(level, text.clone());
        }
        extractor
    }

    pub fn at(mut self, level: EscalationLevel, text: impl Into<String>) -> Self {
        self.texts.insert(level, text.into());
        self
    }

    pub fn with_hooks(mut self) -> Self {
        self.hooks = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn levels(&self) -> Vec<EscalationLevel> {
        self.levels.lock().unwrap().clone()
    }

    pub fn consent_calls(&self) -> usize {
        self.consent_calls.load(Ordering::SeqCst)
    }

    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractedContent, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.levels.lock().unwrap().push(request.level);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.texts
            .get(&request.level)
            .map(ExtractedContent::new)
            .ok_or_else(|| ExtractorError::failed(&request.url, "no content scripted"))
    }

    fn escalation(&self) -> Option<&dyn EscalationHooks> {
        if self.hooks { Some(self) } else { None }
    }
}

#[async_trait]
impl EscalationHooks for ScriptedExtractor {
    async fn dismiss_consent(&self, _request: &ExtractRequest) -> Result<bool, ExtractorError> {
        self.consent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn trigger_scroll(&self, _request: &ExtractRequest) -> Result<(), ExtractorError> {
        self.scroll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `n` characters of article-ish text.
pub fn text_of(n: usize) -> String {
    "lorem ipsum ".chars().cycle().take(n).collect()
}

/// Routing defaults with the given default extractor and fallback chain.
pub fn defaults(default_method: &str, fallback: &[&str]) -> RoutingDefaults {
    RoutingDefaults {
        default_method: default_method.to_string(),
        default_fallback: fallback.iter().map(ToString::to_string).collect(),
        default_timeout: Duration::from_secs(10),
    }
}

/// Catalog with each extractor registered under its name and no match rules.
pub fn catalog_of(
    defaults: RoutingDefaults,
    extractors: &[(&str, Arc<ScriptedExtractor>)],
) -> PatternCatalog {
    let mut catalog = PatternCatalog::new(defaults);
    for (name, extractor) in extractors {
        let handler: Arc<dyn Extractor> = extractor.clone();
        catalog
            .register(ExtractionPattern::new(*name, handler))
            .unwrap();
    }
    catalog
}

/// Executor over `catalog` with the default escalation policy.
pub fn executor_for(catalog: PatternCatalog) -> ExtractionExecutor {
    ExtractionExecutor::new(
        RoutePlanner::new(Arc::new(catalog)),
        EscalationController::new(EscalationPolicy::default(), Default::default()),
        Arc::new(FailureCache::new()),
        Arc::new(MetricsRecorder::new()),
    )
}
