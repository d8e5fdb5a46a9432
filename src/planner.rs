//! Turns a catalog lookup into an immutable execution plan.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::catalog::{ConfigurationError, PatternCatalog, ResolutionSource};

/// Everything the executor needs to process one URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionPlan {
    /// URL being extracted.
    pub url: String,
    /// Primary extractor name.
    pub primary: String,
    /// Fallback extractor names, tried in order.
    pub fallback_chain: Vec<String>,
    /// Per-invocation timeout.
    #[serde(rename = "effective_timeout_ms", serialize_with = "serialize_millis")]
    pub effective_timeout: Duration,
    /// Which precedence tier chose the primary.
    pub source: ResolutionSource,
    /// Override options passed to extractors.
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ExtractionPlan {
    /// Primary followed by the fallback chain.
    pub fn extractors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback_chain.iter().map(String::as_str))
    }
}

/// Serializes a duration as whole milliseconds.
pub(crate) fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Builds plans from a shared catalog. Planning has no side effects.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    catalog: Arc<PatternCatalog>,
}

impl RoutePlanner {
    /// Creates a planner over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    /// Plans extraction of `url`.
    ///
    /// # Errors
    ///
    /// Propagates the catalog's [`ConfigurationError`] unchanged.
    pub fn plan(&self, url: &str) -> Result<ExtractionPlan, ConfigurationError> {
        let resolution = self.catalog.resolve(url)?;
        Ok(ExtractionPlan {
            url: url.to_string(),
            primary: resolution.extractor_name,
            fallback_chain: resolution.fallback_chain,
            effective_timeout: resolution.timeout,
            source: resolution.source,
            options: resolution.options,
        })
    }
}
