//! Pattern catalog answering "which extractor(s) should handle this URL".
//!
//! The catalog is built once at startup: extraction patterns are registered,
//! site overrides from the config file are added, and the result is shared
//! read-only (behind an `Arc`) by every request. Resolution precedence is:
//!
//! 1. the first enabled [`SiteOverride`] whose rule matches (most specific first)
//! 2. the first enabled [`ExtractionPattern`] whose rules match, in priority order
//! 3. the default extractor named in [`RoutingDefaults`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use digestor_core::catalog::{ExtractionPattern, PatternCatalog, RoutingDefaults, SiteOverride};
//! use digestor_core::extractor::{BrowserProfile, HttpExtractor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(HttpExtractor::new(BrowserProfile::Desktop)?);
//! let mobile = Arc::new(HttpExtractor::new(BrowserProfile::Mobile)?);
//!
//! let mut catalog = PatternCatalog::new(RoutingDefaults::default());
//! catalog.register(ExtractionPattern::new("http", http))?;
//! catalog.register(ExtractionPattern::new("http-mobile", mobile))?;
//! catalog.add_override(SiteOverride::new("medium.com", "http-mobile")?);
//!
//! let resolution = catalog.resolve("https://medium.com/@someone/post")?;
//! assert_eq!(resolution.extractor_name, "http-mobile");
//! # Ok(())
//! # }
//! ```

mod error;
mod rules;

pub use error::ConfigurationError;
pub use rules::{MatchRule, MatchTarget, canonical_host};

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::extractor::{BrowserProfile, Extractor, HttpExtractor};

/// Default extractor name.
pub const DEFAULT_METHOD: &str = "http";

/// Default per-invocation timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A registered extraction strategy and the URLs it claims.
///
/// The pattern name doubles as the extractor name that overrides and fallback
/// chains refer to. A pattern with no rules never matches on its own but is
/// still reachable by name.
#[derive(Clone)]
pub struct ExtractionPattern {
    /// Unique name.
    pub name: String,
    /// Rules; any one matching claims the URL.
    pub rules: Vec<MatchRule>,
    /// Higher values are checked first.
    pub priority: i32,
    /// The extractor capability.
    pub handler: Arc<dyn Extractor>,
    /// Disabled patterns are skipped during matching but stay addressable by name.
    pub enabled: bool,
}

impl ExtractionPattern {
    /// Creates an enabled pattern with priority 0 and no rules.
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<dyn Extractor>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            priority: 0,
            handler,
            enabled: true,
        }
    }

    /// Adds a rule parsed from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if the rule is empty or
    /// its glob cannot be compiled.
    pub fn matching(mut self, raw: &str) -> Result<Self, ConfigurationError> {
        self.rules.push(MatchRule::parse(raw)?);
        Ok(self)
    }

    /// Adds an already-built rule.
    #[must_use]
    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets whether the pattern takes part in matching.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn claims(&self, target: &MatchTarget) -> bool {
        self.enabled && self.rules.iter().any(|rule| rule.matches(target))
    }
}

impl fmt::Debug for ExtractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(ToString::to_string).collect();
        f.debug_struct("ExtractionPattern")
            .field("name", &self.name)
            .field("rules", &rules)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// A config-supplied routing rule that outranks every registered pattern.
#[derive(Debug, Clone)]
pub struct SiteOverride {
    /// Which URLs the override applies to.
    pub rule: MatchRule,
    /// Primary extractor name.
    pub method: String,
    /// Fallback extractor names; `None` means the global default fallback.
    pub fallback: Option<Vec<String>>,
    /// Per-invocation timeout; `None` means the global default.
    pub timeout: Option<Duration>,
    /// Free-form options handed to extractors.
    pub options: BTreeMap<String, serde_json::Value>,
    /// Disabled overrides are ignored.
    pub enabled: bool,
}

impl SiteOverride {
    /// Creates an enabled override routing `pattern` to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if `pattern` cannot be parsed.
    pub fn new(pattern: &str, method: impl Into<String>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            rule: MatchRule::parse(pattern)?,
            method: method.into(),
            fallback: None,
            timeout: None,
            options: BTreeMap::new(),
            enabled: true,
        })
    }

    /// Sets an explicit fallback chain (possibly empty).
    #[must_use]
    pub fn with_fallback<I, S>(mut self, fallback: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback = Some(fallback.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the options bag.
    #[must_use]
    pub fn with_options(mut self, options: BTreeMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    /// Sets whether the override is active.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Global routing defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDefaults {
    /// Extractor used when nothing else matches.
    pub default_method: String,
    /// Fallback chain used when a match does not specify one.
    pub default_fallback: Vec<String>,
    /// Timeout used when a match does not specify one.
    pub default_timeout: Duration,
}

impl Default for RoutingDefaults {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_string(),
            default_fallback: vec![BrowserProfile::Mobile.extractor_name().to_string()],
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Which tier of the precedence order produced a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "matched", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A site override (carries its pattern text).
    Override(String),
    /// A registered pattern (carries its name).
    Pattern(String),
    /// Nothing matched.
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override(pattern) => write!(f, "override '{pattern}'"),
            Self::Pattern(name) => write!(f, "pattern '{name}'"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// The catalog's answer for one URL.
#[derive(Clone)]
pub struct Resolution {
    /// Primary extractor name.
    pub extractor_name: String,
    /// Primary extractor.
    pub handler: Arc<dyn Extractor>,
    /// Ordered fallback names; deduplicated and never containing the primary.
    pub fallback_chain: Vec<String>,
    /// Effective per-invocation timeout.
    pub timeout: Duration,
    /// Which precedence tier matched.
    pub source: ResolutionSource,
    /// Options from the matching override, if any.
    pub options: BTreeMap<String, serde_json::Value>,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("extractor_name", &self.extractor_name)
            .field("fallback_chain", &self.fallback_chain)
            .field("timeout", &self.timeout)
            .field("source", &self.source)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Registered patterns plus config overrides.
///
/// Patterns are kept sorted by priority descending; the sort is stable, so
/// equal priorities keep registration order. Overrides are kept sorted most
/// specific (longest pattern text) first, ties broken lexically, so the
/// result never depends on config file ordering.
pub struct PatternCatalog {
    patterns: Vec<ExtractionPattern>,
    overrides: Vec<SiteOverride>,
    defaults: RoutingDefaults,
}

impl PatternCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new(defaults: RoutingDefaults) -> Self {
        Self {
            patterns: Vec::new(),
            overrides: Vec::new(),
            defaults,
        }
    }

    /// Registers a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateExtractor`] if the name is taken.
    #[tracing::instrument(skip(self, pattern), fields(pattern = %pattern.name))]
    pub fn register(&mut self, pattern: ExtractionPattern) -> Result<(), ConfigurationError> {
        if self.patterns.iter().any(|p| p.name == pattern.name) {
            return Err(ConfigurationError::duplicate(&pattern.name));
        }
        debug!(
            priority = pattern.priority,
            rules = pattern.rules.len(),
            "Registering extraction pattern"
        );
        self.patterns.push(pattern);
        self.patterns.sort_by_key(|p| Reverse(p.priority));
        Ok(())
    }

    /// Adds a site override.
    pub fn add_override(&mut self, site: SiteOverride) {
        debug!(pattern = %site.rule, method = %site.method, "Adding site override");
        self.overrides.push(site);
        self.overrides.sort_by(|a, b| {
            b.rule
                .specificity()
                .cmp(&a.rule.specificity())
                .then_with(|| a.rule.to_string().cmp(&b.rule.to_string()))
        });
    }

    /// Looks up an extractor by name, enabled or not.
    #[must_use]
    pub fn extractor(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.patterns
            .iter()
            .find(|p| p.name == name)
            .map(|p| Arc::clone(&p.handler))
    }

    /// Registered names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name.as_str()).collect()
    }

    /// Registered patterns in priority order.
    #[must_use]
    pub fn patterns(&self) -> &[ExtractionPattern] {
        &self.patterns
    }

    /// Site overrides in evaluation order.
    #[must_use]
    pub fn overrides(&self) -> &[SiteOverride] {
        &self.overrides
    }

    /// Global defaults.
    #[must_use]
    pub fn defaults(&self) -> &RoutingDefaults {
        &self.defaults
    }

    /// Checks every name reference up front, so misconfiguration is reported
    /// at startup instead of on the first matching URL.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.require_default()?;
        self.fallback_chain(
            &self.defaults.default_method,
            &self.defaults.default_fallback,
            "default_fallback",
        )?;
        for site in self.overrides.iter().filter(|site| site.enabled) {
            let referenced_by = format!("override '{}'", site.rule);
            self.require(&site.method, &referenced_by)?;
            if let Some(fallback) = &site.fallback {
                self.fallback_chain(&site.method, fallback, &referenced_by)?;
            }
        }
        Ok(())
    }

    /// Resolves `url` to a primary extractor, fallback chain and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoDefaultExtractor`] if the default
    /// extractor is not registered, or [`ConfigurationError::UnknownExtractor`]
    /// if the winning rule or its fallback chain names an unregistered extractor.
    #[tracing::instrument(skip(self), fields(url = %url))]
    pub fn resolve(&self, url: &str) -> Result<Resolution, ConfigurationError> {
        let default_handler = self.require_default()?;
        let target = MatchTarget::new(url);

        if let Some(site) = self
            .overrides
            .iter()
            .find(|site| site.enabled && site.rule.matches(&target))
        {
            let referenced_by = format!("override '{}'", site.rule);
            let handler = self.require(&site.method, &referenced_by)?;
            let fallback = site
                .fallback
                .as_deref()
                .unwrap_or(&self.defaults.default_fallback);
            let fallback_chain = self.fallback_chain(&site.method, fallback, &referenced_by)?;
            debug!(pattern = %site.rule, method = %site.method, "Resolved by site override");
            return Ok(Resolution {
                extractor_name: site.method.clone(),
                handler,
                fallback_chain,
                timeout: site.timeout.unwrap_or(self.defaults.default_timeout),
                source: ResolutionSource::Override(site.rule.to_string()),
                options: site.options.clone(),
            });
        }

        if let Some(pattern) = self.patterns.iter().find(|p| p.claims(&target)) {
            let fallback_chain = self.fallback_chain(
                &pattern.name,
                &self.defaults.default_fallback,
                "default_fallback",
            )?;
            debug!(pattern = %pattern.name, "Resolved by registered pattern");
            return Ok(Resolution {
                extractor_name: pattern.name.clone(),
                handler: Arc::clone(&pattern.handler),
                fallback_chain,
                timeout: self.defaults.default_timeout,
                source: ResolutionSource::Pattern(pattern.name.clone()),
                options: BTreeMap::new(),
            });
        }

        let fallback_chain = self.fallback_chain(
            &self.defaults.default_method,
            &self.defaults.default_fallback,
            "default_fallback",
        )?;
        debug!(method = %self.defaults.default_method, "Resolved to default extractor");
        Ok(Resolution {
            extractor_name: self.defaults.default_method.clone(),
            handler: default_handler,
            fallback_chain,
            timeout: self.defaults.default_timeout,
            source: ResolutionSource::Default,
            options: BTreeMap::new(),
        })
    }

    fn require_default(&self) -> Result<Arc<dyn Extractor>, ConfigurationError> {
        self.extractor(&self.defaults.default_method)
            .ok_or_else(|| ConfigurationError::no_default(&self.defaults.default_method))
    }

    fn require(
        &self,
        name: &str,
        referenced_by: &str,
    ) -> Result<Arc<dyn Extractor>, ConfigurationError> {
        self.extractor(name)
            .ok_or_else(|| ConfigurationError::unknown_extractor(name, referenced_by))
    }

    /// Checks and normalizes a fallback list: unknown names are errors,
    /// duplicates and the primary itself are dropped.
    fn fallback_chain(
        &self,
        primary: &str,
        fallback: &[String],
        referenced_by: &str,
    ) -> Result<Vec<String>, ConfigurationError> {
        let mut chain: Vec<String> = Vec::with_capacity(fallback.len());
        for name in fallback {
            self.require(name, referenced_by)?;
            if name != primary && !chain.contains(name) {
                chain.push(name.clone());
            }
        }
        Ok(chain)
    }
}

impl fmt::Debug for PatternCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternCatalog")
            .field("patterns", &self.names())
            .field("override_count", &self.overrides.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Builds a catalog holding the built-in `http` and `http-mobile` extractors
/// plus the given overrides.
///
/// An extractor whose HTTP client cannot be built is skipped with a warning;
/// [`PatternCatalog::validate`] then reports any reference to it.
#[must_use]
pub fn build_default_catalog(
    defaults: RoutingDefaults,
    overrides: Vec<SiteOverride>,
) -> PatternCatalog {
    let mut catalog = PatternCatalog::new(defaults);

    for profile in [BrowserProfile::Desktop, BrowserProfile::Mobile] {
        let name = profile.extractor_name();
        match HttpExtractor::new(profile) {
            Ok(extractor) => {
                let pattern = ExtractionPattern::new(name, Arc::new(extractor));
                if let Err(error) = catalog.register(pattern) {
                    warn!(error = %error, "Built-in extractor not registered");
                }
            }
            Err(error) => warn!(
                extractor = name,
                error = %error,
                "HTTP extractor unavailable; continuing without it"
            ),
        }
    }

    for site in overrides {
        catalog.add_override(site);
    }
    catalog
}
