//! Digestor Core Library
//!
//! Extraction routing and resilience engine: given a URL discovered in a
//! feed, pick an extraction strategy, run it under progressive escalation,
//! fall back through alternate strategies, validate what comes back, and
//! remember URLs that nothing could extract.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Registered extraction patterns, site overrides and URL resolution
//! - [`planner`] - Immutable per-URL execution plans
//! - [`escalation`] - Escalation levels, caps and the per-extractor state machine
//! - [`executor`] - Cache check, primary run, fallback chain, outcome recording
//! - [`validator`] - Minimum-quality bar for extracted text
//! - [`failure_cache`] - URLs that exhausted every strategy
//! - [`metrics`] - Per-extractor counters
//! - [`extractor`] - Extractor capability trait and built-in HTTP extractors
//! - [`batch`] - Bounded-concurrency extraction of many URLs
//! - [`config`] - TOML override table and engine settings
//! - [`operator`] - Test extraction, metrics report and resets

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod catalog;
pub mod config;
pub mod escalation;
pub mod executor;
pub mod extractor;
pub mod failure_cache;
pub mod metrics;
pub mod operator;
pub mod planner;
pub mod validator;

// Re-export commonly used types
pub use batch::{BatchError, BatchReport, BatchRunner, BatchSummary, DEFAULT_CONCURRENCY};
pub use catalog::{
    ConfigurationError, ExtractionPattern, MatchRule, PatternCatalog, Resolution,
    ResolutionSource, RoutingDefaults, SiteOverride, build_default_catalog,
};
pub use config::{
    ConfigError, ExtractionConfig, LoadedConfig, load_config, resolve_default_config_path,
};
pub use escalation::{
    AttemptError, EscalationController, EscalationLevel, EscalationOutcome, EscalationPolicy,
    EscalationRun,
};
pub use executor::{
    ExtractedArticle, ExtractionAttempt, ExtractionExecutor, ExtractionFailure, ExtractionOutcome,
    FailureReason,
};
pub use extractor::{
    BrowserProfile, EscalationHooks, ExtractContext, ExtractRequest, ExtractedContent, Extractor,
    ExtractorError, HttpExtractor,
};
pub use failure_cache::FailureCache;
pub use metrics::{ExtractorStats, MetricsRecorder, MetricsReport};
pub use operator::TestExtractionReport;
pub use planner::{ExtractionPlan, RoutePlanner};
pub use validator::ContentValidator;
