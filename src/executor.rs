//! Orchestrates one URL's extraction across its plan.
//!
//! For each request the executor plans once, consults the failure cache,
//! then walks the plan's extractors in order. Every extractor runs through
//! the escalation controller from level 0; the first valid content wins.
//! Per-attempt failures never escape: the caller gets either an
//! [`ExtractionOutcome`] or, for a broken catalog, a [`ConfigurationError`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::ConfigurationError;
use crate::escalation::{EscalationController, EscalationLevel, EscalationOutcome, EscalationRun};
use crate::extractor::{
    ExtractContext, METADATA_EXTRACTION_METHOD, METADATA_STRATEGY, METADATA_TITLE,
};
use crate::failure_cache::FailureCache;
use crate::metrics::MetricsRecorder;
use crate::planner::{ExtractionPlan, RoutePlanner, serialize_millis};

/// One extractor's run against one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionAttempt {
    /// Extractor name.
    pub extractor_name: String,
    /// Highest escalation level reached.
    pub escalation_level_reached: EscalationLevel,
    /// Wall time of the run.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Whether the run produced valid content.
    pub success: bool,
    /// Why it failed, if it did.
    pub error_detail: Option<String>,
}

impl ExtractionAttempt {
    fn from_run(run: &EscalationRun) -> Self {
        let error_detail = match &run.outcome {
            EscalationOutcome::Succeeded(_) => None,
            EscalationOutcome::BudgetExhausted(error) => Some(error.to_string()),
            EscalationOutcome::Cancelled => Some("cancelled".to_string()),
        };
        Self {
            extractor_name: run.extractor.clone(),
            escalation_level_reached: run.level_reached(),
            elapsed: run.elapsed,
            success: run.succeeded(),
            error_detail,
        }
    }
}

/// Successfully extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedArticle {
    /// Source URL.
    pub url: String,
    /// Trimmed text.
    pub text: String,
    /// Metadata; always has `extraction_method` and `strategy`.
    pub metadata: HashMap<String, String>,
    /// Extractor that succeeded.
    pub extractor: String,
    /// Level it succeeded at.
    pub level: EscalationLevel,
    /// Every run made, the successful one last.
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractedArticle {
    /// Page title, if known.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata.get(METADATA_TITLE).map(String::as_str)
    }
}

/// Why an extraction produced no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Every extractor in the plan failed.
    AllStrategiesExhausted,
    /// The URL was already in the failure cache; nothing ran.
    CachedFailure,
    /// The caller cancelled the request.
    Cancelled,
}

/// Structured failure returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionFailure {
    /// Source URL.
    pub url: String,
    /// Why extraction failed.
    pub reason: FailureReason,
    /// Every run made (empty for cache hits).
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionFailure {
    /// Names of the extractors that were tried, in order.
    #[must_use]
    pub fn attempted_extractors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .map(|attempt| attempt.extractor_name.as_str())
            .collect()
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            FailureReason::CachedFailure => {
                return write!(f, "{} previously exhausted every strategy (cached)", self.url);
            }
            FailureReason::Cancelled => write!(f, "extraction of {} cancelled", self.url)?,
            FailureReason::AllStrategiesExhausted => {
                write!(f, "all strategies exhausted for {}", self.url)?;
            }
        }
        for attempt in &self.attempts {
            write!(
                f,
                "\n  {} ({}): {}",
                attempt.extractor_name,
                attempt.escalation_level_reached,
                attempt.error_detail.as_deref().unwrap_or("ok")
            )?;
        }
        Ok(())
    }
}

/// Final result of one extraction request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// Valid text was produced.
    Extracted(ExtractedArticle),
    /// No valid text was produced.
    Failed(ExtractionFailure),
}

impl ExtractionOutcome {
    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Extracted(article) => &article.url,
            Self::Failed(failure) => &failure.url,
        }
    }

    /// Returns true on success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }

    /// Returns true if the failure came straight from the failure cache.
    #[must_use]
    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self,
            Self::Failed(ExtractionFailure {
                reason: FailureReason::CachedFailure,
                ..
            })
        )
    }

    /// Every extractor run made for this request.
    #[must_use]
    pub fn attempts(&self) -> &[ExtractionAttempt] {
        match self {
            Self::Extracted(article) => &article.attempts,
            Self::Failed(failure) => &failure.attempts,
        }
    }
}

/// Runs extraction plans with escalation, fallback and failure memory.
///
/// Cheap to share behind an `Arc`; all mutable state (failure cache and
/// metrics) is internally synchronized.
#[derive(Debug, Clone)]
pub struct ExtractionExecutor {
    planner: RoutePlanner,
    controller: EscalationController,
    failures: Arc<FailureCache>,
    metrics: Arc<MetricsRecorder>,
}

impl ExtractionExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        planner: RoutePlanner,
        controller: EscalationController,
        failures: Arc<FailureCache>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            planner,
            controller,
            failures,
            metrics,
        }
    }

    /// The route planner.
    #[must_use]
    pub fn planner(&self) -> &RoutePlanner {
        &self.planner
    }

    /// The escalation controller.
    #[must_use]
    pub fn controller(&self) -> &EscalationController {
        &self.controller
    }

    /// The shared failure cache.
    #[must_use]
    pub fn failure_cache(&self) -> &Arc<FailureCache> {
        &self.failures
    }

    /// The shared metrics recorder.
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Extracts text from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the catalog cannot produce a plan.
    /// Extraction failures are returned as [`ExtractionOutcome::Failed`].
    pub async fn extract(
        &self,
        url: &str,
        context: &ExtractContext,
    ) -> Result<ExtractionOutcome, ConfigurationError> {
        self.extract_with_cancellation(url, context, &CancellationToken::new())
            .await
    }

    /// Like [`extract`](Self::extract), but aborts promptly once `cancel` fires.
    ///
    /// A cancelled request is neither cached nor counted in metrics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the catalog cannot produce a plan.
    #[instrument(skip(self, context, cancel), fields(url = %url))]
    pub async fn extract_with_cancellation(
        &self,
        url: &str,
        context: &ExtractContext,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome, ConfigurationError> {
        let plan = self.planner.plan(url)?;

        if self.failures.contains(url) {
            self.metrics.record_cache_hit();
            info!("URL is in the failure cache; skipping extraction");
            return Ok(ExtractionOutcome::Failed(ExtractionFailure {
                url: url.to_string(),
                reason: FailureReason::CachedFailure,
                attempts: Vec::new(),
            }));
        }

        self.run_plan(&plan, context, cancel, true).await
    }

    /// Walks `plan`'s extractors in order. With `record` unset, neither the
    /// failure cache nor the metrics are touched.
    pub(crate) async fn run_plan(
        &self,
        plan: &ExtractionPlan,
        context: &ExtractContext,
        cancel: &CancellationToken,
        record: bool,
    ) -> Result<ExtractionOutcome, ConfigurationError> {
        let mut context = context.clone();
        for (key, value) in &plan.options {
            context
                .options
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let mut attempts = Vec::new();
        for name in plan.extractors() {
            if cancel.is_cancelled() {
                return Ok(cancelled(plan, attempts));
            }

            let handler = self
                .planner
                .catalog()
                .extractor(name)
                .ok_or_else(|| ConfigurationError::unknown_extractor(name, "extraction plan"))?;

            debug!(extractor = name, "Trying extractor");
            let run = self
                .controller
                .run(
                    name,
                    handler.as_ref(),
                    &plan.url,
                    &context,
                    plan.effective_timeout,
                    cancel,
                )
                .await;
            let attempt = ExtractionAttempt::from_run(&run);
            let level = attempt.escalation_level_reached;
            attempts.push(attempt);

            match run.outcome {
                EscalationOutcome::Succeeded(content) => {
                    if record {
                        self.metrics.record_attempt(name, true, run.elapsed);
                    }
                    info!(extractor = name, %level, "Extraction successful");
                    let mut metadata = content.metadata;
                    metadata.insert(METADATA_EXTRACTION_METHOD.to_string(), name.to_string());
                    metadata.insert(METADATA_STRATEGY.to_string(), level.label().to_string());
                    if let Some(title) = &context.title {
                        metadata
                            .entry(METADATA_TITLE.to_string())
                            .or_insert_with(|| title.clone());
                    }
                    return Ok(ExtractionOutcome::Extracted(ExtractedArticle {
                        url: plan.url.clone(),
                        text: content.text,
                        metadata,
                        extractor: name.to_string(),
                        level,
                        attempts,
                    }));
                }
                EscalationOutcome::BudgetExhausted(error) => {
                    if record {
                        self.metrics.record_attempt(name, false, run.elapsed);
                    }
                    debug!(extractor = name, error = %error, "Extractor exhausted, trying next");
                }
                EscalationOutcome::Cancelled => return Ok(cancelled(plan, attempts)),
            }
        }

        if record {
            self.failures.insert(&plan.url);
        }
        let failure = ExtractionFailure {
            url: plan.url.clone(),
            reason: FailureReason::AllStrategiesExhausted,
            attempts,
        };
        warn!(
            attempted = ?failure.attempted_extractors(),
            "All extraction strategies exhausted"
        );
        Ok(ExtractionOutcome::Failed(failure))
    }
}

fn cancelled(plan: &ExtractionPlan, attempts: Vec<ExtractionAttempt>) -> ExtractionOutcome {
    debug!(url = %plan.url, "Extraction cancelled");
    ExtractionOutcome::Failed(ExtractionFailure {
        url: plan.url.clone(),
        reason: FailureReason::Cancelled,
        attempts,
    })
}
