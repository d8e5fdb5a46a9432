//! Operator-facing operations: dry-run extraction, metrics and resets.

use std::fmt;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::ConfigurationError;
use crate::executor::{ExtractionExecutor, ExtractionOutcome};
use crate::extractor::ExtractContext;
use crate::metrics::MetricsReport;
use crate::planner::ExtractionPlan;

/// Characters of extracted text shown in a test report preview.
const PREVIEW_CHARS: usize = 200;

/// Result of a test extraction: the plan and what running it produced.
#[derive(Debug, Clone, Serialize)]
pub struct TestExtractionReport {
    /// The resolved plan.
    pub plan: ExtractionPlan,
    /// Whether a normal extraction would have been answered from the failure cache.
    pub in_failure_cache: bool,
    /// Outcome of running the plan.
    pub outcome: ExtractionOutcome,
}

impl fmt::Display for TestExtractionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = &self.plan;
        writeln!(f, "URL:       {}", plan.url)?;
        writeln!(f, "Matched:   {}", plan.source)?;
        writeln!(f, "Primary:   {}", plan.primary)?;
        if plan.fallback_chain.is_empty() {
            writeln!(f, "Fallback:  (none)")?;
        } else {
            writeln!(f, "Fallback:  {}", plan.fallback_chain.join(" -> "))?;
        }
        writeln!(f, "Timeout:   {}ms", plan.effective_timeout.as_millis())?;
        if self.in_failure_cache {
            writeln!(f, "Note:      URL is in the failure cache (bypassed)")?;
        }
        for attempt in self.outcome.attempts() {
            writeln!(
                f,
                "Attempt:   {} reached {} in {}ms: {}",
                attempt.extractor_name,
                attempt.escalation_level_reached,
                attempt.elapsed.as_millis(),
                attempt.error_detail.as_deref().unwrap_or("ok")
            )?;
        }
        match &self.outcome {
            ExtractionOutcome::Extracted(article) => {
                writeln!(
                    f,
                    "Result:    extracted {} chars with {} at {}",
                    article.text.chars().count(),
                    article.extractor,
                    article.level
                )?;
                if let Some(title) = article.title() {
                    writeln!(f, "Title:     {title}")?;
                }
                let preview: String = article.text.chars().take(PREVIEW_CHARS).collect();
                write!(f, "Preview:   {preview}")
            }
            ExtractionOutcome::Failed(failure) => write!(f, "Result:    {failure}"),
        }
    }
}

impl ExtractionExecutor {
    /// Resolves and runs the plan for `url` without consulting or updating
    /// the failure cache and without recording metrics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the catalog cannot produce a plan.
    pub async fn test_extraction(
        &self,
        url: &str,
        context: &ExtractContext,
    ) -> Result<TestExtractionReport, ConfigurationError> {
        let plan = self.planner().plan(url)?;
        let in_failure_cache = self.failure_cache().contains(url);
        let outcome = self
            .run_plan(&plan, context, &CancellationToken::new(), false)
            .await?;
        Ok(TestExtractionReport {
            plan,
            in_failure_cache,
            outcome,
        })
    }

    /// Snapshot of the metrics recorder.
    #[must_use]
    pub fn metrics_report(&self) -> MetricsReport {
        self.metrics().report()
    }

    /// Empties the failure cache and returns how many URLs were removed.
    pub fn reset_failure_cache(&self) -> usize {
        let removed = self.failure_cache().clear();
        info!(removed, "Failure cache reset");
        removed
    }

    /// Zeroes the metrics recorder.
    pub fn reset_metrics(&self) {
        self.metrics().reset();
        info!("Metrics reset");
    }
}
