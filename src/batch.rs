//! Concurrent extraction of many URLs.
//!
//! Distinct URLs are independent, so each gets its own Tokio task. A
//! semaphore bounds how many run at once; within one URL everything stays
//! sequential (escalation levels, then fallbacks).

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::ConfigurationError;
use crate::executor::{ExtractionExecutor, ExtractionFailure, ExtractionOutcome, FailureReason};
use crate::extractor::ExtractContext;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Errors that abort a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The catalog could not plan a URL; remaining work was cancelled.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    /// URLs with valid text.
    pub extracted: usize,
    /// URLs that exhausted every strategy on this run.
    pub failed: usize,
    /// URLs answered from the failure cache.
    pub cached: usize,
    /// URLs abandoned because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchSummary {
    fn tally(outcomes: &[ExtractionOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                ExtractionOutcome::Extracted(_) => summary.extracted += 1,
                ExtractionOutcome::Failed(failure) => match failure.reason {
                    FailureReason::AllStrategiesExhausted => summary.failed += 1,
                    FailureReason::CachedFailure => summary.cached += 1,
                    FailureReason::Cancelled => summary.cancelled += 1,
                },
            }
        }
        summary
    }

    /// Total URLs accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.extracted + self.failed + self.cached + self.cancelled
    }
}

/// Outcomes of one batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per URL.
    pub outcomes: Vec<ExtractionOutcome>,
    /// Counts by outcome.
    pub summary: BatchSummary,
}

/// Runs an [`ExtractionExecutor`] over many URLs with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    executor: Arc<ExtractionExecutor>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl BatchRunner {
    /// Creates a runner allowing `concurrency` URLs in flight.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidConcurrency`] outside `1..=100`.
    pub fn new(executor: Arc<ExtractionExecutor>, concurrency: usize) -> Result<Self, BatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(BatchError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            executor,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Extracts every URL, calling `on_complete` as each one finishes.
    ///
    /// Cancelling `cancel` stops queued URLs from starting and aborts
    /// in-flight ones; they come back as cancelled failures. A task that
    /// panics is logged and left out of the report.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Configuration`] if any URL cannot be planned;
    /// the rest of the batch is cancelled first.
    #[instrument(skip_all, fields(urls = urls.len(), concurrency = self.concurrency))]
    pub async fn run<F>(
        &self,
        urls: Vec<String>,
        context: &ExtractContext,
        cancel: &CancellationToken,
        mut on_complete: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: FnMut(&ExtractionOutcome),
    {
        let batch_cancel = cancel.child_token();
        let mut slots: Vec<Option<ExtractionOutcome>> = (0..urls.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        info!("starting batch extraction");
        for (index, url) in urls.into_iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = batch_cancel.clone();
            let context = context.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) => {
                        executor
                            .extract_with_cancellation(&url, &context, &cancel)
                            .await
                    }
                    None => Ok(ExtractionOutcome::Failed(ExtractionFailure {
                        url,
                        reason: FailureReason::Cancelled,
                        attempts: Vec::new(),
                    })),
                };
                (index, result)
            });
        }

        let mut configuration_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(outcome))) => {
                    debug!(url = %outcome.url(), success = outcome.is_success(), "URL finished");
                    on_complete(&outcome);
                    slots[index] = Some(outcome);
                }
                Ok((_, Err(error))) => {
                    if configuration_error.is_none() {
                        warn!(error = %error, "configuration error; cancelling batch");
                        batch_cancel.cancel();
                        configuration_error = Some(error);
                    }
                }
                Err(error) => warn!(error = %error, "extraction task panicked"),
            }
        }

        if let Some(error) = configuration_error {
            return Err(error.into());
        }

        let outcomes: Vec<ExtractionOutcome> = slots.into_iter().flatten().collect();
        let summary = BatchSummary::tally(&outcomes);
        info!(
            extracted = summary.extracted,
            failed = summary.failed,
            cached = summary.cached,
            cancelled = summary.cancelled,
            "batch extraction complete"
        );
        Ok(BatchReport { outcomes, summary })
    }
}
