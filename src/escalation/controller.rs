//! Runs one extractor against one URL through the escalation ladder.
//!
//! States are the four levels plus two terminals:
//!
//! ```text
//! Level_i --valid content------------------> Succeeded
//! Level_i --invalid, budget remains--------> Level_{i+1}
//! Level_i --invalid, level/wait cap hit----> BudgetExhausted
//! any     --cancelled----------------------> Cancelled
//! ```
//!
//! Escalation state lives only for the duration of one [`EscalationController::run`]
//! call; every extractor in a fallback chain starts again at level 0.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{AttemptError, EscalationLevel, EscalationPolicy};
use crate::extractor::{
    EscalationHooks, ExtractContext, ExtractRequest, ExtractedContent, Extractor,
};
use crate::validator::ContentValidator;

/// Record of one level's attempt.
#[derive(Debug, Clone)]
pub struct LevelAttempt {
    /// Level attempted.
    pub level: EscalationLevel,
    /// Wall time spent at this level, including its extra wait.
    pub elapsed: Duration,
    /// Why the level failed; `None` on success or cancellation.
    pub error: Option<AttemptError>,
}

/// Terminal state of an escalation run.
#[derive(Debug, Clone)]
pub enum EscalationOutcome {
    /// A level produced valid content (text is trimmed).
    Succeeded(ExtractedContent),
    /// Levels or wait budget ran out; carries the last level's failure.
    BudgetExhausted(AttemptError),
    /// The caller cancelled while the run was in flight.
    Cancelled,
}

/// Result of running one extractor through the ladder.
#[derive(Debug, Clone)]
pub struct EscalationRun {
    /// Extractor name.
    pub extractor: String,
    /// Terminal state.
    pub outcome: EscalationOutcome,
    /// One entry per level attempted, in order.
    pub levels: Vec<LevelAttempt>,
    /// Cumulative extra wait spent.
    pub total_wait: Duration,
    /// Total wall time of the run.
    pub elapsed: Duration,
}

impl EscalationRun {
    /// Highest level reached (basic if nothing ran).
    #[must_use]
    pub fn level_reached(&self) -> EscalationLevel {
        self.levels
            .last()
            .map_or(EscalationLevel::Basic, |attempt| attempt.level)
    }

    /// Returns true if the run ended with valid content.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, EscalationOutcome::Succeeded(_))
    }
}

/// Drives extractors through the escalation ladder under an [`EscalationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationController {
    policy: EscalationPolicy,
    validator: ContentValidator,
}

impl EscalationController {
    /// Creates a controller.
    #[must_use]
    pub fn new(policy: EscalationPolicy, validator: ContentValidator) -> Self {
        Self { policy, validator }
    }

    /// Returns the escalation policy.
    #[must_use]
    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Returns the content validator.
    #[must_use]
    pub fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    /// Runs `extractor` (registered as `name`) against `url`.
    ///
    /// Level 0 always runs first. Each invocation is bounded by `timeout`;
    /// a timeout counts as that level's failure. Extractors without
    /// escalation hooks get exactly one basic-level attempt.
    #[instrument(skip(self, extractor, context, cancel), fields(extractor = name))]
    pub async fn run(
        &self,
        name: &str,
        extractor: &dyn Extractor,
        url: &str,
        context: &ExtractContext,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> EscalationRun {
        let started = Instant::now();
        let hooks = extractor.escalation();
        let mut level = EscalationLevel::Basic;
        let mut waited = Duration::ZERO;
        let mut levels = Vec::new();

        loop {
            let request = ExtractRequest {
                url: url.to_string(),
                context: context.clone(),
                level,
                extra_wait: self.policy.extra_wait(level),
            };
            let level_started = Instant::now();

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.attempt_level(name, extractor, hooks, &request, timeout) => {
                    Some(result)
                }
            };

            let Some(result) = result else {
                debug!(%level, "extraction cancelled");
                levels.push(LevelAttempt {
                    level,
                    elapsed: level_started.elapsed(),
                    error: None,
                });
                return EscalationRun {
                    extractor: name.to_string(),
                    outcome: EscalationOutcome::Cancelled,
                    levels,
                    total_wait: waited,
                    elapsed: started.elapsed(),
                };
            };
            waited += request.extra_wait;

            match result {
                Ok(content) => {
                    info!(%level, chars = content.text.chars().count(), "extraction succeeded");
                    levels.push(LevelAttempt {
                        level,
                        elapsed: level_started.elapsed(),
                        error: None,
                    });
                    return EscalationRun {
                        extractor: name.to_string(),
                        outcome: EscalationOutcome::Succeeded(content),
                        levels,
                        total_wait: waited,
                        elapsed: started.elapsed(),
                    };
                }
                Err(error) => {
                    debug!(%level, error = %error, "level produced no valid content");
                    levels.push(LevelAttempt {
                        level,
                        elapsed: level_started.elapsed(),
                        error: Some(error.clone()),
                    });
                    match self.policy.next_level(level, waited, hooks.is_some()) {
                        Some(next) => level = next,
                        None => {
                            return EscalationRun {
                                extractor: name.to_string(),
                                outcome: EscalationOutcome::BudgetExhausted(error),
                                levels,
                                total_wait: waited,
                                elapsed: started.elapsed(),
                            };
                        }
                    }
                }
            }
        }
    }

    /// One level: consent hook, extra wait, scroll hook, extraction, validation.
    async fn attempt_level(
        &self,
        name: &str,
        extractor: &dyn Extractor,
        hooks: Option<&dyn EscalationHooks>,
        request: &ExtractRequest,
        timeout: Duration,
    ) -> Result<ExtractedContent, AttemptError> {
        let hooks_started = Instant::now();
        if let Some(hooks) = hooks
            && request.level.dismisses_consent()
        {
            match tokio::time::timeout(timeout, hooks.dismiss_consent(request)).await {
                Ok(Ok(dismissed)) => debug!(dismissed, "consent hook ran"),
                Ok(Err(error)) => debug!(error = %error, "consent hook failed; continuing"),
                Err(_) => debug!("consent hook timed out; continuing"),
            }
        }

        // The extra wait is not charged against the level's timeout.
        let remaining = timeout.saturating_sub(hooks_started.elapsed());
        if remaining.is_zero() {
            return Err(AttemptError::timeout(name, timeout));
        }

        if !request.extra_wait.is_zero() {
            tokio::time::sleep(request.extra_wait).await;
        }

        let interaction = async {
            if let Some(hooks) = hooks
                && request.level.triggers_scroll()
                && let Err(error) = hooks.trigger_scroll(request).await
            {
                debug!(error = %error, "scroll hook failed; continuing");
            }
            extractor.extract(request).await
        };

        let content = match tokio::time::timeout(remaining, interaction).await {
            Err(_) => return Err(AttemptError::timeout(name, timeout)),
            Ok(Err(error)) => return Err(AttemptError::failure(name, error)),
            Ok(Ok(content)) => content,
        };

        if !self.validator.is_valid(Some(&content.text)) {
            return Err(AttemptError::too_short(
                name,
                ContentValidator::measure(Some(&content.text)),
                self.validator.min_length(),
            ));
        }

        let trimmed = content.text.trim();
        if trimmed.len() == content.text.len() {
            return Ok(content);
        }
        Ok(ExtractedContent {
            text: trimmed.to_string(),
            metadata: content.metadata,
        })
    }
}
