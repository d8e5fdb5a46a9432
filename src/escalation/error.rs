//! Per-attempt failure reasons.

use std::time::Duration;

use thiserror::Error;

use crate::extractor::ExtractorError;

/// Why one escalation level of one extractor did not produce valid content.
///
/// None of these are fatal: each one advances to the next escalation level
/// or, once the budget is spent, to the next fallback extractor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The invocation exceeded the plan's effective timeout.
    #[error("{extractor} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Extractor name
        extractor: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// The extractor reported an error.
    #[error("{extractor} failed: {source}")]
    Failure {
        /// Extractor name
        extractor: String,
        /// What the extractor reported
        #[source]
        source: ExtractorError,
    },

    /// Text came back but is below the minimum length.
    #[error("{extractor} returned {length} chars, below the {minimum} char minimum")]
    ContentTooShort {
        /// Extractor name
        extractor: String,
        /// Trimmed length of what came back
        length: usize,
        /// Configured minimum
        minimum: usize,
    },
}

impl AttemptError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(extractor: &str, timeout: Duration) -> Self {
        Self::Timeout {
            extractor: extractor.to_string(),
            timeout,
        }
    }

    /// Creates a failure error.
    #[must_use]
    pub fn failure(extractor: &str, source: ExtractorError) -> Self {
        Self::Failure {
            extractor: extractor.to_string(),
            source,
        }
    }

    /// Creates a content-too-short error.
    #[must_use]
    pub fn too_short(extractor: &str, length: usize, minimum: usize) -> Self {
        Self::ContentTooShort {
            extractor: extractor.to_string(),
            length,
            minimum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = AttemptError::timeout("http", Duration::from_secs(10));
        assert_eq!(err.to_string(), "http timed out after 10000ms");
    }

    #[test]
    fn test_too_short_message() {
        let err = AttemptError::too_short("basic", 40, 100);
        let msg = err.to_string();
        assert!(msg.contains("40 chars"));
        assert!(msg.contains("100 char minimum"));
    }

    #[test]
    fn test_failure_wraps_extractor_error() {
        let err = AttemptError::failure("http", ExtractorError::http_status("https://x.org", 503));
        assert!(err.to_string().contains("HTTP 503"));
    }
}
