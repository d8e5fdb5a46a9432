//! Error type reported by extractor capabilities.

use thiserror::Error;

/// Errors an extractor can report for a single invocation.
///
/// All variants are per-attempt failures: the escalation controller and the
/// executor treat them as a reason to escalate or fall back, never as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractorError {
    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error extracting {url}: {reason}")]
    Network {
        /// The URL being extracted
        url: String,
        /// Underlying error text
        reason: String,
    },

    /// The source answered with an error status.
    #[error("HTTP {status} extracting {url}")]
    HttpStatus {
        /// The URL being extracted
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response could not be turned into text.
    #[error("could not parse content from {url}: {reason}")]
    Parse {
        /// The URL being extracted
        url: String,
        /// Why parsing failed
        reason: String,
    },

    /// Any other extractor-specific failure.
    #[error("extraction failed for {url}: {reason}")]
    Failed {
        /// The URL being extracted
        url: String,
        /// Why extraction failed
        reason: String,
    },
}

impl ExtractorError {
    /// Creates a network error.
    #[must_use]
    pub fn network(url: &str, reason: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http_status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(url: &str, reason: impl ToString) -> Self {
        Self::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a generic failure.
    #[must_use]
    pub fn failed(url: &str, reason: impl ToString) -> Self {
        Self::Failed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = ExtractorError::http_status("https://example.com/a", 403);
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("example.com/a"));
    }

    #[test]
    fn test_network_message_keeps_reason() {
        let err = ExtractorError::network("https://example.com", "connection refused");
        assert!(err.to_string().contains("connection refused"));
    }
}
