//! Error types for catalog configuration.
//!
//! A [`ConfigurationError`] is fatal: it means the catalog cannot produce a
//! plan for any URL until the configuration is fixed, so it is never retried.

use thiserror::Error;

/// Errors raised while building or resolving against the pattern catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The designated default extractor is not registered.
    #[error("default extractor '{name}' is not registered\n  Suggestion: {suggestion}")]
    NoDefaultExtractor {
        /// Name configured as `default_method`
        name: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A name referenced by an override or fallback chain does not resolve.
    #[error("unknown extractor '{name}' referenced by {referenced_by}\n  Suggestion: {suggestion}")]
    UnknownExtractor {
        /// The name that could not be found
        name: String,
        /// Where the reference came from (override pattern, default fallback, ...)
        referenced_by: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Two patterns were registered under the same name.
    #[error(
        "extractor '{name}' is already registered\n  Suggestion: Give each extraction pattern a unique name"
    )]
    DuplicateExtractor {
        /// The duplicated name
        name: String,
    },

    /// A match rule could not be compiled.
    #[error("invalid site pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The raw pattern text
        pattern: String,
        /// Why compilation failed
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a `NoDefaultExtractor` error.
    #[must_use]
    pub fn no_default(name: &str) -> Self {
        Self::NoDefaultExtractor {
            name: name.to_string(),
            suggestion: "Register an extractor with this name or change `default_method`"
                .to_string(),
        }
    }

    /// Creates an `UnknownExtractor` error.
    #[must_use]
    pub fn unknown_extractor(name: &str, referenced_by: &str) -> Self {
        Self::UnknownExtractor {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
            suggestion: "Check the extractor name for typos or install the plugin providing it"
                .to_string(),
        }
    }

    /// Creates a `DuplicateExtractor` error.
    #[must_use]
    pub fn duplicate(name: &str) -> Self {
        Self::DuplicateExtractor {
            name: name.to_string(),
        }
    }

    /// Creates an `InvalidPattern` error.
    #[must_use]
    pub fn invalid_pattern(pattern: &str, reason: &str) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_default_message() {
        let err = ConfigurationError::no_default("http");
        let msg = err.to_string();
        assert!(msg.contains("'http'"), "should name the extractor");
        assert!(msg.contains("Suggestion"), "should have suggestion");
    }

    #[test]
    fn test_unknown_extractor_message() {
        let err = ConfigurationError::unknown_extractor("pdf", "override 'arxiv.org'");
        let msg = err.to_string();
        assert!(msg.contains("'pdf'"));
        assert!(msg.contains("override 'arxiv.org'"));
    }

    #[test]
    fn test_duplicate_message() {
        let err = ConfigurationError::duplicate("github");
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_invalid_pattern_message() {
        let err = ConfigurationError::invalid_pattern("news.*[", "unbalanced bracket");
        let msg = err.to_string();
        assert!(msg.contains("news.*["));
        assert!(msg.contains("unbalanced bracket"));
    }
}
