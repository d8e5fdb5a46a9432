//! URL match rules shared by registered patterns and site overrides.
//!
//! A raw pattern string is classified once, when it is parsed:
//! - `*.pdf` (leading `*.`) is an extension rule, matched against the end of the lowercased URL
//! - `news.*.com` (a `*` anywhere else, or a `?` outside a path) is a glob, matched against the whole host
//! - `cve.mitre.org/cgi-bin` (contains `/`) is a plain fragment, matched against host or URL
//! - anything else is a domain, matched as a substring of the host

use std::fmt;

use regex::Regex;
use url::Url;

use super::ConfigurationError;

/// Normalizes a host string: trim, lowercase, strip leading "www." and trailing '.'.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .to_ascii_lowercase()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_string()
}

/// A URL prepared once for matching against many rules.
#[derive(Debug, Clone)]
pub struct MatchTarget {
    lowered_url: String,
    host: String,
}

impl MatchTarget {
    /// Prepares `url` for matching. Unparseable URLs get an empty host, so
    /// only extension and plain rules can still match them.
    #[must_use]
    pub fn new(url: &str) -> Self {
        let host = Url::parse(url.trim())
            .ok()
            .and_then(|parsed| parsed.host_str().map(canonical_host))
            .unwrap_or_default();
        Self {
            lowered_url: url.trim().to_lowercase(),
            host,
        }
    }

    /// Canonical host (lowercase, no `www.`).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// One way a pattern can claim a URL.
#[derive(Debug, Clone)]
pub enum MatchRule {
    /// Substring of the canonical host.
    Domain(String),
    /// Suffix of the lowercased URL, stored with its leading dot (`.pdf`).
    Extension(String),
    /// Anchored glob over the canonical host.
    Glob {
        /// Pattern text as written
        raw: String,
        /// Compiled, anchored, case-insensitive form
        regex: Regex,
    },
    /// Substring of the host or of the full URL.
    Plain(String),
}

impl MatchRule {
    /// Classifies and compiles a raw pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] for empty patterns or
    /// globs that do not compile.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationError::invalid_pattern(raw, "pattern is empty"));
        }

        if let Some(suffix) = trimmed.strip_prefix("*.")
            && !suffix.contains('*')
        {
            return Ok(Self::extension(suffix));
        }
        if trimmed.contains('*') || (trimmed.contains('?') && !trimmed.contains('/')) {
            return Self::glob(trimmed);
        }
        if trimmed.contains('/') {
            return Ok(Self::plain(trimmed));
        }
        Ok(Self::domain(trimmed))
    }

    /// Builds a domain rule.
    #[must_use]
    pub fn domain(domain: &str) -> Self {
        Self::Domain(canonical_host(domain))
    }

    /// Builds an extension rule; `pdf`, `.pdf` and `*.pdf` are equivalent.
    #[must_use]
    pub fn extension(extension: &str) -> Self {
        let bare = extension
            .trim()
            .trim_start_matches('*')
            .trim_start_matches('.')
            .to_lowercase();
        Self::Extension(format!(".{bare}"))
    }

    /// Builds a plain substring rule.
    #[must_use]
    pub fn plain(fragment: &str) -> Self {
        Self::Plain(fragment.trim().to_lowercase())
    }

    /// Compiles a host glob (`*` = any run of characters, `?` = one character).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if the translated regex
    /// does not compile.
    pub fn glob(pattern: &str) -> Result<Self, ConfigurationError> {
        let mut translated = String::from("(?i)^");
        for ch in canonical_host(pattern).chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');

        let regex = Regex::new(&translated)
            .map_err(|e| ConfigurationError::invalid_pattern(pattern, &e.to_string()))?;
        Ok(Self::Glob {
            raw: pattern.trim().to_string(),
            regex,
        })
    }

    /// Returns true if this rule claims the target URL.
    #[must_use]
    pub fn matches(&self, target: &MatchTarget) -> bool {
        match self {
            Self::Domain(domain) => {
                !target.host.is_empty() && target.host.contains(domain.as_str())
            }
            Self::Extension(suffix) => target.lowered_url.ends_with(suffix.as_str()),
            Self::Glob { regex, .. } => !target.host.is_empty() && regex.is_match(&target.host),
            Self::Plain(fragment) => {
                target.host.contains(fragment.as_str())
                    || target.lowered_url.contains(fragment.as_str())
            }
        }
    }

    /// Length of the pattern text, used to order overrides most-specific first.
    #[must_use]
    pub fn specificity(&self) -> usize {
        match self {
            Self::Domain(text) | Self::Extension(text) | Self::Plain(text) => text.len(),
            Self::Glob { raw, .. } => raw.len(),
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "{domain}"),
            Self::Extension(suffix) => write!(f, "*{suffix}"),
            Self::Glob { raw, .. } => write!(f, "{raw}"),
            Self::Plain(fragment) => write!(f, "{fragment}"),
        }
    }
}
