//! Override table and engine settings loaded from TOML.
//!
//! ```toml
//! [extraction]
//! default_method = "http"
//! default_fallback = ["http-mobile"]
//! default_timeout_secs = 10
//! min_content_length = 100
//!
//! [escalation]
//! max_levels = 4
//! wait_increment_ms = 2000
//! max_total_wait_ms = 15000
//!
//! [failure_cache]
//! ttl_secs = 86400            # omit to keep failures for the process lifetime
//!
//! [sites."medium.com"]
//! method = "http-mobile"
//! fallback = []
//! timeout_secs = 20
//! options = { wait_for = "article" }
//! ```
//!
//! Every section and field is optional; missing values take the defaults
//! shown above.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{
    ConfigurationError, DEFAULT_METHOD, RoutingDefaults, SiteOverride, build_default_catalog,
};
use crate::escalation::{
    DEFAULT_MAX_LEVELS, DEFAULT_MAX_TOTAL_WAIT, DEFAULT_WAIT_INCREMENT, EscalationController,
    EscalationPolicy,
};
use crate::executor::ExtractionExecutor;
use crate::extractor::BrowserProfile;
use crate::failure_cache::FailureCache;
use crate::metrics::MetricsRecorder;
use crate::planner::RoutePlanner;
use crate::validator::{ContentValidator, DEFAULT_MIN_CONTENT_LENGTH};

const CONFIG_DIR: &str = "digestor";
const CONFIG_FILE: &str = "extraction.toml";

/// Errors raised while loading or applying the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected fields.
    #[error("Failed to parse config file '{origin}': {source}")]
    Parse {
        /// Where the text came from
        origin: String,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("Invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Dotted field path
        field: String,
        /// Offending value
        value: String,
        /// Allowed range
        expected: &'static str,
    },

    /// A value is malformed.
    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Dotted field path
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// The resulting catalog is inconsistent.
    #[error(transparent)]
    Catalog(#[from] ConfigurationError),
}

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Routing defaults.
    pub extraction: ExtractionSection,
    /// Escalation caps.
    pub escalation: EscalationSection,
    /// Failure cache behavior.
    pub failure_cache: FailureCacheSection,
    /// Site overrides keyed by URL-match pattern.
    pub sites: BTreeMap<String, SiteSection>,
}

/// `[extraction]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSection {
    pub default_method: String,
    pub default_fallback: Vec<String>,
    pub default_timeout_secs: u64,
    pub min_content_length: usize,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_string(),
            default_fallback: vec![BrowserProfile::Mobile.extractor_name().to_string()],
            default_timeout_secs: 10,
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
        }
    }
}

/// `[escalation]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationSection {
    pub max_levels: u8,
    pub wait_increment_ms: u64,
    pub max_total_wait_ms: u64,
}

impl Default for EscalationSection {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            wait_increment_ms: DEFAULT_WAIT_INCREMENT.as_millis() as u64,
            max_total_wait_ms: DEFAULT_MAX_TOTAL_WAIT.as_millis() as u64,
        }
    }
}

/// `[failure_cache]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FailureCacheSection {
    /// Seconds before a cached failure is retried; absent means never.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// `[sites."<pattern>"]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

fn enabled_by_default() -> bool {
    true
}

impl ExtractionConfig {
    /// Parses TOML text; `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown fields.
    pub fn from_toml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw, &path.display().to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values against their allowed ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range or malformed value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let extraction = &self.extraction;
        require_name("extraction.default_method", &extraction.default_method)?;
        for name in &extraction.default_fallback {
            require_name("extraction.default_fallback", name)?;
        }
        validate_timeout_secs("extraction.default_timeout_secs", extraction.default_timeout_secs)?;
        if extraction.min_content_length > 1_000_000 {
            return Err(out_of_range(
                "extraction.min_content_length",
                extraction.min_content_length,
                "0..=1000000",
            ));
        }

        let escalation = &self.escalation;
        if !(1..=DEFAULT_MAX_LEVELS).contains(&escalation.max_levels) {
            return Err(out_of_range("escalation.max_levels", escalation.max_levels, "1..=4"));
        }
        if escalation.wait_increment_ms > 60_000 {
            return Err(out_of_range(
                "escalation.wait_increment_ms",
                escalation.wait_increment_ms,
                "0..=60000",
            ));
        }
        if escalation.max_total_wait_ms > 600_000 {
            return Err(out_of_range(
                "escalation.max_total_wait_ms",
                escalation.max_total_wait_ms,
                "0..=600000",
            ));
        }

        if let Some(ttl) = self.failure_cache.ttl_secs
            && !(1..=31_536_000).contains(&ttl)
        {
            return Err(out_of_range("failure_cache.ttl_secs", ttl, "1..=31536000"));
        }

        for (pattern, site) in &self.sites {
            let field = |name: &str| format!("sites.\"{pattern}\".{name}");
            require_name(&field("method"), &site.method)?;
            for name in site.fallback.iter().flatten() {
                require_name(&field("fallback"), name)?;
            }
            if let Some(timeout) = site.timeout_secs {
                validate_timeout_secs(&field("timeout_secs"), timeout)?;
            }
        }
        Ok(())
    }

    /// Routing defaults for the catalog.
    #[must_use]
    pub fn routing_defaults(&self) -> RoutingDefaults {
        RoutingDefaults {
            default_method: self.extraction.default_method.clone(),
            default_fallback: self.extraction.default_fallback.clone(),
            default_timeout: Duration::from_secs(self.extraction.default_timeout_secs),
        }
    }

    /// Escalation caps.
    #[must_use]
    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy::new(
            self.escalation.max_levels,
            Duration::from_millis(self.escalation.wait_increment_ms),
            Duration::from_millis(self.escalation.max_total_wait_ms),
        )
    }

    /// Content validator with the configured minimum.
    #[must_use]
    pub fn content_validator(&self) -> ContentValidator {
        ContentValidator::new(self.extraction.min_content_length)
    }

    /// Failure cache time-to-live.
    #[must_use]
    pub fn failure_cache_ttl(&self) -> Option<Duration> {
        self.failure_cache.ttl_secs.map(Duration::from_secs)
    }

    /// Site overrides, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Catalog`] if a site pattern cannot be parsed.
    pub fn site_overrides(&self) -> Result<Vec<SiteOverride>, ConfigError> {
        self.sites
            .iter()
            .map(|(pattern, site)| {
                let mut site_override = SiteOverride::new(pattern, site.method.clone())?
                    .with_options(site.options.clone())
                    .enabled(site.enabled);
                site_override.fallback.clone_from(&site.fallback);
                site_override.timeout = site.timeout_secs.map(Duration::from_secs);
                Ok(site_override)
            })
            .collect()
    }

    /// Builds a validated executor with the built-in extractors and this
    /// config's overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Catalog`] if an override or default names an
    /// unknown extractor, or a site pattern is malformed.
    pub fn build_executor(&self) -> Result<ExtractionExecutor, ConfigError> {
        let catalog = build_default_catalog(self.routing_defaults(), self.site_overrides()?);
        catalog.validate()?;
        debug!(catalog = ?catalog, "catalog ready");
        Ok(ExtractionExecutor::new(
            RoutePlanner::new(Arc::new(catalog)),
            EscalationController::new(self.escalation_policy(), self.content_validator()),
            Arc::new(FailureCache::with_ttl(self.failure_cache_ttl())),
            Arc::new(MetricsRecorder::new()),
        ))
    }
}

fn require_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: "extractor name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(out_of_range(field, value, "1..=3600"));
    }
    Ok(())
}

fn out_of_range(field: &str, value: impl ToString, expected: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Loaded config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path consulted, if one could be determined.
    pub path: Option<PathBuf>,
    /// Effective configuration (defaults if no file was read).
    pub config: ExtractionConfig,
    /// Whether a file was actually read.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/digestor/extraction.toml`
/// 2. `$HOME/.config/digestor/extraction.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(CONFIG_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` if given (it must exist), else the default path if a
/// file is there, else the built-in defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if a file exists but cannot be read, parsed or
/// validated, or if `explicit` does not exist.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = ExtractionConfig::load(path)?;
        info!(path = %path.display(), "loaded config file");
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default_path) if default_path.exists() => {
            let config = ExtractionConfig::load(default_path)?;
            info!(path = %default_path.display(), "loaded config file");
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => {
            debug!("no config file found; using defaults");
            Ok(LoadedConfig {
                path,
                config: ExtractionConfig::default(),
                loaded_from_file: false,
            })
        }
    }
}
