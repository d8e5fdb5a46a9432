//! Progressive escalation for extractors that can be coaxed into yielding content.
//!
//! Slow or bot-hostile pages often render nothing useful on the first try but
//! give up their content after a consent banner is dismissed, the page is
//! scrolled, or it is simply given more time. Instead of per-site retry code,
//! every extractor that exposes [`EscalationHooks`](crate::extractor::EscalationHooks)
//! runs through the same fixed ladder:
//!
//! | Level | Hooks | Extra wait |
//! |-------|-------|------------|
//! | 0 basic | none | none |
//! | 1 consent | consent dismissal | 1 x increment |
//! | 2 scroll | scroll trigger | 2 x increment |
//! | 3 full | consent + scroll | 3 x increment |
//!
//! The [`EscalationPolicy`] caps how many levels may run and how much
//! cumulative extra wait they may spend. The [`EscalationController`] stops at
//! the first level producing valid content; running out of budget is that
//! extractor's failure.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use digestor_core::escalation::{EscalationLevel, EscalationPolicy};
//!
//! let policy = EscalationPolicy::default();
//! assert_eq!(policy.extra_wait(EscalationLevel::Scroll), Duration::from_secs(4));
//! assert_eq!(
//!     policy.next_level(EscalationLevel::Basic, Duration::ZERO, true),
//!     Some(EscalationLevel::Consent)
//! );
//! ```

mod controller;
mod error;

pub use controller::{EscalationController, EscalationOutcome, EscalationRun, LevelAttempt};
pub use error::AttemptError;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Default number of levels an escalating extractor may use (all four).
pub const DEFAULT_MAX_LEVELS: u8 = 4;

/// Default extra wait added per level (2 seconds).
pub const DEFAULT_WAIT_INCREMENT: Duration = Duration::from_secs(2);

/// Default cap on cumulative extra wait across levels (15 seconds).
pub const DEFAULT_MAX_TOTAL_WAIT: Duration = Duration::from_secs(15);

/// One rung of the escalation ladder.
///
/// Derives `Ord` so that `Basic < Consent < Scroll < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// No hooks, no extra wait. Always tried first.
    Basic = 0,
    /// Consent dismissal plus a small extra wait.
    Consent = 1,
    /// Scroll trigger plus a medium extra wait.
    Scroll = 2,
    /// Both hooks plus the largest extra wait.
    Full = 3,
}

impl EscalationLevel {
    /// All levels in escalation order.
    pub const ALL: [Self; 4] = [Self::Basic, Self::Consent, Self::Scroll, Self::Full];

    /// Zero-based position in the ladder.
    #[must_use]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Level at a zero-based position, if any.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// The next, more expensive level.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Strategy label reported in extraction metadata.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Consent => "basic+cookie",
            Self::Scroll => "basic+scroll",
            Self::Full => "full_enhanced",
        }
    }

    /// Whether the consent-dismissal hook runs at this level.
    #[must_use]
    pub fn dismisses_consent(self) -> bool {
        matches!(self, Self::Consent | Self::Full)
    }

    /// Whether the scroll-trigger hook runs at this level.
    #[must_use]
    pub fn triggers_scroll(self) -> bool {
        matches!(self, Self::Scroll | Self::Full)
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} ({})", self.index(), self.label())
    }
}

/// Bounds on how far an extractor may escalate.
///
/// # Default Values
///
/// - `max_levels`: 4 (basic through full)
/// - `wait_increment`: 2 seconds (levels wait 0s, 2s, 4s, 6s)
/// - `max_total_wait`: 15 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    max_levels: u8,
    wait_increment: Duration,
    max_total_wait: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            wait_increment: DEFAULT_WAIT_INCREMENT,
            max_total_wait: DEFAULT_MAX_TOTAL_WAIT,
        }
    }
}

impl EscalationPolicy {
    /// Creates a policy; `max_levels` is clamped to `1..=4`.
    #[must_use]
    pub fn new(max_levels: u8, wait_increment: Duration, max_total_wait: Duration) -> Self {
        Self {
            max_levels: max_levels.clamp(1, DEFAULT_MAX_LEVELS),
            wait_increment,
            max_total_wait,
        }
    }

    /// A policy that only ever tries the basic level.
    #[must_use]
    pub fn basic_only() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Maximum number of levels attempted.
    #[must_use]
    pub fn max_levels(&self) -> u8 {
        self.max_levels
    }

    /// Extra wait added per level.
    #[must_use]
    pub fn wait_increment(&self) -> Duration {
        self.wait_increment
    }

    /// Cap on cumulative extra wait.
    #[must_use]
    pub fn max_total_wait(&self) -> Duration {
        self.max_total_wait
    }

    /// Extra wait spent before extracting at `level`.
    #[must_use]
    pub fn extra_wait(&self, level: EscalationLevel) -> Duration {
        self.wait_increment * u32::from(level.index())
    }

    /// Decides the level to try after `current` produced no valid content.
    ///
    /// Returns `None` when escalation must stop: the extractor has no hooks,
    /// the ladder or the level cap is exhausted, or the next level's wait would
    /// push the cumulative wait (`waited` so far) past the cap.
    #[must_use]
    pub fn next_level(
        &self,
        current: EscalationLevel,
        waited: Duration,
        supports_escalation: bool,
    ) -> Option<EscalationLevel> {
        if !supports_escalation {
            return None;
        }
        let next = current.next()?;
        if next.index() >= self.max_levels {
            debug!(max_levels = self.max_levels, "level cap reached");
            return None;
        }
        let total = waited + self.extra_wait(next);
        if total > self.max_total_wait {
            debug!(
                waited_ms = waited.as_millis(),
                next_wait_ms = self.extra_wait(next).as_millis(),
                max_total_wait_ms = self.max_total_wait.as_millis(),
                "wait budget exhausted"
            );
            return None;
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_and_indices() {
        assert!(EscalationLevel::Basic < EscalationLevel::Consent);
        assert!(EscalationLevel::Scroll < EscalationLevel::Full);
        for (i, level) in EscalationLevel::ALL.iter().enumerate() {
            assert_eq!(usize::from(level.index()), i);
            assert_eq!(EscalationLevel::from_index(level.index()), Some(*level));
        }
        assert_eq!(EscalationLevel::from_index(4), None);
        assert_eq!(EscalationLevel::Full.next(), None);
    }

    #[test]
    fn test_level_hooks() {
        assert!(!EscalationLevel::Basic.dismisses_consent());
        assert!(!EscalationLevel::Basic.triggers_scroll());
        assert!(EscalationLevel::Consent.dismisses_consent());
        assert!(!EscalationLevel::Consent.triggers_scroll());
        assert!(!EscalationLevel::Scroll.dismisses_consent());
        assert!(EscalationLevel::Scroll.triggers_scroll());
        assert!(EscalationLevel::Full.dismisses_consent());
        assert!(EscalationLevel::Full.triggers_scroll());
    }

    #[test]
    fn test_level_display_includes_label() {
        assert_eq!(EscalationLevel::Full.to_string(), "level 3 (full_enhanced)");
    }

    #[test]
    fn test_default_waits_fit_budget() {
        let policy = EscalationPolicy::default();
        let total: Duration = EscalationLevel::ALL
            .iter()
            .map(|level| policy.extra_wait(*level))
            .sum();
        assert_eq!(total, Duration::from_secs(12));
        assert!(total <= policy.max_total_wait());
    }

    #[test]
    fn test_next_level_walks_full_ladder() {
        let policy = EscalationPolicy::default();
        let mut level = EscalationLevel::Basic;
        let mut waited = Duration::ZERO;
        let mut visited = vec![level];
        while let Some(next) = policy.next_level(level, waited, true) {
            waited += policy.extra_wait(next);
            visited.push(next);
            level = next;
        }
        assert_eq!(visited, EscalationLevel::ALL.to_vec());
    }

    #[test]
    fn test_next_level_none_without_hooks() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.next_level(EscalationLevel::Basic, Duration::ZERO, false), None);
    }

    #[test]
    fn test_next_level_respects_level_cap() {
        let policy = EscalationPolicy::new(2, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(
            policy.next_level(EscalationLevel::Basic, Duration::ZERO, true),
            Some(EscalationLevel::Consent)
        );
        assert_eq!(
            policy.next_level(EscalationLevel::Consent, Duration::from_secs(1), true),
            None
        );
    }

    #[test]
    fn test_next_level_respects_wait_cap() {
        let policy = EscalationPolicy::new(4, Duration::from_secs(4), Duration::from_secs(10));
        // Consent waits 4s (total 4s), Scroll would add 8s (total 12s > 10s).
        assert_eq!(
            policy.next_level(EscalationLevel::Basic, Duration::ZERO, true),
            Some(EscalationLevel::Consent)
        );
        assert_eq!(
            policy.next_level(EscalationLevel::Consent, Duration::from_secs(4), true),
            None
        );
    }

    #[test]
    fn test_new_clamps_max_levels() {
        assert_eq!(EscalationPolicy::new(0, Duration::ZERO, Duration::ZERO).max_levels(), 1);
        assert_eq!(EscalationPolicy::new(9, Duration::ZERO, Duration::ZERO).max_levels(), 4);
        assert_eq!(EscalationPolicy::basic_only().max_levels(), 1);
    }
}
