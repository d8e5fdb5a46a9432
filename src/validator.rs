//! Minimum-quality bar for extracted text.

/// Default minimum trimmed length, in characters.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 100;

/// Decides whether extracted text is usable.
///
/// Length is counted in characters after trimming surrounding whitespace.
/// Missing or empty text is simply invalid; validation never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentValidator {
    min_length: usize,
}

impl ContentValidator {
    /// Creates a validator with the given minimum trimmed length.
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Returns the configured minimum length.
    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Trimmed character count of `text` (0 for `None`).
    #[must_use]
    pub fn measure(text: Option<&str>) -> usize {
        text.map_or(0, |text| text.trim().chars().count())
    }

    /// Returns true iff `text` is present and long enough once trimmed.
    #[must_use]
    pub fn is_valid(&self, text: Option<&str>) -> bool {
        text.is_some() && Self::measure(text) >= self.min_length
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONTENT_LENGTH)
    }
}
