use thiserror::Error;

/// ASCII punctuation that survives sanitizing.
const KEPT_PUNCTUATION: &str = "!@#$%^&*()_+\\-=[]{};':\"|,.<>/?";

/// Reasons a search query is rejected before any remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Search query must not be empty")]
    Empty,

    #[error("Search query must be at least {min} characters long")]
    TooShort { min: usize },
}

/// A single rule applied to query text.
pub trait Validator: Send + Sync {
    fn validate(&self, text: &str) -> Result<(), ValidationError>;
}

/// Rejects blank text.
#[derive(Debug, Clone, Copy)]
pub struct NotBlank;

impl Validator for NotBlank {
    fn validate(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            Err(ValidationError::Empty)
        } else {
            Ok(())
        }
    }
}

/// Rejects text with fewer than the given number of characters, ignoring
/// surrounding whitespace.
#[derive(Debug, Clone, Copy)]
pub struct MinLength(pub usize);

impl Validator for MinLength {
    fn validate(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().chars().count() < self.0 {
            Err(ValidationError::TooShort { min: self.0 })
        } else {
            Ok(())
        }
    }
}

/// An ordered group of rules; the first failing rule decides the error.
#[derive(Default)]
pub struct QueryValidator {
    rules: Vec<Box<dyn Validator>>,
}

impl QueryValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules used by the search field: not blank, then a minimum length.
    pub fn for_search(min_length: usize) -> Self {
        Self::new().rule(NotBlank).rule(MinLength(min_length))
    }

    #[must_use]
    pub fn rule(mut self, rule: impl Validator + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

impl Validator for QueryValidator {
    fn validate(&self, text: &str) -> Result<(), ValidationError> {
        self.rules.iter().try_for_each(|rule| rule.validate(text))
    }
}

/// Cleans a query before it is embedded in the prompt.
///
/// Emoji and other symbols are dropped; letters, digits, whitespace and
/// common ASCII punctuation are kept. Whitespace runs collapse to a single
/// space and the result is trimmed.
pub fn sanitize_query(query: &str) -> String {
    let kept: String = query
        .chars()
        .filter(|c| c.is_whitespace() || c.is_alphanumeric() || KEPT_PUNCTUATION.contains(*c))
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
