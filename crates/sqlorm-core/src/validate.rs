//! Validators run on every assignment to a mapped attribute.
//!
//! Validators see the converted native value. All of them except
//! [`Validator::NotNull`] let NULL pass; combine with `NotNull` for NOT NULL
//! columns.
//!
//! ```ignore
//! use sqlorm_core::validate::Validator;
//!
//! let v = Validator::range(0, 150);
//! v.check("person", "age", &Value::Int(42))?;
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::error::{Error, Result, ValidationError, ValidationErrorKind};
use crate::value::Value;

/// Fully qualified domain name.
pub const DOMAIN_NAME_PATTERN: &str = r"^(?:[0-9a-z](?:[0-9a-z-]*[0-9a-z])?\.)+[a-z]{2,6}$";

/// e-Mail address with an ASCII domain part.
pub const EMAIL_PATTERN: &str = r"^(?:[-A-Za-z0-9!#$%&'*+/=?^_`{|}~]\.?)*[-A-Za-z0-9!#$%&'*+/=?^_`{|}~]@(?:[0-9a-z](?:[0-9a-zA-Z-]*[0-9a-zA-Z])?\.)+[a-z]{2,4}$";

/// Dotted quad IPv4 address with an optional network mask.
pub const IP_ADDRESS_PATTERN: &str =
    r"^(?:\d{1,3})\.(?:\d{1,3})\.(?:\d{1,3})\.(?:\d{1,3})(?:/\d{1,2})?$";

/// http or https URL.
pub const HTTP_URL_PATTERN: &str =
    r"^https?://(?:[0-9a-z](?:[0-9a-z-]*[0-9a-z])?\.)+[a-z]{2,6}(?:/.*)?$";

/// Thread-safe regex cache for compiled patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime
/// of the program.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> std::result::Result<Regex, regex::Error> {
        // Fast path: check if already cached
        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Returns `false` if the pattern is invalid (logs a warning).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Validate a regex pattern when a validator is defined.
///
/// Returns an error message if the pattern is invalid, None if valid.
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}

/// Order two values of the same family, `None` if they are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A check applied to an attribute value before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Rejects NULL
    NotNull,
    /// Rejects the empty string
    NotEmpty,
    /// Rejects text, bytes or sequences longer than `max`
    Length { max: usize },
    /// `low < v < high`, or `low <= v <= high` with `inclusive`
    Range {
        low: Value,
        high: Value,
        inclusive: bool,
    },
    /// Text must match `pattern` starting at its first character
    Pattern(String),
    Email,
    HttpUrl,
    DomainName,
    IpAddress,
}

impl Validator {
    pub fn length(max: usize) -> Self {
        Validator::Length { max }
    }

    /// Exclusive range.
    pub fn range(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Validator::Range {
            low: low.into(),
            high: high.into(),
            inclusive: false,
        }
    }

    /// Range including its bounds.
    pub fn range_inclusive(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Validator::Range {
            low: low.into(),
            high: high.into(),
            inclusive: true,
        }
    }

    /// Pattern validator. Invalid patterns are reported here rather than on
    /// every check.
    pub fn pattern(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if let Some(message) = validate_pattern(&pattern) {
            return Err(Error::definition(message));
        }
        Ok(Validator::Pattern(pattern))
    }

    /// Check `value`, assigned to `class.attribute`.
    pub fn check(&self, class: &str, attribute: &str, value: &Value) -> Result<()> {
        let fail = |kind: ValidationErrorKind, message: String| {
            Err(Error::Validation(ValidationError {
                kind,
                class: class.to_string(),
                attribute: attribute.to_string(),
                value: value.repr(),
                message,
            }))
        };

        if value.is_null() {
            if *self == Validator::NotNull {
                return fail(
                    ValidationErrorKind::NotNull,
                    format!("{class}.{attribute} may not be NULL (None)"),
                );
            }
            return Ok(());
        }

        match self {
            Validator::NotNull => Ok(()),
            Validator::NotEmpty => {
                if value.as_str() == Some("") {
                    return fail(
                        ValidationErrorKind::NotEmpty,
                        format!("{class}.{attribute} may not be empty"),
                    );
                }
                Ok(())
            }
            Validator::Length { max } => {
                let len = match value {
                    Value::Text(s) => s.chars().count(),
                    Value::Bytes(b) => b.len(),
                    Value::Array(items) => items.len(),
                    _ => return Ok(()),
                };
                if len > *max {
                    return fail(
                        ValidationErrorKind::Length,
                        format!("Length check failed on {class}.{attribute}"),
                    );
                }
                Ok(())
            }
            Validator::Range {
                low,
                high,
                inclusive,
            } => {
                let above = compare_values(low, value);
                let below = compare_values(value, high);
                let ok = if *inclusive {
                    matches!(above, Some(Ordering::Less | Ordering::Equal))
                        && matches!(below, Some(Ordering::Less | Ordering::Equal))
                } else {
                    above == Some(Ordering::Less) && below == Some(Ordering::Less)
                };
                if ok {
                    return Ok(());
                }
                let op = if *inclusive { "<=" } else { "<" };
                fail(
                    ValidationErrorKind::Range,
                    format!(
                        "Unmatched condition: {} {op} {} {op} {} ({class}.{attribute})",
                        low.repr(),
                        value.repr(),
                        high.repr()
                    ),
                )
            }
            Validator::Pattern(pattern) => {
                let anchored = format!("^(?:{pattern})");
                self.check_pattern(class, attribute, value, &anchored, pattern)
            }
            Validator::Email => self.check_pattern(class, attribute, value, EMAIL_PATTERN, EMAIL_PATTERN),
            Validator::HttpUrl => {
                self.check_pattern(class, attribute, value, HTTP_URL_PATTERN, HTTP_URL_PATTERN)
            }
            Validator::DomainName => self.check_pattern(
                class,
                attribute,
                value,
                DOMAIN_NAME_PATTERN,
                DOMAIN_NAME_PATTERN,
            ),
            Validator::IpAddress => self.check_pattern(
                class,
                attribute,
                value,
                IP_ADDRESS_PATTERN,
                IP_ADDRESS_PATTERN,
            ),
        }
    }

    fn check_pattern(
        &self,
        class: &str,
        attribute: &str,
        value: &Value,
        compiled: &str,
        shown: &str,
    ) -> Result<()> {
        let Some(text) = value.as_str() else {
            return Ok(());
        };
        if matches_pattern(text, compiled) {
            return Ok(());
        }
        Err(Error::Validation(ValidationError {
            kind: ValidationErrorKind::Pattern,
            class: class.to_string(),
            attribute: attribute.to_string(),
            value: value.repr(),
            message: format!(
                "{} does not match regular expression {shown} ({class}.{attribute})",
                value.repr()
            ),
        }))
    }
}
