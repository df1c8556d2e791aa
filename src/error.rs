use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// One rejected field of an incoming trip request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A single reconciliation finding: which field, what was expected, what the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl Diagnostic {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(": retry after {secs}s"),
        None => String::new(),
    }
}

/// Error taxonomy of the synthesis pipeline.
///
/// Only [`PlannerError::Validation`] and [`PlannerError::Exhausted`] (plus
/// [`PlannerError::Config`] at construction time) ever reach callers of
/// `TripPlanner::synthesize`; every other variant is recovered internally
/// and ends up as the `last` diagnostic of an `Exhausted`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {}", join_display(.0))]
    Validation(Vec<FieldError>),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("Provider rate limited{}", retry_hint(.retry_after))]
    ProviderRateLimited { retry_after: Option<u64> },

    #[error("Provider error: {message}")]
    Provider { message: String, transient: bool },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Constraint violation: {}", join_display(.0))]
    ConstraintViolation(Vec<Diagnostic>),

    #[error("Exhausted after {attempts} attempt(s); last error: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<PlannerError>,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Serialization(err.to_string())
    }
}

impl PlannerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PlannerError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn provider(message: impl Into<String>, transient: bool) -> Self {
        PlannerError::Provider {
            message: message.into(),
            transient,
        }
    }

    pub fn exhausted(attempts: usize, last: PlannerError) -> Self {
        PlannerError::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Whether the pipeline may try again on its own after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::ProviderTimeout(_)
            | PlannerError::ProviderRateLimited { .. }
            | PlannerError::Parse(_)
            | PlannerError::Schema(_)
            | PlannerError::ConstraintViolation(_) => true,
            PlannerError::Provider { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Whether this error ends a request without any further attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlannerError::Validation(_) | PlannerError::Exhausted { .. } | PlannerError::Config(_)
        )
    }

    /// The diagnostic that actually caused a failure, looking through `Exhausted`.
    pub fn root_cause(&self) -> &PlannerError {
        match self {
            PlannerError::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Config(_) => "CONFIG_ERROR",
            PlannerError::Validation(_) => "VALIDATION_ERROR",
            PlannerError::Schema(_) => "SCHEMA_ERROR",
            PlannerError::Serialization(_) => "SERIALIZATION_ERROR",
            PlannerError::ProviderTimeout(_) => "PROVIDER_TIMEOUT",
            PlannerError::ProviderRateLimited { .. } => "PROVIDER_RATE_LIMITED",
            PlannerError::Provider { .. } => "PROVIDER_ERROR",
            PlannerError::Parse(_) => "PARSE_ERROR",
            PlannerError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            PlannerError::Exhausted { .. } => "EXHAUSTED",
        }
    }

    /// Render the failure envelope handed to the HTTP layer.
    pub fn to_error_payload(&self) -> serde_json::Value {
        let details = match self {
            PlannerError::Validation(fields) => json!(fields),
            PlannerError::ConstraintViolation(diagnostics) => json!(diagnostics),
            PlannerError::Exhausted { attempts, last } => json!({
                "attempts": attempts,
                "last_error": {
                    "code": last.error_code(),
                    "message": last.to_string(),
                }
            }),
            _ => serde_json::Value::Null,
        };

        json!({
            "success": false,
            "message": self.to_string(),
            "error": {
                "code": self.error_code(),
                "retryable": self.is_retryable(),
                "details": details,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_field() {
        let err = PlannerError::Validation(vec![
            FieldError::new("travel_budget", "must be >= 0"),
            FieldError::new("end_date", "cannot be before start_date"),
        ]);

        let message = err.to_string();
        assert!(message.contains("travel_budget: must be >= 0"));
        assert!(message.contains("end_date: cannot be before start_date"));
        assert!(!err.is_retryable());
        assert!(err.is_terminal());
    }

    #[test]
    fn test_rate_limit_message() {
        let with_hint = PlannerError::ProviderRateLimited {
            retry_after: Some(7),
        };
        assert_eq!(with_hint.to_string(), "Provider rate limited: retry after 7s");

        let without_hint = PlannerError::ProviderRateLimited { retry_after: None };
        assert_eq!(without_hint.to_string(), "Provider rate limited");
        assert!(without_hint.is_retryable());
    }

    #[test]
    fn test_exhausted_root_cause() {
        let err = PlannerError::exhausted(3, PlannerError::Parse("no JSON found".to_string()));

        assert_eq!(err.error_code(), "EXHAUSTED");
        assert!(matches!(err.root_cause(), PlannerError::Parse(_)));
        assert!(err.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn test_error_payload_shape() {
        let err = PlannerError::ConstraintViolation(vec![Diagnostic::new("days", "3", "2")]);
        let payload = err.to_error_payload();

        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"]["code"], "CONSTRAINT_VIOLATION");
        assert_eq!(payload["error"]["retryable"], true);
        assert_eq!(payload["error"]["details"][0]["expected"], "3");
    }

    #[test]
    fn test_permanent_provider_error_is_not_retryable() {
        assert!(!PlannerError::provider("HTTP 401", false).is_retryable());
        assert!(PlannerError::provider("HTTP 503", true).is_retryable());
    }
}
