use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Diagnostic, PlannerError},
    types::response::RawModelResponse,
};

/// How a single generation attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    ParseFailure { message: String },
    ConstraintViolation { diagnostics: Vec<Diagnostic> },
    ProviderError { code: String, message: String },
}

impl AttemptOutcome {
    /// Classify a pipeline error raised while handling one attempt.
    pub fn from_error(err: &PlannerError) -> Self {
        match err {
            PlannerError::Parse(_) | PlannerError::Schema(_) => AttemptOutcome::ParseFailure {
                message: err.to_string(),
            },
            PlannerError::ConstraintViolation(diagnostics) => AttemptOutcome::ConstraintViolation {
                diagnostics: diagnostics.clone(),
            },
            other => AttemptOutcome::ProviderError {
                code: other.error_code().to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::ParseFailure { .. } => "parse-failure",
            AttemptOutcome::ConstraintViolation { .. } => "constraint-violation",
            AttemptOutcome::ProviderError { .. } => "provider-error",
        }
    }

    /// One line per problem, used to steer the next prompt.
    pub fn feedback_lines(&self) -> Vec<String> {
        match self {
            AttemptOutcome::Success => Vec::new(),
            AttemptOutcome::ParseFailure { message } => vec![message.clone()],
            AttemptOutcome::ConstraintViolation { diagnostics } => {
                diagnostics.iter().map(ToString::to_string).collect()
            }
            AttemptOutcome::ProviderError { message, .. } => vec![message.clone()],
        }
    }
}

/// One dispatch of a compiled prompt and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// 1-based attempt counter within the request
    pub number: usize,
    /// Fingerprint of the prompt payload sent on this attempt
    pub prompt_fingerprint: String,
    pub outcome: AttemptOutcome,
    /// Raw model output, kept only for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawModelResponse>,
    pub duration: Duration,
}

impl GenerationAttempt {
    pub fn describe(&self) -> String {
        let detail = self.outcome.feedback_lines().join("; ");
        if detail.is_empty() {
            format!(
                "Attempt {} [{}] in {:.2}s",
                self.number,
                self.outcome.label(),
                self.duration.as_secs_f64()
            )
        } else {
            format!(
                "Attempt {} [{}] in {:.2}s: {}",
                self.number,
                self.outcome.label(),
                self.duration.as_secs_f64(),
                detail
            )
        }
    }
}
