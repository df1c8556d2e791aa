use serde::{Deserialize, Serialize};

use crate::{error::PlannerError, types::itinerary::Itinerary};

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Unparsed model output plus whatever metadata the provider attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawModelResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl RawModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// First `max_chars` characters, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push('…');
        }
        preview
    }
}

/// Result of running the parser over one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    ParsedOk(Itinerary),
    /// Holds a `Parse` or `Schema` error describing what was wrong
    ParsedFailed(PlannerError),
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParseOutcome::ParsedOk(_))
    }

    pub fn into_result(self) -> Result<Itinerary, PlannerError> {
        match self {
            ParseOutcome::ParsedOk(itinerary) => Ok(itinerary),
            ParseOutcome::ParsedFailed(err) => Err(err),
        }
    }
}
