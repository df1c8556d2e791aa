use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Model-ready instructions compiled from a `TripRequest`.
///
/// Payloads are immutable: retry feedback produces a new payload via
/// `with_feedback`, the original stays as compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    system_instruction: String,
    user_prompt: String,
    response_schema: Arc<Value>,
    feedback: Option<String>,
}

impl PromptPayload {
    pub(crate) fn new(
        system_instruction: String,
        user_prompt: String,
        response_schema: Arc<Value>,
    ) -> Self {
        Self {
            system_instruction,
            user_prompt,
            response_schema,
            feedback: None,
        }
    }

    pub(crate) fn with_feedback(&self, feedback: String) -> Self {
        Self {
            feedback: Some(feedback),
            ..self.clone()
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    /// JSON schema the model output must satisfy.
    pub fn response_schema(&self) -> &Value {
        self.response_schema.as_ref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// User prompt with the feedback section appended, as sent to the model.
    pub fn render(&self) -> String {
        match &self.feedback {
            Some(feedback) => format!("{}\n\n{}", self.user_prompt, feedback),
            None => self.user_prompt.clone(),
        }
    }

    /// Stable SHA-256 over everything the provider receives; usable as a cache key.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.system_instruction.as_str(),
            self.user_prompt.as_str(),
            self.feedback.as_deref().unwrap_or_default(),
        ] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.update(self.response_schema.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
