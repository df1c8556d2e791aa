use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::GeminiConfig,
    error::{PlannerError, Result},
    services::provider::ModelProvider,
    types::{
        prompt::PromptPayload,
        response::{RawModelResponse, TokenUsage},
    },
};

/// Single-shot client for the Gemini `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| PlannerError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version.trim_matches('/'),
            self.config.model
        )
    }
}

fn request_body(payload: &PromptPayload) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": payload.system_instruction() }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": payload.render() }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json"
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

fn map_send_error(err: reqwest::Error) -> PlannerError {
    if err.is_timeout() {
        PlannerError::ProviderTimeout(format!("HTTP request timed out: {err}"))
    } else {
        PlannerError::provider(
            format!("HTTP request failed: {err}"),
            err.is_connect() || err.is_request(),
        )
    }
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn map_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> PlannerError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PlannerError::ProviderRateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            PlannerError::ProviderTimeout(format!("HTTP {}", status.as_u16()))
        }
        status => PlannerError::provider(
            format!("HTTP {} error: {}", status.as_u16(), api_message(body)),
            status.is_server_error(),
        ),
    }
}

fn into_raw_response(parsed: GenerateContentResponse) -> Result<RawModelResponse> {
    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(PlannerError::provider(
            format!("prompt blocked by provider: {reason}"),
            false,
        ));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PlannerError::provider("response contained no candidates", false))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let mut response = RawModelResponse::new(text);
    if let Some(reason) = candidate.finish_reason {
        response = response.with_finish_reason(reason);
    }
    if let Some(model) = parsed.model_version {
        response = response.with_model(model);
    }
    if let Some(usage) = parsed.usage_metadata {
        response = response.with_usage(TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        });
    }
    Ok(response)
}

#[async_trait]
impl ModelProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        payload: &PromptPayload,
        timeout: Duration,
        correlation_id: &str,
    ) -> Result<RawModelResponse> {
        let url = self.endpoint();
        debug!(
            target: "nusatrip::provider",
            correlation_id,
            model = %self.config.model,
            "POST {}",
            url
        );

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body(payload))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(map_send_error)?;

        if !status.is_success() {
            return Err(map_status(status, retry_after, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|err| {
            PlannerError::provider(format!("Failed to parse provider response: {err}"), false)
        })?;
        let raw = into_raw_response(parsed)?;

        debug!(
            target: "nusatrip::provider",
            correlation_id,
            finish_reason = raw.finish_reason.as_deref().unwrap_or("unknown"),
            total_tokens = raw.usage.map(|usage| usage.total_tokens).unwrap_or_default(),
            "Provider responded"
        );
        Ok(raw)
    }
}
