use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{prompt::PromptPayload, response::RawModelResponse},
};

/// One outbound call to a generative model.
///
/// Implementations perform exactly one network request per `generate` call
/// and map failures onto `ProviderTimeout`, `ProviderRateLimited` or
/// `Provider { transient, .. }`. Retrying is the job of `AiClient`.
#[async_trait]
pub trait ModelProvider: Send + Sync + std::fmt::Debug {
    /// Short provider name for logs, e.g. "gemini"
    fn name(&self) -> &str;

    async fn generate(
        &self,
        payload: &PromptPayload,
        timeout: Duration,
        correlation_id: &str,
    ) -> Result<RawModelResponse>;
}
