use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    config::RetryPolicy,
    error::{PlannerError, Result},
    services::provider::ModelProvider,
    types::{prompt::PromptPayload, response::RawModelResponse},
};

impl RetryPolicy {
    /// Nominal delay before retry number `retry` (1-based), before jitter.
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    fn delay_for(&self, retry: usize, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }

        let nominal = self.backoff_for(retry);
        if self.jitter && !nominal.is_zero() {
            nominal.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            nominal
        }
    }
}

/// Retrying front of a [`ModelProvider`].
///
/// Holds no per-request state; one client is shared by every request.
#[derive(Debug, Clone)]
pub struct AiClient {
    provider: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
}

impl AiClient {
    pub fn new(provider: Arc<dyn ModelProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `payload`, retrying transient failures until success, the attempt
    /// ceiling, or `deadline`, whichever comes first.
    ///
    /// Rate limits and transient provider errors are retried with
    /// exponential backoff; a timed-out call is retried at most
    /// `max_timeout_retries` times. Dropping the returned future abandons the
    /// in-flight call.
    pub async fn generate(
        &self,
        payload: &PromptPayload,
        deadline: Instant,
        correlation_id: &str,
    ) -> Result<RawModelResponse> {
        let mut attempt = 0;
        let mut timeouts = 0;

        loop {
            attempt += 1;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PlannerError::ProviderTimeout(
                    "request deadline elapsed before the provider call".to_string(),
                ));
            }
            let call_timeout = self.policy.call_timeout.min(remaining);

            debug!(
                target: "nusatrip::provider",
                correlation_id,
                provider = self.provider.name(),
                attempt,
                timeout_ms = call_timeout.as_millis() as u64,
                "Dispatching provider call"
            );

            let result = match tokio::time::timeout(
                call_timeout,
                self.provider.generate(payload, call_timeout, correlation_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PlannerError::ProviderTimeout(format!(
                    "no response within {}ms",
                    call_timeout.as_millis()
                ))),
            };

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let retry_allowed = attempt < self.policy.max_attempts
                && match &err {
                    PlannerError::ProviderTimeout(_) => timeouts < self.policy.max_timeout_retries,
                    PlannerError::ProviderRateLimited { .. } => true,
                    PlannerError::Provider { transient, .. } => *transient,
                    _ => false,
                };

            if !retry_allowed {
                warn!(
                    target: "nusatrip::provider",
                    correlation_id,
                    attempt,
                    error = %err,
                    "Provider call failed; not retrying"
                );
                return Err(err);
            }

            if matches!(err, PlannerError::ProviderTimeout(_)) {
                timeouts += 1;
            }

            let hint = match &err {
                PlannerError::ProviderRateLimited {
                    retry_after: Some(secs),
                } => Some(Duration::from_secs(*secs)),
                _ => None,
            };
            let delay = self.policy.delay_for(attempt, hint);

            if Instant::now() + delay >= deadline {
                warn!(
                    target: "nusatrip::provider",
                    correlation_id,
                    attempt,
                    error = %err,
                    "Retry would overrun the request deadline"
                );
                return Err(err);
            }

            warn!(
                target: "nusatrip::provider",
                correlation_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Provider call failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
