use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::{PlannerConfig, SynthesisConfig},
    core::{
        inflight::{wait_for_leader, Claim, InFlightRegistry, Waited},
        orchestrator::Orchestrator,
    },
    error::{PlannerError, Result},
    services::{gemini_client::GeminiClient, retry::AiClient},
    types::{itinerary::Itinerary, result::SynthesisReport},
};

/// Caller identity and tracing context for one request.
///
/// The principal is opaque: it comes from the auth layer and is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Option<String>,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            principal: None,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Long-lived entry point turning trip requests into itineraries.
///
/// Cheap to clone; clones share the AI client and the in-flight registry,
/// so identical concurrent requests collapse onto one synthesis.
#[derive(Debug, Clone)]
pub struct TripPlanner {
    client: AiClient,
    config: SynthesisConfig,
    inflight: Option<Arc<InFlightRegistry>>,
}

impl TripPlanner {
    pub fn new(client: AiClient, config: SynthesisConfig) -> Self {
        let inflight = config
            .deduplicate
            .then(|| Arc::new(InFlightRegistry::new()));
        Self {
            client,
            config,
            inflight,
        }
    }

    /// Planner backed by Gemini, configured from `config`.
    pub fn from_config(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let provider = GeminiClient::new(config.gemini)?;
        Ok(Self::new(
            AiClient::new(Arc::new(provider), config.retry),
            config.synthesis,
        ))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(PlannerConfig::from_env()?)
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.config = self.config.with_max_attempts(max_attempts);
        self
    }

    pub fn with_overrun_tolerance(mut self, tolerance: f64) -> Self {
        self.config = self.config.with_overrun_tolerance(tolerance);
        self
    }

    pub fn with_feedback_on_retry(mut self, enabled: bool) -> Self {
        self.config = self.config.with_feedback_on_retry(enabled);
        self
    }

    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.config = self.config.with_deduplication(enabled);
        self.inflight = match (enabled, self.inflight.take()) {
            (true, Some(existing)) => Some(existing),
            (true, None) => Some(Arc::new(InFlightRegistry::new())),
            (false, _) => None,
        };
        self
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn client(&self) -> &AiClient {
        &self.client
    }

    /// Number of distinct requests currently being synthesized.
    pub fn in_flight(&self) -> usize {
        self.inflight.as_ref().map_or(0, |registry| registry.len())
    }

    /// Validate `raw`, generate and reconcile an itinerary before `deadline`.
    ///
    /// Fails only with `Validation` (bad input) or `Exhausted` (attempt
    /// ceiling, provider failure or deadline).
    pub async fn synthesize(
        &self,
        raw: &Value,
        context: &RequestContext,
        deadline: Instant,
    ) -> Result<Itinerary> {
        self.synthesize_with_report(raw, context, deadline)
            .await
            .map(|report| report.itinerary)
    }

    /// [`TripPlanner::synthesize`] with a relative timeout.
    pub async fn synthesize_within(
        &self,
        raw: &Value,
        context: &RequestContext,
        timeout: Duration,
    ) -> Result<Itinerary> {
        self.synthesize(raw, context, Instant::now() + timeout).await
    }

    /// Like [`TripPlanner::synthesize`], returning the full trace of the run.
    ///
    /// Callers attached to an identical in-flight request receive the
    /// leader's report, correlation id included.
    pub async fn synthesize_with_report(
        &self,
        raw: &Value,
        context: &RequestContext,
        deadline: Instant,
    ) -> Result<SynthesisReport> {
        if let Some(principal) = context.principal.as_deref() {
            debug!(
                target: "nusatrip::state",
                correlation_id = %context.correlation_id,
                principal,
                "Synthesis requested"
            );
        }

        let mut orchestrator =
            Orchestrator::new(&self.client, &self.config, &context.correlation_id);
        let request = orchestrator.validate(raw)?;

        let Some(registry) = self.inflight.as_ref() else {
            return orchestrator.run(&request, deadline).await;
        };

        let key = request.content_hash();
        loop {
            match registry.claim(&key) {
                Claim::Leader(guard) => {
                    let outcome = Arc::new(orchestrator.run(&request, deadline).await);
                    guard.publish(Arc::clone(&outcome));
                    return outcome.as_ref().clone();
                }
                Claim::Follower(receiver) => {
                    info!(
                        target: "nusatrip::state",
                        correlation_id = %context.correlation_id,
                        request_hash = %key,
                        "Attached to identical in-flight request"
                    );
                    match wait_for_leader(receiver, deadline).await {
                        Waited::Finished(outcome) => return outcome.as_ref().clone(),
                        Waited::Abandoned => continue,
                        Waited::DeadlineElapsed => {
                            return Err(PlannerError::exhausted(
                                0,
                                PlannerError::ProviderTimeout(
                                    "deadline elapsed while waiting for an identical in-flight request"
                                        .to_string(),
                                ),
                            ))
                        }
                    }
                }
            }
        }
    }
}
