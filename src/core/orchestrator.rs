use std::time::Instant as StdInstant;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    config::SynthesisConfig,
    core::state::SynthesisState,
    error::{PlannerError, Result},
    schemas::validator::validate_request,
    services::{parser, prompt_compiler, reconciler, retry::AiClient},
    types::{
        attempt::{AttemptOutcome, GenerationAttempt},
        itinerary::Itinerary,
        prompt::PromptPayload,
        response::{ParseOutcome, RawModelResponse},
        result::SynthesisReport,
        trip::TripRequest,
    },
};

/// Request-scoped driver of the synthesis state machine.
///
/// Owns the state trace and the attempt log of exactly one request; the
/// shared pieces (client, config) are borrowed from the planner.
pub(crate) struct Orchestrator<'a> {
    client: &'a AiClient,
    config: &'a SynthesisConfig,
    correlation_id: String,
    request_hash: Option<String>,
    state: SynthesisState,
    states: Vec<SynthesisState>,
    attempts: Vec<GenerationAttempt>,
    started: StdInstant,
}

impl<'a> Orchestrator<'a> {
    pub(crate) fn new(
        client: &'a AiClient,
        config: &'a SynthesisConfig,
        correlation_id: impl Into<String>,
    ) -> Self {
        let correlation_id = correlation_id.into();
        info!(
            target: "nusatrip::state",
            correlation_id = %correlation_id,
            "{}",
            SynthesisState::Received.describe()
        );

        Self {
            client,
            config,
            correlation_id,
            request_hash: None,
            state: SynthesisState::Received,
            states: vec![SynthesisState::Received],
            attempts: Vec::new(),
            started: StdInstant::now(),
        }
    }

    fn transition(&mut self, next: SynthesisState) {
        debug_assert!(
            self.state.allows(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        info!(
            target: "nusatrip::state",
            correlation_id = %self.correlation_id,
            request_hash = self.request_hash.as_deref().unwrap_or("-"),
            from = ?self.state,
            "{}",
            next.describe()
        );
        self.state = next;
        self.states.push(next);
    }

    /// `Received -> Validated`, or the terminal `Rejected`.
    pub(crate) fn validate(&mut self, raw: &Value) -> Result<TripRequest> {
        match validate_request(raw) {
            Ok(request) => {
                self.request_hash = Some(request.content_hash());
                self.transition(SynthesisState::Validated);
                Ok(request)
            }
            Err(err) => {
                self.transition(SynthesisState::Rejected);
                warn!(
                    target: "nusatrip::state",
                    correlation_id = %self.correlation_id,
                    error = %err,
                    "Trip request rejected"
                );
                Err(err)
            }
        }
    }

    /// Compile, dispatch, parse and reconcile until an itinerary passes or
    /// the attempt ceiling or deadline is reached.
    pub(crate) async fn run(
        mut self,
        request: &TripRequest,
        deadline: Instant,
    ) -> Result<SynthesisReport> {
        let compiled = prompt_compiler::compile(request);
        self.transition(SynthesisState::Compiled);

        let max_attempts = self.config.max_attempts.max(1);
        let mut payload = compiled.clone();
        let mut last_error = None;

        for number in 1..=max_attempts {
            if Instant::now() >= deadline {
                last_error = Some(PlannerError::ProviderTimeout(format!(
                    "request deadline elapsed after {} attempt(s)",
                    self.attempts.len()
                )));
                break;
            }

            self.transition(SynthesisState::Dispatched { attempt: number });
            let attempt_started = StdInstant::now();
            let fingerprint = payload.fingerprint();

            let raw = match self
                .client
                .generate(&payload, deadline, &self.correlation_id)
                .await
            {
                Ok(raw) => raw,
                Err(err) => {
                    self.record(
                        number,
                        fingerprint,
                        AttemptOutcome::from_error(&err),
                        None,
                        attempt_started,
                    );
                    return Err(self.exhaust(err));
                }
            };

            let outcome = match parser::parse_outcome(&raw) {
                ParseOutcome::ParsedFailed(err) => {
                    self.transition(SynthesisState::ParsedFailed);
                    err
                }
                ParseOutcome::ParsedOk(itinerary) => {
                    self.transition(SynthesisState::ParsedOk);
                    match reconciler::reconcile(itinerary, request, self.config.overrun_tolerance) {
                        Ok(itinerary) => {
                            self.transition(SynthesisState::Reconciled);
                            self.record(
                                number,
                                fingerprint,
                                AttemptOutcome::Success,
                                Some(raw),
                                attempt_started,
                            );
                            return Ok(self.complete(itinerary));
                        }
                        Err(err) => {
                            self.transition(SynthesisState::Rejected);
                            err
                        }
                    }
                }
            };

            let attempt_outcome = AttemptOutcome::from_error(&outcome);
            warn!(
                target: "nusatrip::state",
                correlation_id = %self.correlation_id,
                attempt = number,
                max_attempts,
                outcome = attempt_outcome.label(),
                error = %outcome,
                "Generation attempt failed"
            );
            payload = self.next_payload(&compiled, &payload, &attempt_outcome);
            self.record(number, fingerprint, attempt_outcome, Some(raw), attempt_started);
            last_error = Some(outcome);
        }

        let last = last_error.unwrap_or_else(|| {
            PlannerError::ProviderTimeout("request deadline elapsed before dispatch".to_string())
        });
        Err(self.exhaust(last))
    }

    fn next_payload(
        &self,
        compiled: &PromptPayload,
        current: &PromptPayload,
        outcome: &AttemptOutcome,
    ) -> PromptPayload {
        if self.config.feedback_on_retry {
            prompt_compiler::with_feedback(compiled, outcome)
        } else {
            current.clone()
        }
    }

    fn record(
        &mut self,
        number: usize,
        prompt_fingerprint: String,
        outcome: AttemptOutcome,
        raw: Option<RawModelResponse>,
        started: StdInstant,
    ) {
        self.attempts.push(GenerationAttempt {
            number,
            prompt_fingerprint,
            outcome,
            raw,
            duration: started.elapsed(),
        });
    }

    fn complete(mut self, itinerary: Itinerary) -> SynthesisReport {
        self.transition(SynthesisState::Completed);
        let report = SynthesisReport {
            itinerary,
            request_hash: self.request_hash.unwrap_or_default(),
            correlation_id: self.correlation_id,
            attempts: self.attempts,
            states: self.states,
            duration: self.started.elapsed(),
        };

        info!(
            target: "nusatrip::state",
            correlation_id = %report.correlation_id,
            attempts = report.attempt_count(),
            days = report.itinerary.day_count(),
            total_cost = report.itinerary.total_cost(),
            "Itinerary synthesized"
        );
        report
    }

    fn exhaust(&mut self, last: PlannerError) -> PlannerError {
        self.transition(SynthesisState::Exhausted);
        let trace = self
            .attempts
            .iter()
            .map(GenerationAttempt::describe)
            .collect::<Vec<_>>()
            .join(" | ");
        warn!(
            target: "nusatrip::state",
            correlation_id = %self.correlation_id,
            attempts = self.attempts.len(),
            trace = %trace,
            "Synthesis exhausted"
        );
        PlannerError::exhausted(self.attempts.len(), last)
    }
}
