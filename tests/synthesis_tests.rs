use async_trait::async_trait;
use nusatrip_ai::{
    AiClient, ModelProvider, PlannerError, PromptPayload, RawModelResponse, RequestContext,
    RetryPolicy, SynthesisConfig, SynthesisState, TripPlanner,
};
use serde_json::{json, Value};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::time::Instant;

/// Replays scripted replies in order, repeating the last one forever.
#[derive(Debug)]
struct FakeProvider {
    replies: Mutex<VecDeque<Result<String, PlannerError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeProvider {
    fn new(replies: Vec<Result<String, PlannerError>>) -> Arc<Self> {
        Self::with_delay(replies, Duration::ZERO)
    }

    fn with_delay(replies: Vec<Result<String, PlannerError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(
        &self,
        payload: &PromptPayload,
        _timeout: Duration,
        _correlation_id: &str,
    ) -> nusatrip_ai::Result<RawModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(payload.render());

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Some(Ok(text)) => Ok(RawModelResponse::new(text).with_model("fake-model")),
            Some(Err(err)) => Err(err),
            None => Err(PlannerError::provider("no scripted reply", false)),
        }
    }
}

fn planner(provider: Arc<FakeProvider>) -> TripPlanner {
    TripPlanner::new(
        AiClient::new(provider, RetryPolicy::immediate()),
        SynthesisConfig::default(),
    )
}

fn bali_request() -> Value {
    json!({
        "travel_destination": "Bali",
        "start_date": "2025-07-01",
        "end_date": "2025-07-03",
        "travel_budget": 300,
        "activity_preferences": ["beaches", "surfing"],
        "travel_style": "Romantic couple"
    })
}

fn plan(day_costs: &[f64]) -> String {
    let days: Vec<Value> = day_costs
        .iter()
        .enumerate()
        .map(|(idx, cost)| {
            json!({
                "day": idx + 1,
                "date": format!("2025-07-{:02}", idx + 1),
                "title": "Beach day",
                "activities": [
                    {
                        "start": "09:00",
                        "end": "11:30",
                        "location": "Kuta Beach",
                        "description": "Surf lesson",
                        "estimated_cost": cost
                    },
                    {
                        "start": "12:00",
                        "end": "13:00",
                        "location": "Seminyak",
                        "description": "Lunch by the sea",
                        "estimated_cost": 0
                    }
                ]
            })
        })
        .collect();

    json!({ "days": days, "currency": "IDR" }).to_string()
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

fn exhausted(err: PlannerError) -> (usize, PlannerError) {
    match err {
        PlannerError::Exhausted { attempts, last } => (attempts, *last),
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_valid_plan_completes_first_attempt() {
    let reply = format!(
        "Here is your itinerary!\n```json\n{}\n```",
        plan(&[100.0, 100.0, 80.0])
    );
    let provider = FakeProvider::new(vec![Ok(reply)]);
    let planner = planner(provider.clone());

    let report = planner
        .synthesize_with_report(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(report.itinerary.day_count(), 3);
    assert!((report.itinerary.total_cost() - 280.0).abs() < 1e-9);
    assert_eq!(report.attempt_count(), 1);
    assert_eq!(
        report.states,
        vec![
            SynthesisState::Received,
            SynthesisState::Validated,
            SynthesisState::Compiled,
            SynthesisState::Dispatched { attempt: 1 },
            SynthesisState::ParsedOk,
            SynthesisState::Reconciled,
            SynthesisState::Completed,
        ]
    );
    assert!(report.replay().contains("Total estimated cost: 280.00 IDR"));
}

#[tokio::test]
async fn test_constraint_violation_retried_with_feedback() {
    let provider = FakeProvider::new(vec![
        Ok(plan(&[50.0, 50.0])),
        Ok(plan(&[50.0, 50.0, 50.0])),
    ]);
    let planner = planner(provider.clone());

    let report = planner
        .synthesize_with_report(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(report.attempt_count(), 2);
    assert_eq!(report.attempts[0].outcome.label(), "constraint-violation");
    assert!(report.attempts[1].outcome.is_success());
    assert_ne!(
        report.attempts[0].prompt_fingerprint,
        report.attempts[1].prompt_fingerprint
    );
    assert!(report.states.contains(&SynthesisState::Rejected));

    let prompts = provider.prompts();
    assert!(!prompts[0].contains("Previous attempt rejected"));
    assert!(prompts[1].contains("Previous attempt rejected (constraint-violation)"));
    assert!(prompts[1].contains("days: expected 3 day(s), got 2 day(s)"));
}

#[tokio::test]
async fn test_wrong_day_count_exhausts() {
    let provider = FakeProvider::new(vec![Ok(plan(&[50.0, 50.0]))]);
    let planner = planner(provider.clone());

    let err = planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap_err();

    assert_eq!(provider.calls(), 3);
    let (attempts, last) = exhausted(err);
    assert_eq!(attempts, 3);
    match last {
        PlannerError::ConstraintViolation(diagnostics) => {
            assert_eq!(diagnostics[0].field, "days");
            assert_eq!(diagnostics[0].expected, "3 day(s)");
            assert_eq!(diagnostics[0].actual, "2 day(s)");
        }
        other => panic!("unexpected last error {other:?}"),
    }
}

#[tokio::test]
async fn test_over_budget_exhausts() {
    let provider = FakeProvider::new(vec![Ok(plan(&[200.0, 200.0, 200.0]))]);
    let planner = planner(provider.clone()).with_max_attempts(2);

    let err = planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap_err();

    let (attempts, last) = exhausted(err);
    assert_eq!(attempts, 2);
    assert!(last.to_string().contains("total_cost"));
}

#[tokio::test]
async fn test_malformed_output_exhausts_with_parse_error() {
    let provider = FakeProvider::new(vec![Ok("Sorry, I can't plan that trip.".to_string())]);
    let planner = planner(provider.clone());

    let err = planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap_err();

    assert_eq!(provider.calls(), 3);
    let (attempts, last) = exhausted(err);
    assert_eq!(attempts, 3);
    assert!(matches!(last, PlannerError::Parse(_)));
}

#[tokio::test]
async fn test_parse_failure_then_success() {
    let provider = FakeProvider::new(vec![
        Ok("{\"days\": []}".to_string()),
        Ok(plan(&[10.0, 10.0, 10.0])),
    ]);
    let planner = planner(provider.clone());

    let report = planner
        .synthesize_with_report(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap();

    assert_eq!(report.attempts[0].outcome.label(), "parse-failure");
    assert!(report.states.contains(&SynthesisState::ParsedFailed));
    assert!(provider.prompts()[1].contains("Previous attempt rejected (parse-failure)"));
}

#[tokio::test]
async fn test_feedback_can_be_disabled() {
    let provider = FakeProvider::new(vec![Ok(plan(&[50.0])), Ok(plan(&[50.0, 50.0, 50.0]))]);
    let planner = planner(provider.clone()).with_feedback_on_retry(false);

    planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap();

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_rate_limit_retried_within_adapter_budget() {
    let provider = FakeProvider::new(vec![Err(PlannerError::ProviderRateLimited {
        retry_after: None,
    })]);
    let planner = planner(provider.clone());

    let err = planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap_err();

    // Three provider calls, one orchestrator attempt.
    assert_eq!(provider.calls(), 3);
    let (attempts, last) = exhausted(err);
    assert_eq!(attempts, 1);
    assert!(matches!(last, PlannerError::ProviderRateLimited { .. }));
}

#[tokio::test]
async fn test_permanent_provider_error_is_not_retried() {
    let provider = FakeProvider::new(vec![Err(PlannerError::provider("HTTP 403", false))]);
    let planner = planner(provider.clone());

    let err = planner
        .synthesize(&bali_request(), &RequestContext::new(), far_deadline())
        .await
        .unwrap_err();

    assert_eq!(provider.calls(), 1);
    assert_eq!(err.error_code(), "EXHAUSTED");
    assert!(matches!(err.root_cause(), PlannerError::Provider { .. }));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_without_dispatch() {
    let provider = FakeProvider::new(vec![Ok(plan(&[10.0]))]);
    let planner = planner(provider.clone());

    let err = planner
        .synthesize(
            &json!({
                "travel_destination": "Bali",
                "start_date": "2025-07-05",
                "end_date": "2025-07-01",
                "travel_budget": -1,
                "activity_preferences": ["beaches"]
            }),
            &RequestContext::new(),
            far_deadline(),
        )
        .await
        .unwrap_err();

    assert_eq!(provider.calls(), 0);
    match err {
        PlannerError::Validation(fields) => {
            assert!(fields.iter().any(|f| f.field == "end_date"));
            assert!(fields.iter().any(|f| f.field == "travel_budget"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadline_expiry_surfaces_provider_timeout() {
    let provider = FakeProvider::with_delay(
        vec![Ok(plan(&[10.0, 10.0, 10.0]))],
        Duration::from_secs(5),
    );
    let planner = planner(provider.clone());

    let started = Instant::now();
    let err = planner
        .synthesize(
            &bali_request(),
            &RequestContext::new(),
            Instant::now() + Duration::from_millis(100),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    let (_, last) = exhausted(err);
    assert!(matches!(last, PlannerError::ProviderTimeout(_)));
}

#[tokio::test]
async fn test_identical_concurrent_requests_share_one_synthesis() {
    let provider = FakeProvider::with_delay(
        vec![Ok(plan(&[90.0, 90.0, 90.0]))],
        Duration::from_millis(100),
    );
    let planner = planner(provider.clone());
    let first_context = RequestContext::new().with_principal("user-1");
    let second_context = RequestContext::new().with_principal("user-2");
    let request = bali_request();

    let (first, second) = tokio::join!(
        planner.synthesize_with_report(&request, &first_context, far_deadline()),
        planner.synthesize_with_report(&request, &second_context, far_deadline()),
    );

    assert_eq!(provider.calls(), 1);
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first, second);
    assert!(
        first.correlation_id == first_context.correlation_id
            || first.correlation_id == second_context.correlation_id
    );
    assert_eq!(planner.in_flight(), 0);
}

#[tokio::test]
async fn test_identical_failures_are_shared_too() {
    let provider = FakeProvider::with_delay(
        vec![Ok("not json".to_string())],
        Duration::from_millis(50),
    );
    let planner = planner(provider.clone()).with_max_attempts(1);
    let request = bali_request();
    let (first_context, second_context) = (RequestContext::new(), RequestContext::new());

    let (first, second) = tokio::join!(
        planner.synthesize(&request, &first_context, far_deadline()),
        planner.synthesize(&request, &second_context, far_deadline()),
    );

    assert_eq!(provider.calls(), 1);
    assert_eq!(first.unwrap_err(), second.unwrap_err());
}

#[tokio::test]
async fn test_distinct_requests_run_independently() {
    let provider = FakeProvider::with_delay(
        vec![Ok(plan(&[10.0, 10.0, 10.0]))],
        Duration::from_millis(50),
    );
    let planner = planner(provider.clone());
    let mut cheaper = bali_request();
    cheaper["travel_budget"] = json!(200);
    let request = bali_request();
    let (first_context, second_context) = (RequestContext::new(), RequestContext::new());

    let (first, second) = tokio::join!(
        planner.synthesize(&request, &first_context, far_deadline()),
        planner.synthesize(&cheaper, &second_context, far_deadline()),
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_deduplication_can_be_disabled() {
    let provider = FakeProvider::with_delay(
        vec![Ok(plan(&[10.0, 10.0, 10.0]))],
        Duration::from_millis(50),
    );
    let planner = planner(provider.clone()).with_deduplication(false);
    let request = bali_request();
    let (first_context, second_context) = (RequestContext::new(), RequestContext::new());

    let (first, second) = tokio::join!(
        planner.synthesize(&request, &first_context, far_deadline()),
        planner.synthesize(&request, &second_context, far_deadline()),
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_follower_takes_over_after_leader_cancelled() {
    let provider = FakeProvider::with_delay(
        vec![Ok(plan(&[10.0, 10.0, 10.0]))],
        Duration::from_millis(100),
    );
    let planner = planner(provider.clone());
    let request = bali_request();
    let (leader_context, follower_context) = (RequestContext::new(), RequestContext::new());

    let mut leader = Box::pin(planner.synthesize(&request, &leader_context, far_deadline()));
    let mut follower = Box::pin(planner.synthesize(&request, &follower_context, far_deadline()));

    // Start both, then abandon the leader before its provider call returns.
    tokio::select! {
        biased;
        _ = &mut leader => panic!("leader should still be running"),
        _ = &mut follower => panic!("follower should still be waiting"),
        _ = tokio::time::sleep(Duration::from_millis(20)) => {}
    }
    drop(leader);

    let itinerary = follower.await.unwrap();
    assert_eq!(itinerary.day_count(), 3);
    assert_eq!(provider.calls(), 2);
}
