use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    core::state::SynthesisState,
    types::{attempt::GenerationAttempt, itinerary::Itinerary},
};

/// Successful terminal result of one synthesis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// Reconciled itinerary handed back to the caller
    pub itinerary: Itinerary,
    /// Content hash of the originating trip request
    pub request_hash: String,
    /// Correlation id of the request that ran the synthesis
    pub correlation_id: String,
    /// Every generation attempt, in order
    pub attempts: Vec<GenerationAttempt>,
    /// States visited by the orchestrator
    pub states: Vec<SynthesisState>,
    /// Wall time from receipt to completion
    pub duration: Duration,
}

impl SynthesisReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn failed_attempts(&self) -> impl Iterator<Item = &GenerationAttempt> {
        self.attempts
            .iter()
            .filter(|attempt| !attempt.outcome.is_success())
    }

    /// Human-readable trace of the run.
    pub fn replay(&self) -> String {
        let mut lines = Vec::new();

        lines.push("=== Itinerary Synthesis Trace ===".to_string());
        lines.push(format!("Correlation: {}", self.correlation_id));
        lines.push(format!("Request hash: {}", self.request_hash));
        lines.push(format!("Duration: {:.2}s", self.duration.as_secs_f64()));
        lines.push(format!("Attempts: {}", self.attempt_count()));

        lines.push(String::new());
        lines.push("--- States ---".to_string());
        for (idx, state) in self.states.iter().enumerate() {
            lines.push(format!("{}. {}", idx + 1, state.describe()));
        }

        lines.push(String::new());
        lines.push("--- Attempts ---".to_string());
        for attempt in &self.attempts {
            lines.push(attempt.describe());
        }

        lines.push(String::new());
        lines.push("--- Itinerary ---".to_string());
        for day in &self.itinerary.days {
            let heading = match (&day.date, &day.title) {
                (Some(date), Some(title)) => format!("Day {} ({}): {}", day.day, date, title),
                (Some(date), None) => format!("Day {} ({})", day.day, date),
                (None, Some(title)) => format!("Day {}: {}", day.day, title),
                (None, None) => format!("Day {}", day.day),
            };
            lines.push(heading);
            for activity in &day.activities {
                lines.push(format!(
                    "  {}-{} {} @ {} ({:.2})",
                    activity.start,
                    activity.end,
                    activity.description,
                    activity.location,
                    activity.estimated_cost
                ));
            }
        }
        lines.push(format!(
            "Total estimated cost: {:.2}{}",
            self.itinerary.total_cost(),
            self.itinerary
                .currency
                .as_deref()
                .map(|code| format!(" {code}"))
                .unwrap_or_default()
        ));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        attempt::AttemptOutcome,
        itinerary::{Activity, ClockTime, DayPlan},
    };

    fn report() -> SynthesisReport {
        SynthesisReport {
            itinerary: Itinerary {
                days: vec![DayPlan {
                    day: 1,
                    date: None,
                    title: Some("Arrival".to_string()),
                    activities: vec![Activity {
                        start: ClockTime::from_hm(10, 0).unwrap(),
                        end: ClockTime::from_hm(12, 0).unwrap(),
                        location: "Ngurah Rai Airport".to_string(),
                        description: "Land and transfer".to_string(),
                        estimated_cost: 25.0,
                    }],
                }],
                currency: Some("IDR".to_string()),
                notes: None,
            },
            request_hash: "hash".to_string(),
            correlation_id: "corr-1".to_string(),
            attempts: vec![
                GenerationAttempt {
                    number: 1,
                    prompt_fingerprint: "a".to_string(),
                    outcome: AttemptOutcome::ParseFailure {
                        message: "no JSON".to_string(),
                    },
                    raw: None,
                    duration: Duration::from_millis(10),
                },
                GenerationAttempt {
                    number: 2,
                    prompt_fingerprint: "b".to_string(),
                    outcome: AttemptOutcome::Success,
                    raw: None,
                    duration: Duration::from_millis(10),
                },
            ],
            states: vec![SynthesisState::Received, SynthesisState::Completed],
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_failed_attempts() {
        let report = report();
        assert_eq!(report.attempt_count(), 2);
        assert_eq!(report.failed_attempts().count(), 1);
    }

    #[test]
    fn test_replay_format() {
        let replay = report().replay();
        assert!(replay.contains("Itinerary Synthesis Trace"));
        assert!(replay.contains("Attempt 1 [parse-failure]"));
        assert!(replay.contains("Day 1: Arrival"));
        assert!(replay.contains("10:00-12:00 Land and transfer @ Ngurah Rai Airport"));
        assert!(replay.contains("Total estimated cost: 25.00 IDR"));
    }
}
