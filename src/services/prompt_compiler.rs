use crate::{
    error::Diagnostic,
    schemas::StructuredOutput,
    types::{
        attempt::AttemptOutcome,
        itinerary::Itinerary,
        prompt::PromptPayload,
        trip::{TripDates, TripRequest},
    },
};

const SYSTEM_INSTRUCTION: &str = "You are Smart Trip Planner AI, a travel planner for Indonesia and beyond. \
You build detailed, personal and realistic day-by-day itineraries from the traveler's preferences. \
You reply with a single JSON object and nothing else.";

const NOT_SPECIFIED: &str = "Not specified";

/// Compile a validated trip request into the prompt sent to the model.
///
/// Pure: the same request always yields a byte-identical payload.
pub fn compile(request: &TripRequest) -> PromptPayload {
    let schema = Itinerary::schema();
    let schema_text = schema.prompt_text();

    let mut sections = vec![
        "# Task\nCreate a travel itinerary that is detailed, personal and realistic for the trip below."
            .to_string(),
        format!("# Trip\n{}", trip_section(request)),
        "# Research\nUse current, realistic information for: attraction locations, \
opening hours of attractions, restaurants and shops, entrance fees, meal and local transport \
prices, transport options between locations, and events happening during the trip."
            .to_string(),
        format!("# Constraints\n{}", constraints_section(request)),
        format!(
            "# Output format\nReturn exactly one JSON object matching this JSON schema. \
Use 24-hour HH:MM times, order activities by start time, never overlap them, \
and give every estimated_cost in {} for the whole group.\n{}",
            request.currency(),
            schema_text
        ),
    ];
    sections.push("Create the itinerary now.".to_string());

    PromptPayload::new(
        SYSTEM_INSTRUCTION.to_string(),
        sections.join("\n\n"),
        schema.schema_json_arc(),
    )
}

/// Derive the payload for a re-dispatch, steering the model away from the previous failure.
pub fn with_feedback(payload: &PromptPayload, previous: &AttemptOutcome) -> PromptPayload {
    let lines = previous.feedback_lines();
    if lines.is_empty() {
        return payload.clone();
    }

    let mut feedback = format!(
        "# Previous attempt rejected ({})\nYour previous answer could not be used. Fix these problems:",
        previous.label()
    );
    for line in lines {
        feedback.push_str("\n- ");
        feedback.push_str(&line);
    }
    feedback.push_str("\nReturn the complete corrected JSON object.");

    payload.with_feedback(feedback)
}

/// Convenience for callers holding raw diagnostics rather than an outcome.
pub fn with_diagnostics(payload: &PromptPayload, diagnostics: &[Diagnostic]) -> PromptPayload {
    with_feedback(
        payload,
        &AttemptOutcome::ConstraintViolation {
            diagnostics: diagnostics.to_vec(),
        },
    )
}

fn trip_section(request: &TripRequest) -> String {
    let day_count = request.day_count();
    let dates = match request.dates() {
        TripDates::Range { start, end } => format!(
            "{} to {} ({} day{})",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            day_count,
            plural(day_count)
        ),
        TripDates::Duration { days } => {
            format!("{} day{} duration, dates flexible", days, plural(*days))
        }
    };

    let preferences: Vec<&str> = request.preferences().iter().map(String::as_str).collect();

    let mut lines = vec![
        format!("- Destination: {}", request.destination_label()),
        format!("- Dates: {}", dates),
        format!("- Travelers: {}", request.travelers()),
        format!(
            "- Total budget (approximate): {:.2} {}",
            request.budget(),
            request.currency()
        ),
        format!("- Activity preferences: {}", preferences.join(", ")),
        format!(
            "- Travel style: {}",
            request
                .travel_style()
                .map_or(NOT_SPECIFIED, |style| style.label())
        ),
        format!(
            "- Activity intensity: {}",
            request
                .intensity()
                .map_or(NOT_SPECIFIED, |level| level.label())
        ),
    ];
    if let Some(notes) = request.notes() {
        lines.push(format!("- Notes from the traveler: {}", notes));
    }

    lines.join("\n")
}

fn constraints_section(request: &TripRequest) -> String {
    let day_count = request.day_count();
    let mut lines = vec![
        format!(
            "- Exactly {} entr{} in `days`, numbered 1 to {}.",
            day_count,
            if day_count == 1 { "y" } else { "ies" },
            day_count
        ),
        format!(
            "- The sum of all estimated_cost values must not exceed {:.2} {}.",
            request.budget(),
            request.currency()
        ),
        "- Realistic: account for travel time between locations; no day may schedule more than 24 hours."
            .to_string(),
        "- Balanced: match the requested activity intensity.".to_string(),
        "- Personal: reflect the activity preferences and travel style.".to_string(),
    ];
    if let TripDates::Range { .. } = request.dates() {
        lines.push("- Set each day's `date` to its calendar date (YYYY-MM-DD).".to_string());
    }
    lines.join("\n")
}

fn plural(count: u32) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
