use serde_json::{json, Value};
use tracing::debug;

use crate::{
    error::{PlannerError, Result},
    schemas::{validation::validate_itinerary, validator::collapse_whitespace},
    types::{
        itinerary::Itinerary,
        response::{ParseOutcome, RawModelResponse},
    },
};

const FENCE: &str = "```";

/// Extract and structurally validate an itinerary from raw model output.
///
/// Tolerates prose around the JSON, markdown fences and irregular
/// whitespace. Output without a single usable day is a `Parse` error;
/// output that has days but breaks the schema is a `Schema` error.
pub fn parse(raw: &RawModelResponse) -> Result<Itinerary> {
    if raw.text.trim().is_empty() {
        return Err(PlannerError::Parse("model returned an empty response".to_string()));
    }

    let value = extract_json(&raw.text).ok_or_else(|| {
        PlannerError::Parse(format!(
            "no JSON object found in model output: {}",
            raw.preview(120)
        ))
    })?;

    let candidate = unwrap_itinerary(value);
    match candidate.get("days") {
        None => {
            return Err(PlannerError::Parse(
                "model output has no `days` list".to_string(),
            ))
        }
        Some(Value::Array(days)) if !days.iter().any(Value::is_object) => {
            return Err(PlannerError::Parse(
                "model output contains zero valid DayPlan entries".to_string(),
            ))
        }
        Some(_) => {}
    }

    let mut itinerary = validate_itinerary(&candidate)?;
    normalize(&mut itinerary);

    debug!(
        target: "nusatrip::schema",
        days = itinerary.day_count(),
        activities = itinerary.activity_count(),
        "Parsed itinerary"
    );
    Ok(itinerary)
}

/// Same as [`parse`], folded into a [`ParseOutcome`].
pub fn parse_outcome(raw: &RawModelResponse) -> ParseOutcome {
    match parse(raw) {
        Ok(itinerary) => ParseOutcome::ParsedOk(itinerary),
        Err(err) => ParseOutcome::ParsedFailed(err),
    }
}

/// Best-effort extraction of the itinerary JSON embedded in `text`.
///
/// Candidates come from fenced ```` ```json ```` blocks, then any fenced
/// block, then the whole text; a candidate that is not valid JSON as a whole
/// yields every balanced `{...}` / `[...]` span inside it, left to right.
/// The first candidate shaped like an itinerary wins, otherwise the first
/// JSON value found.
pub fn extract_json(text: &str) -> Option<Value> {
    let mut fallback = None;
    for candidate in candidates(text) {
        if has_day_objects(&unwrap_itinerary(candidate.clone())) {
            return Some(candidate);
        }
        fallback.get_or_insert(candidate);
    }
    fallback
}

fn candidates(text: &str) -> impl Iterator<Item = Value> + '_ {
    let (tagged, untagged): (Vec<_>, Vec<_>) = fenced_blocks(text)
        .into_iter()
        .partition(|(tag, _)| tag.eq_ignore_ascii_case("json"));

    tagged
        .into_iter()
        .chain(untagged)
        .map(|(_, body)| body)
        .chain(std::iter::once(text))
        .flat_map(json_values)
}

fn json_values(text: &str) -> Box<dyn Iterator<Item = Value> + '_> {
    let trimmed = text.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Box::new(std::iter::once(value)),
        _ => Box::new(
            trimmed
                .char_indices()
                .filter(|(_, ch)| matches!(ch, '{' | '['))
                .filter_map(move |(start, _)| {
                    let len = balanced_len(&trimmed[start..])?;
                    serde_json::from_str::<Value>(&trimmed[start..start + len]).ok()
                }),
        ),
    }
}

fn has_day_objects(candidate: &Value) -> bool {
    candidate
        .get("days")
        .and_then(Value::as_array)
        .is_some_and(|days| days.iter().any(Value::is_object))
}

/// `(language tag, body)` for every fenced block, terminated or not.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    text.split(FENCE)
        .skip(1)
        .step_by(2)
        .map(|chunk| match chunk.split_once('\n') {
            Some((first, rest)) if !first.trim_start().starts_with(['{', '[']) => {
                (first.trim(), rest)
            }
            _ => ("", chunk),
        })
        .collect()
}

/// Byte length of the balanced bracket span at the start of `text`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(ch) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn unwrap_itinerary(value: Value) -> Value {
    match value {
        Value::Array(days) => json!({ "days": days }),
        Value::Object(mut map) if !map.contains_key("days") && map.contains_key("itinerary") => {
            match map.remove("itinerary") {
                Some(inner @ (Value::Object(_) | Value::Array(_))) => unwrap_itinerary(inner),
                Some(other) => {
                    map.insert("itinerary".to_string(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

fn normalize(itinerary: &mut Itinerary) {
    for day in &mut itinerary.days {
        if let Some(title) = day.title.as_mut() {
            *title = collapse_whitespace(title);
        }
        for activity in &mut day.activities {
            activity.location = collapse_whitespace(&activity.location);
            activity.description = collapse_whitespace(&activity.description);
        }
    }
    if let Some(currency) = itinerary.currency.as_mut() {
        *currency = currency.trim().to_ascii_uppercase();
    }
    if let Some(notes) = itinerary.notes.as_mut() {
        *notes = notes.trim().to_string();
    }
}
