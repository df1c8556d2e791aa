use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{FieldError, PlannerError, Result},
    types::trip::{ActivityIntensity, TravelStyle, TripDates, TripRequest, MAX_TRIP_DAYS},
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_CURRENCY: &str = "IDR";
const MAX_NOTES_CHARS: usize = 2000;

/// A single destination or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Destinations {
    One(String),
    Many(Vec<String>),
}

/// Wire shape of a trip request as the HTTP layer hands it over.
#[derive(Debug, Deserialize)]
struct TripRequestInput {
    #[serde(default, alias = "travel_destination", alias = "destination")]
    destinations: Option<Destinations>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    trip_duration: Option<i64>,
    #[serde(default, alias = "traveler_count")]
    travelers: Option<i64>,
    #[serde(default, alias = "travel_budget")]
    budget: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, alias = "activity_preferences")]
    preferences: Option<Vec<String>>,
    #[serde(default)]
    travel_style: Option<String>,
    #[serde(default)]
    activity_intensity: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Validate and normalize a raw trip request.
///
/// Type mismatches fail fast with the offending JSON path; every semantic
/// problem is collected so the caller sees all of them at once.
pub fn validate_request(raw: &Value) -> Result<TripRequest> {
    if !raw.is_object() {
        return Err(PlannerError::validation(
            "<root>",
            "request body must be a JSON object",
        ));
    }

    let input: TripRequestInput = serde_path_to_error::deserialize(raw).map_err(|err| {
        let path = err.path().to_string();
        PlannerError::validation(
            if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            },
            err.inner().to_string(),
        )
    })?;

    let mut errors = Vec::new();

    let destinations = normalize_destinations(input.destinations, &mut errors);
    let dates = resolve_dates(
        input.start_date.as_deref(),
        input.end_date.as_deref(),
        input.trip_duration,
        &mut errors,
    );

    let travelers = match input.travelers {
        None => 1,
        Some(count) if count >= 1 => u32::try_from(count).unwrap_or(u32::MAX),
        Some(_) => {
            errors.push(FieldError::new("travelers", "must be at least 1"));
            1
        }
    };

    let budget = match input.budget {
        None => {
            errors.push(FieldError::new("travel_budget", "is required"));
            0.0
        }
        Some(value) if !value.is_finite() => {
            errors.push(FieldError::new("travel_budget", "must be a finite number"));
            0.0
        }
        Some(value) if value < 0.0 => {
            errors.push(FieldError::new("travel_budget", "must be >= 0"));
            0.0
        }
        Some(value) => value,
    };

    let currency = match input.currency.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CURRENCY.to_string(),
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            code.to_ascii_uppercase()
        }
        Some(_) => {
            errors.push(FieldError::new("currency", "must be a 3-letter currency code"));
            DEFAULT_CURRENCY.to_string()
        }
    };

    let preferences: BTreeSet<String> = input
        .preferences
        .unwrap_or_default()
        .into_iter()
        .map(|tag| collapse_whitespace(&tag))
        .filter(|tag| !tag.is_empty())
        .collect();
    if preferences.is_empty() {
        errors.push(FieldError::new(
            "activity_preferences",
            "at least one preference is required",
        ));
    }

    let travel_style = parse_choice::<TravelStyle>(
        "travel_style",
        input.travel_style.as_deref(),
        &mut errors,
    );
    let intensity = parse_choice::<ActivityIntensity>(
        "activity_intensity",
        input.activity_intensity.as_deref(),
        &mut errors,
    );

    let notes = input
        .notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    if notes
        .as_ref()
        .is_some_and(|text| text.chars().count() > MAX_NOTES_CHARS)
    {
        errors.push(FieldError::new(
            "notes",
            format!("must be at most {MAX_NOTES_CHARS} characters"),
        ));
    }

    match dates {
        Some(dates) if errors.is_empty() => Ok(TripRequest {
            destinations,
            dates,
            travelers,
            budget,
            currency,
            preferences,
            travel_style,
            intensity,
            notes,
        }),
        _ => Err(PlannerError::Validation(errors)),
    }
}

fn normalize_destinations(input: Option<Destinations>, errors: &mut Vec<FieldError>) -> Vec<String> {
    let names = match input {
        None => Vec::new(),
        Some(Destinations::One(name)) => vec![name],
        Some(Destinations::Many(names)) => names,
    };

    let mut seen = BTreeSet::new();
    let destinations: Vec<String> = names
        .iter()
        .map(|name| collapse_whitespace(name))
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect();

    if destinations.is_empty() {
        errors.push(FieldError::new(
            "travel_destination",
            "at least one destination is required",
        ));
    }
    destinations
}

fn resolve_dates(
    start: Option<&str>,
    end: Option<&str>,
    duration: Option<i64>,
    errors: &mut Vec<FieldError>,
) -> Option<TripDates> {
    let start = parse_date("start_date", start, errors);
    let end = parse_date("end_date", end, errors);

    let dates = match (start, end, duration) {
        (Some(start), Some(end), _) => {
            if start > end {
                errors.push(FieldError::new("end_date", "cannot be before start_date"));
                return None;
            }
            TripDates::Range { start, end }
        }
        (_, _, Some(days)) if days >= 1 => TripDates::Duration {
            days: u32::try_from(days).unwrap_or(u32::MAX),
        },
        (_, _, Some(_)) => {
            errors.push(FieldError::new("trip_duration", "must be at least 1"));
            return None;
        }
        _ => {
            errors.push(FieldError::new(
                "trip_duration",
                "provide 'start_date'/'end_date' or 'trip_duration'",
            ));
            return None;
        }
    };

    if dates.day_count() > MAX_TRIP_DAYS {
        errors.push(FieldError::new(
            "trip_duration",
            format!("trips longer than {MAX_TRIP_DAYS} days are not supported"),
        ));
        return None;
    }

    Some(dates)
}

fn parse_date(field: &str, raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|text| !text.is_empty())?;
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(FieldError::new(field, "must be a date in YYYY-MM-DD format"));
            None
        }
    }
}

fn parse_choice<T: std::str::FromStr<Err = String>>(
    field: &str,
    raw: Option<&str>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = raw.map(str::trim).filter(|text| !text.is_empty())?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            errors.push(FieldError::new(field, message));
            None
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bali() -> Value {
        json!({
            "travel_destination": "Bali",
            "start_date": "2025-07-01",
            "end_date": "2025-07-03",
            "travel_budget": 300,
            "activity_preferences": ["beaches", "food"]
        })
    }

    fn field_names(err: PlannerError) -> Vec<String> {
        match err {
            PlannerError::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request() {
        let request = validate_request(&bali()).unwrap();

        assert_eq!(request.destinations(), ["Bali".to_string()]);
        assert_eq!(request.day_count(), 3);
        assert_eq!(request.travelers(), 1);
        assert_eq!(request.currency(), "IDR");
        assert!((request.budget() - 300.0).abs() < f64::EPSILON);
        assert!(request.preferences().contains("food"));
    }

    #[test]
    fn test_duration_only_request() {
        let request = validate_request(&json!({
            "destinations": ["Yogyakarta", " yogyakarta ", "Solo"],
            "trip_duration": 4,
            "budget": 0,
            "preferences": ["  temples  ", "temples", "batik   workshops"],
            "travel_style": "backpacker",
            "activity_intensity": "Relaxed"
        }))
        .unwrap();

        assert_eq!(request.destinations().len(), 2);
        assert_eq!(request.dates(), &TripDates::Duration { days: 4 });
        assert_eq!(request.preferences().len(), 2);
        assert!(request.preferences().contains("batik workshops"));
        assert_eq!(request.travel_style(), Some(TravelStyle::Backpacker));
        assert_eq!(request.intensity(), Some(ActivityIntensity::Relaxed));
    }

    #[test]
    fn test_collects_all_field_errors() {
        let err = validate_request(&json!({
            "travel_destination": "  ",
            "start_date": "2025-07-05",
            "end_date": "2025-07-01",
            "travel_budget": -10,
            "activity_preferences": [],
            "travel_style": "Party animal"
        }))
        .unwrap_err();

        let fields = field_names(err);
        for expected in [
            "travel_destination",
            "end_date",
            "travel_budget",
            "activity_preferences",
            "travel_style",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_requires_dates_or_duration() {
        let mut raw = bali();
        raw.as_object_mut().unwrap().remove("start_date");
        raw.as_object_mut().unwrap().remove("end_date");

        assert_eq!(field_names(validate_request(&raw).unwrap_err()), ["trip_duration"]);
    }

    #[test]
    fn test_bad_date_format() {
        let mut raw = bali();
        raw["start_date"] = json!("07/01/2025");
        assert!(field_names(validate_request(&raw).unwrap_err()).contains(&"start_date".to_string()));
    }

    #[test]
    fn test_type_error_reports_path() {
        let mut raw = bali();
        raw["travel_budget"] = json!("lots");

        let err = validate_request(&raw).unwrap_err();
        assert_eq!(field_names(err), ["travel_budget"]);
    }

    #[test]
    fn test_trip_too_long() {
        let mut raw = bali();
        raw["end_date"] = json!("2025-12-31");
        assert!(validate_request(&raw).is_err());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(validate_request(&json!("Bali")).is_err());
    }

    #[test]
    fn test_single_day_trip() {
        let mut raw = bali();
        raw["end_date"] = json!("2025-07-01");
        assert_eq!(validate_request(&raw).unwrap().day_count(), 1);
    }
}
