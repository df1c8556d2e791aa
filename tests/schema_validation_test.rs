use nusatrip_ai::{
    parser, schema::validate_itinerary, validator::validate_request, Itinerary, PlannerError,
    RawModelResponse, StructuredOutput, TripDates,
};
use serde_json::json;

#[test]
fn test_itinerary_schema_has_correct_structure() {
    let schema = Itinerary::schema().schema_json();

    assert_eq!(schema["type"], "object");
    let props = schema["properties"].as_object().unwrap();
    assert!(props.contains_key("days"));
    assert!(props.contains_key("currency"));
    assert!(props.contains_key("notes"));

    let required = schema["required"].as_array().unwrap();
    assert!(required.iter().any(|v| v == "days"));
    assert!(!required.iter().any(|v| v == "notes"));

    // Nested types live in definitions
    let definitions = schema["definitions"].as_object().unwrap();
    assert!(definitions.contains_key("DayPlan"));
    assert!(definitions.contains_key("Activity"));
    assert_eq!(definitions["ClockTime"]["type"], "string");
}

#[test]
fn test_schema_rejects_missing_activity_fields() {
    let err = validate_itinerary(&json!({
        "days": [{ "day": 1, "activities": [{ "start": "09:00", "end": "10:00" }] }]
    }))
    .unwrap_err();

    assert!(matches!(err, PlannerError::Schema(_)));
    assert!(err.to_string().contains("Itinerary"));
}

#[test]
fn test_schema_accepts_optional_fields_missing() {
    let itinerary = validate_itinerary(&json!({
        "days": [{
            "day": 1,
            "activities": [{
                "start": "18:00",
                "end": "20:00",
                "location": "Jimbaran Bay",
                "description": "Seafood dinner on the beach",
                "estimated_cost": 35.5
            }]
        }]
    }))
    .unwrap();

    assert!(itinerary.currency.is_none());
    assert!(itinerary.days[0].date.is_none());
    assert!(itinerary.days[0].title.is_none());
}

#[test]
fn test_request_aliases_and_defaults() {
    let request = validate_request(&json!({
        "destination": ["Komodo", "Labuan Bajo"],
        "trip_duration": 2,
        "traveler_count": 4,
        "budget": 1500.5,
        "currency": "usd",
        "preferences": ["diving"],
        "activity_intensity": "full",
        "notes": "  Vegetarian meals please  "
    }))
    .unwrap();

    assert_eq!(request.destination_label(), "Komodo, Labuan Bajo");
    assert_eq!(request.dates(), &TripDates::Duration { days: 2 });
    assert_eq!(request.travelers(), 4);
    assert_eq!(request.currency(), "USD");
    assert_eq!(request.notes(), Some("Vegetarian meals please"));
}

#[test]
fn test_identical_requests_hash_identically() {
    let first = validate_request(&json!({
        "travel_destination": "Bali",
        "trip_duration": 3,
        "travel_budget": 300,
        "activity_preferences": ["food", "beaches"]
    }))
    .unwrap();
    let reordered = validate_request(&json!({
        "activity_preferences": ["beaches", "food", "food"],
        "travel_budget": 300,
        "trip_duration": 3,
        "travel_destination": "  Bali "
    }))
    .unwrap();

    assert_eq!(first.content_hash(), reordered.content_hash());
}

#[test]
fn test_parser_reports_schema_errors_from_model_output() {
    let raw = RawModelResponse::new(
        r#"Plan below:
{"days": [{"day": 1, "activities": [{"start": "25:00", "end": "26:00",
  "location": "Ubud", "description": "Night walk", "estimated_cost": 0}]}]}"#,
    );

    let err = parser::parse(&raw).unwrap_err();
    assert!(matches!(err, PlannerError::Schema(_)));
}
