use crate::{
    error::{PlannerError, Result},
    schemas::{SchemaHandle, StructuredOutput},
    types::itinerary::Itinerary,
};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::debug;

const MAX_SCHEMA_ERRORS: usize = 3;

/// Validate a structured payload against a schema
pub(crate) fn validate_structured_payload(schema: &SchemaHandle, payload: &Value) -> Result<()> {
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            PlannerError::Schema(format!(
                "failed to prepare `{}` schema for validation: {}",
                schema.schema_name(),
                err
            ))
        })?;

    if let Err(errors) = validator.validate(payload) {
        let mut details = Vec::new();
        let mut truncated = false;

        for (idx, error) in errors.enumerate() {
            if idx == MAX_SCHEMA_ERRORS {
                truncated = true;
                break;
            }
            let mut path = error.instance_path.to_string();
            if path.is_empty() {
                path = "<root>".to_string();
            }
            details.push(format!("{}: {}", path, error));
        }

        let mut detail_str = if details.is_empty() {
            "payload failed schema validation".to_string()
        } else {
            details.join("; ")
        };

        if truncated {
            detail_str.push_str("; additional errors truncated");
        }

        debug!(
            target: "nusatrip::schema",
            schema = schema.schema_name(),
            errors = %detail_str,
            "Structured payload rejected"
        );

        return Err(PlannerError::Schema(format!(
            "payload does not match `{}` schema: {}",
            schema.schema_name(),
            detail_str
        )));
    }

    Ok(())
}

/// Deserialize a payload into `T`, reporting the JSON path of the first mismatch.
pub(crate) fn deserialize_structured<T: StructuredOutput>(payload: &Value) -> Result<T> {
    serde_path_to_error::deserialize(payload).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        PlannerError::Schema(format!(
            "failed to deserialize `{}` at {}: {}",
            T::schema().schema_name(),
            location,
            err.inner()
        ))
    })
}

/// Structural check of a candidate itinerary before any semantic reconciliation.
///
/// Verifies required fields, types and non-empty day/activity lists, then
/// converts the JSON into an [`Itinerary`].
pub fn validate_itinerary(candidate: &Value) -> Result<Itinerary> {
    if !candidate.is_object() {
        return Err(PlannerError::Schema(format!(
            "itinerary must be a JSON object, got {}",
            json_kind(candidate)
        )));
    }

    validate_structured_payload(Itinerary::schema(), candidate)?;
    let itinerary: Itinerary = deserialize_structured(candidate)?;

    if itinerary.days.is_empty() {
        return Err(PlannerError::Schema("itinerary has no days".to_string()));
    }
    if let Some(idx) = itinerary
        .days
        .iter()
        .position(|day| day.activities.is_empty())
    {
        return Err(PlannerError::Schema(format!(
            "/days/{idx}/activities must not be empty"
        )));
    }

    Ok(itinerary)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
