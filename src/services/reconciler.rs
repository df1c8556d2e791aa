use crate::{
    error::{Diagnostic, PlannerError, Result},
    types::{
        itinerary::{Itinerary, MINUTES_PER_DAY},
        trip::TripRequest,
    },
};

// Absorbs float noise from summing many fractional costs.
const COST_EPSILON: f64 = 1e-6;

/// Check a parsed itinerary against the request it was generated for.
///
/// Nothing is corrected: every violation found is reported as a
/// [`Diagnostic`] inside one `ConstraintViolation`.
pub fn reconcile(
    itinerary: Itinerary,
    request: &TripRequest,
    overrun_tolerance: f64,
) -> Result<Itinerary> {
    let diagnostics = diagnose(&itinerary, request, overrun_tolerance);
    if diagnostics.is_empty() {
        Ok(itinerary)
    } else {
        Err(PlannerError::ConstraintViolation(diagnostics))
    }
}

/// All constraint violations of `itinerary`, in document order.
pub fn diagnose(
    itinerary: &Itinerary,
    request: &TripRequest,
    overrun_tolerance: f64,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let expected_days = request.day_count() as usize;
    if itinerary.day_count() != expected_days {
        diagnostics.push(Diagnostic::new(
            "days",
            format!("{} day(s)", expected_days),
            format!("{} day(s)", itinerary.day_count()),
        ));
    }

    for (idx, day) in itinerary.days.iter().enumerate() {
        let position = idx as u32 + 1;
        let prefix = format!("days[{idx}]");

        if day.day != position {
            diagnostics.push(Diagnostic::new(
                format!("{prefix}.day"),
                position.to_string(),
                day.day.to_string(),
            ));
        }

        if let (Some(actual), Some(expected)) = (day.date, request.dates().date_of_day(position)) {
            if actual != expected {
                diagnostics.push(Diagnostic::new(
                    format!("{prefix}.date"),
                    expected.to_string(),
                    actual.to_string(),
                ));
            }
        }

        let mut previous_end = None;
        for (act_idx, activity) in day.activities.iter().enumerate() {
            let field = format!("{prefix}.activities[{act_idx}]");

            if activity.end <= activity.start {
                diagnostics.push(Diagnostic::new(
                    format!("{field}.end"),
                    format!("after {}", activity.start),
                    activity.end.to_string(),
                ));
            }

            if let Some(previous_end) = previous_end {
                if activity.start < previous_end {
                    diagnostics.push(Diagnostic::new(
                        format!("{field}.start"),
                        format!("at or after {} (previous activity end)", previous_end),
                        activity.start.to_string(),
                    ));
                }
            }
            previous_end = Some(previous_end.map_or(activity.end, |end| activity.end.max(end)));

            if activity.location.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    format!("{field}.location"),
                    "a named place",
                    "blank",
                ));
            }
        }

        let scheduled = day.scheduled_minutes();
        if scheduled > u32::from(MINUTES_PER_DAY) {
            diagnostics.push(Diagnostic::new(
                format!("{prefix}.activities"),
                format!("at most {} scheduled minutes", MINUTES_PER_DAY),
                format!("{} minutes", scheduled),
            ));
        }
    }

    if let Some(currency) = itinerary.currency.as_deref() {
        if !currency.eq_ignore_ascii_case(request.currency()) {
            diagnostics.push(Diagnostic::new(
                "currency",
                request.currency(),
                currency,
            ));
        }
    }

    let limit = request.budget() * (1.0 + overrun_tolerance.max(0.0));
    let total = itinerary.total_cost();
    if total > limit + COST_EPSILON {
        diagnostics.push(Diagnostic::new(
            "total_cost",
            format!(
                "at most {:.2} {} (budget {:.2} + {:.0}% tolerance)",
                limit,
                request.currency(),
                request.budget(),
                overrun_tolerance * 100.0
            ),
            format!("{:.2} {}", total, request.currency()),
        ));
    }

    diagnostics
}
