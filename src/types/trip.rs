use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Longest trip the planner accepts, in days.
pub const MAX_TRIP_DAYS: u32 = 60;

/// Travel party shape, as offered by the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelStyle {
    #[serde(rename = "Solo traveler")]
    Solo,
    #[serde(rename = "Romantic couple")]
    Couple,
    #[serde(rename = "Family with children")]
    Family,
    #[serde(rename = "Backpacker")]
    Backpacker,
    #[serde(rename = "Luxury traveler")]
    Luxury,
}

impl TravelStyle {
    pub const ALL: [TravelStyle; 5] = [
        TravelStyle::Solo,
        TravelStyle::Couple,
        TravelStyle::Family,
        TravelStyle::Backpacker,
        TravelStyle::Luxury,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TravelStyle::Solo => "Solo traveler",
            TravelStyle::Couple => "Romantic couple",
            TravelStyle::Family => "Family with children",
            TravelStyle::Backpacker => "Backpacker",
            TravelStyle::Luxury => "Luxury traveler",
        }
    }
}

impl fmt::Display for TravelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TravelStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let options: Vec<&str> = Self::ALL.iter().map(|style| style.label()).collect();
                format!("must be one of: {}", options.join(", "))
            })
    }
}

/// How packed each day should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityIntensity {
    Relaxed,
    Balanced,
    Full,
}

impl ActivityIntensity {
    pub const ALL: [ActivityIntensity; 3] = [
        ActivityIntensity::Relaxed,
        ActivityIntensity::Balanced,
        ActivityIntensity::Full,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActivityIntensity::Relaxed => "Relaxed",
            ActivityIntensity::Balanced => "Balanced",
            ActivityIntensity::Full => "Full",
        }
    }
}

impl fmt::Display for ActivityIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActivityIntensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| "must be one of: Relaxed, Balanced, Full".to_string())
    }
}

/// When the trip happens: a concrete date range, or only a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripDates {
    Range { start: NaiveDate, end: NaiveDate },
    Duration { days: u32 },
}

impl TripDates {
    /// Number of calendar days covered, both ends inclusive.
    pub fn day_count(&self) -> u32 {
        match self {
            TripDates::Range { start, end } => {
                u32::try_from((*end - *start).num_days() + 1).unwrap_or(0)
            }
            TripDates::Duration { days } => *days,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            TripDates::Range { start, .. } => Some(*start),
            TripDates::Duration { .. } => None,
        }
    }

    /// Calendar date of the 1-based `day`, when the trip has concrete dates.
    pub fn date_of_day(&self, day: u32) -> Option<NaiveDate> {
        let start = self.start()?;
        let offset = i64::from(day.checked_sub(1)?);
        start.checked_add_signed(Duration::days(offset))
    }
}

/// A validated trip request. Only `validate_request` constructs one, so the
/// date, budget and traveler invariants always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub(crate) destinations: Vec<String>,
    pub(crate) dates: TripDates,
    pub(crate) travelers: u32,
    pub(crate) budget: f64,
    pub(crate) currency: String,
    pub(crate) preferences: BTreeSet<String>,
    pub(crate) travel_style: Option<TravelStyle>,
    pub(crate) intensity: Option<ActivityIntensity>,
    pub(crate) notes: Option<String>,
}

impl TripRequest {
    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn dates(&self) -> &TripDates {
        &self.dates
    }

    pub fn day_count(&self) -> u32 {
        self.dates.day_count()
    }

    pub fn travelers(&self) -> u32 {
        self.travelers
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn preferences(&self) -> &BTreeSet<String> {
        &self.preferences
    }

    pub fn travel_style(&self) -> Option<TravelStyle> {
        self.travel_style
    }

    pub fn intensity(&self) -> Option<ActivityIntensity> {
        self.intensity
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Destinations joined for display, e.g. "Bali, Lombok".
    pub fn destination_label(&self) -> String {
        self.destinations.join(", ")
    }

    /// SHA-256 of the canonical JSON form; identical content gives identical keys.
    pub fn content_hash(&self) -> String {
        // Field order is fixed by the struct and preferences are a BTreeSet,
        // so the serialization is canonical.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}
