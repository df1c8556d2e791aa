use std::fmt;

use chrono::NaiveDate;
use schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject, StringValidation},
    JsonSchema,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::structured_output;

/// Minutes in a day; also the largest valid clock time (`24:00`).
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock time within a day, written `HH:MM`. `24:00` marks end of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        (minute < 60 && total <= MINUTES_PER_DAY).then_some(Self(total))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (hour, minute) = text.trim().split_once(':')?;
        if minute.len() != 2 || hour.is_empty() || hour.len() > 2 {
            return None;
        }
        Self::from_hm(hour.parse().ok()?, minute.parse().ok()?)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw).ok_or_else(|| {
            de::Error::custom(format!("invalid clock time `{raw}`, expected HH:MM"))
        })
    }
}

impl JsonSchema for ClockTime {
    fn schema_name() -> String {
        "ClockTime".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            string: Some(Box::new(StringValidation {
                pattern: Some(r"^\s*([01]?[0-9]|2[0-3]):[0-5][0-9]\s*$|^\s*24:00\s*$".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        schema.metadata().description = Some("24-hour clock time, HH:MM".to_string());
        schema.into()
    }
}

/// One scheduled item of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    /// Start of the time window (HH:MM)
    pub start: ClockTime,
    /// End of the time window (HH:MM), after `start`
    pub end: ClockTime,
    /// Place name or address where the activity happens
    pub location: String,
    /// What the traveler does and why it fits their preferences
    pub description: String,
    /// Estimated cost for the whole party in the trip currency
    #[schemars(range(min = 0))]
    pub estimated_cost: f64,
}

impl Activity {
    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

/// Activities planned for one day of the trip, in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DayPlan {
    /// 1-based day counter within the itinerary
    pub day: u32,
    /// Calendar date of this day (YYYY-MM-DD), when the trip has fixed dates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Short theme for the day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Scheduled activities ordered by start time
    #[schemars(length(min = 1))]
    pub activities: Vec<Activity>,
}

impl DayPlan {
    pub fn total_cost(&self) -> f64 {
        self.activities.iter().map(|a| a.estimated_cost).sum()
    }

    pub fn scheduled_minutes(&self) -> u32 {
        self.activities
            .iter()
            .map(|a| u32::from(a.duration_minutes()))
            .sum()
    }
}

/// Day-by-day travel itinerary produced for a trip request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[structured_output(name = "Itinerary")]
pub struct Itinerary {
    /// One entry per trip day, in order
    #[schemars(length(min = 1))]
    pub days: Vec<DayPlan>,
    /// Currency code used for every estimated cost (e.g. "IDR")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Practical tips, booking advice or alternatives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Itinerary {
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn total_cost(&self) -> f64 {
        self.days.iter().map(DayPlan::total_cost).sum()
    }

    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|day| day.activities.len()).sum()
    }
}
