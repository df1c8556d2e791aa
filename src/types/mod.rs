pub mod attempt;
pub mod itinerary;
pub mod prompt;
pub mod response;
pub mod result;
pub mod trip;

pub use attempt::{AttemptOutcome, GenerationAttempt};
pub use itinerary::{Activity, ClockTime, DayPlan, Itinerary};
pub use prompt::PromptPayload;
pub use response::{ParseOutcome, RawModelResponse, TokenUsage};
pub use result::SynthesisReport;
pub use trip::{ActivityIntensity, TravelStyle, TripDates, TripRequest};
