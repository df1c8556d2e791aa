//! nusatrip-ai: turns validated trip requests into reconciled day-by-day itineraries
//!
//! A request is validated, compiled into a prompt, sent to a generative model
//! through a retrying client, and the answer is parsed and checked against the
//! request (day count, schedule, budget) before it is handed back. Failed
//! attempts are re-dispatched with the previous diagnostics in the prompt.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nusatrip_ai::{RequestContext, TripPlanner};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let planner = TripPlanner::from_env()?;
//!
//!     let request = json!({
//!         "travel_destination": "Bali",
//!         "start_date": "2025-07-01",
//!         "end_date": "2025-07-03",
//!         "travel_budget": 3000000,
//!         "activity_preferences": ["beaches", "food"]
//!     });
//!
//!     let itinerary = planner
//!         .synthesize_within(&request, &RequestContext::new(), Duration::from_secs(90))
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&itinerary)?);
//!     Ok(())
//! }
//! ```

extern crate self as nusatrip_ai;

pub mod config;
pub mod core;
pub mod error;
pub mod schemas;
pub mod services;
pub mod types;

pub use config::{GeminiConfig, PlannerConfig, RetryPolicy, SynthesisConfig};
pub use core::{RequestContext, SynthesisState, TripPlanner};
pub use error::{Diagnostic, FieldError, PlannerError, Result};
pub use nusatrip_macros::structured_output;
pub use schemas::{SchemaHandle, StructuredOutput};
pub use services::{AiClient, GeminiClient, ModelProvider};
pub use types::{
    Activity, AttemptOutcome, ClockTime, DayPlan, GenerationAttempt, Itinerary, ParseOutcome,
    PromptPayload, RawModelResponse, SynthesisReport, TokenUsage, TravelStyle, TripDates,
    TripRequest,
};

pub use schemas as schema;
pub use schemas::validator;
pub use services::{parser, prompt_compiler, reconciler};

#[cfg(feature = "cli")]
pub mod cli;
