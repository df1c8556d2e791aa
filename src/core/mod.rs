pub(crate) mod inflight;
pub(crate) mod orchestrator;
pub mod planner;
pub mod state;

pub use planner::{RequestContext, TripPlanner};
pub use state::SynthesisState;
