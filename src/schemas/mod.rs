pub mod schema;
pub mod validation;
pub mod validator;

pub use schema::{SchemaHandle, StructuredOutput};
pub use validation::validate_itinerary;
pub use validator::validate_request;
