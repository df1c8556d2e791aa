mod schema_extraction;
mod structured_output;

use proc_macro::TokenStream;

/// Marks a struct as a structured model output.
///
/// Generates a `nusatrip_ai::schema::StructuredOutput` impl whose schema
/// handle is built once from `schemars::schema_for!` and titled after the
/// struct (or the `name = "..."` argument). The struct doc comment, or the
/// `description = "..."` argument, becomes the schema description.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// #[structured_output(name = "Itinerary")]
/// /// Day-by-day travel plan.
/// pub struct Itinerary { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn structured_output(attr: TokenStream, item: TokenStream) -> TokenStream {
    structured_output::structured_output(attr, item)
}
