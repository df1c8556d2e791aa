use std::sync::Arc;

use schemars::schema::RootSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON schema of a structured model output, built once per type.
///
/// The same value is embedded in the prompt, sent as the provider's
/// response schema and used to validate what comes back.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    name: &'static str,
    json: Arc<Value>,
}

impl SchemaHandle {
    /// Stamp `name` and `description` onto `root` unless schemars already set them.
    pub fn new(name: &'static str, description: Option<&'static str>, mut root: RootSchema) -> Self {
        let metadata = root.schema.metadata();
        metadata.title.get_or_insert_with(|| name.to_string());
        if let Some(description) = description {
            metadata
                .description
                .get_or_insert_with(|| description.to_string());
        }

        // RootSchema is plain data; serializing it cannot fail.
        let json = serde_json::to_value(root).unwrap_or(Value::Null);

        Self {
            name,
            json: Arc::new(json),
        }
    }

    pub fn schema_name(&self) -> &'static str {
        self.name
    }

    pub fn schema_json(&self) -> &Value {
        self.json.as_ref()
    }

    pub fn schema_json_arc(&self) -> Arc<Value> {
        Arc::clone(&self.json)
    }

    /// Pretty-printed schema for the output-format section of a prompt.
    pub fn prompt_text(&self) -> String {
        serde_json::to_string_pretty(self.json.as_ref()).unwrap_or_else(|_| self.json.to_string())
    }
}

/// A type the model is asked to produce as JSON.
///
/// Implemented by `#[structured_output]`.
pub trait StructuredOutput: DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static SchemaHandle;
}
