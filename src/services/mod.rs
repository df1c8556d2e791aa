pub mod gemini_client;
pub mod parser;
pub mod prompt_compiler;
pub mod provider;
pub mod reconciler;
pub mod retry;

pub use gemini_client::GeminiClient;
pub use provider::ModelProvider;
pub use retry::AiClient;
