mod gemini;
mod provider;
mod types;

pub use gemini::GeminiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
