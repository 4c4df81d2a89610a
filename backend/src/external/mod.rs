//! External API integrations

pub mod gemini;
pub mod web_search;

pub use gemini::{ChatMessage, GeminiClient};
pub use web_search::WebSearchClient;
