pub mod client;
pub mod error;
pub mod prompts;

pub use client::GroqClient;
pub use error::LlmError;
