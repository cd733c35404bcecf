use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Chat completion API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Chat completion returned no choices")]
    EmptyCompletion,
    #[error("Language model call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T, E = LlmError> = std::result::Result<T, E>;
