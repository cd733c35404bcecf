pub mod config;
pub mod console;
pub mod error;
pub mod game_logic;
pub mod leaderboard;
pub mod llm;
pub mod session;
pub mod state;
pub mod web;

use std::sync::Arc;

use crate::config::AppSettings;
use crate::error::Result as AppResult;
use crate::game_logic::QuestionLoader;
use crate::llm::GroqClient;

/// Question loader backed by the Groq client, tuned by `settings`.
pub fn build_question_loader(settings: &AppSettings) -> AppResult<QuestionLoader> {
    let client = Arc::new(GroqClient::from_config(&settings.groq)?);
    Ok(QuestionLoader::new(client.clone(), client)
        .with_attempts(settings.game.source_attempts)
        .with_backoff(settings.game.retry_backoff())
        .with_call_timeout(settings.groq.request_timeout()))
}
