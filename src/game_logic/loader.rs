use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use super::parser::{self, ParsedQuestion};
use super::{
    AnswerOracle, OPTIONS_PER_QUESTION, QuestionHistory, QuestionRecord, QuestionSource, QuizError,
    Theme,
};
use crate::llm::LlmError;

const DEFAULT_ATTEMPTS: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns Question Source and Answer Oracle replies into a `QuestionRecord`.
#[derive(Clone)]
pub struct QuestionLoader {
    source: Arc<dyn QuestionSource>,
    oracle: Arc<dyn AnswerOracle>,
    attempts: u32,
    backoff: Duration,
    call_timeout: Duration,
}

impl QuestionLoader {
    pub fn new(source: Arc<dyn QuestionSource>, oracle: Arc<dyn AnswerOracle>) -> Self {
        Self {
            source,
            oracle,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[tracing::instrument(skip(self, history, rng), fields(theme = %theme))]
    pub async fn load_question<R>(
        &self,
        theme: Theme,
        history: &mut QuestionHistory,
        rng: &mut R,
    ) -> Result<QuestionRecord, QuizError>
    where
        R: Rng + Send + ?Sized,
    {
        let (raw, parsed) = self.fetch_with_retry(theme, history.for_theme(theme)).await?;
        history.record(theme, parsed.question_text.clone());

        let correct_option = self.resolve_correct_option(&raw, rng).await;
        tracing::debug!(correct_option, "Question loaded");

        Ok(QuestionRecord {
            question_text: parsed.question_text,
            options: parsed.options,
            correct_option,
            explanation: parsed.explanation,
        })
    }

    async fn fetch_with_retry(
        &self,
        theme: Theme,
        exclude: &[String],
    ) -> Result<(String, ParsedQuestion), QuizError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(theme, exclude).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(attempt, error = %e, "Question source attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Question source failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        theme: Theme,
        exclude: &[String],
    ) -> Result<(String, ParsedQuestion), QuizError> {
        let raw = tokio::time::timeout(
            self.call_timeout,
            self.source.generate_question(theme, exclude),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.call_timeout))??;

        let parsed = parser::parse_question_block(&raw)?;
        Ok((raw, parsed))
    }

    /// Asks the oracle for the correct option. Any failure falls back to a
    /// uniformly random option so a bad reply never blocks the round.
    async fn resolve_correct_option<R>(&self, raw: &str, rng: &mut R) -> u8
    where
        R: Rng + Send + ?Sized,
    {
        let reply = tokio::time::timeout(self.call_timeout, self.oracle.answer(raw)).await;
        let reason = match reply {
            Ok(Ok(text)) => match parser::extract_option_number(&text) {
                Some(option) => return option,
                None => format!("no option number in reply {:?}", text),
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.call_timeout),
        };

        let guess = rng.gen_range(1..=OPTIONS_PER_QUESTION as u8);
        tracing::warn!(
            reason = %reason,
            fallback_option = guess,
            "Answer oracle unusable, guessing the correct option"
        );
        guess
    }
}
