use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::llm::LlmError;

pub mod lifelines;
pub mod loader;
pub mod parser;
pub mod round;
pub mod shuffle;
pub mod timed;

pub use lifelines::{Lifeline, LifelineOutcome, LifelineState, Lifelines};
pub use loader::QuestionLoader;
pub use round::{ActiveQuestion, AnswerOutcome, RoundPhase, RoundState};

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const DEFAULT_QUESTIONS_PER_ROUND: usize = 5;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Malformed question source reply: {0}")]
    MalformedResponse(String),
    #[error("Question source failed: {0}")]
    Source(#[from] LlmError),
    #[error("No question is currently active")]
    NoActiveQuestion,
    #[error("The round is already over")]
    RoundOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    Science,
    Movies,
    Sports,
    History,
    Geography,
    Bollywood,
    #[serde(rename = "General Knowledge")]
    GeneralKnowledge,
    #[serde(rename = "IPL")]
    Ipl,
    #[serde(rename = "Chhatrapati Shivaji Maharaj")]
    ShivajiMaharaj,
    #[serde(rename = "Chhatrapati Sambhaji Maharaj")]
    SambhajiMaharaj,
}

impl Theme {
    pub fn all() -> Vec<Self> {
        vec![
            Theme::Science,
            Theme::Movies,
            Theme::Sports,
            Theme::History,
            Theme::Geography,
            Theme::Bollywood,
            Theme::GeneralKnowledge,
            Theme::Ipl,
            Theme::ShivajiMaharaj,
            Theme::SambhajiMaharaj,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Science => "Science",
            Theme::Movies => "Movies",
            Theme::Sports => "Sports",
            Theme::History => "History",
            Theme::Geography => "Geography",
            Theme::Bollywood => "Bollywood",
            Theme::GeneralKnowledge => "General Knowledge",
            Theme::Ipl => "IPL",
            Theme::ShivajiMaharaj => "Chhatrapati Shivaji Maharaj",
            Theme::SambhajiMaharaj => "Chhatrapati Sambhaji Maharaj",
        }
    }

    /// Resolves a 1-based menu number as printed by `Theme::all()`.
    pub fn from_menu_choice(input: &str) -> Option<Self> {
        let choice: usize = input.trim().parse().ok()?;
        if choice == 0 {
            return None;
        }
        Theme::all().get(choice - 1).copied()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Theme::all()
            .into_iter()
            .find(|theme| theme.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown theme '{}'", wanted))
    }
}

/// One generated question. `correct_option` is 1-based and always refers to
/// `options` in the order the source returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_text: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub correct_option: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionRecord {
    pub fn correct_position(&self) -> usize {
        usize::from(self.correct_option.clamp(1, OPTIONS_PER_QUESTION as u8)) - 1
    }

    pub fn correct_text(&self) -> &str {
        &self.options[self.correct_position()]
    }
}

/// Previously asked question texts per theme. Only a hint for the source, never
/// enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionHistory {
    asked: HashMap<Theme, Vec<String>>,
}

impl QuestionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_theme(&self, theme: Theme) -> &[String] {
        self.asked.get(&theme).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record(&mut self, theme: Theme, question_text: impl Into<String>) {
        self.asked
            .entry(theme)
            .or_default()
            .push(question_text.into());
    }
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Returns the raw text block for one question about `theme`.
    async fn generate_question(&self, theme: Theme, exclude: &[String])
    -> Result<String, LlmError>;
}

#[async_trait]
pub trait AnswerOracle: Send + Sync {
    /// Returns free text that should contain the correct option number.
    async fn answer(&self, question_block: &str) -> Result<String, LlmError>;
}
