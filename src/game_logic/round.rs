use rand::Rng;
use serde::Serialize;

use super::lifelines::{self, Lifeline, LifelineOutcome, Lifelines};
use super::shuffle::{self, ShuffledOptions};
use super::{QuestionHistory, QuestionLoader, QuestionRecord, QuizError, Theme};
use crate::leaderboard::HighScoreEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    InProgress,
    Completed,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct ActiveQuestion {
    pub record: QuestionRecord,
    pub shuffled: ShuffledOptions,
    /// What the player currently sees: all shuffled options, or two after 50-50.
    pub displayed: Vec<String>,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub score: u32,
    pub question_index: usize,
    pub round_complete: bool,
}

/// A single player's run through one theme.
#[derive(Debug, Clone)]
pub struct RoundState {
    player_name: String,
    theme: Theme,
    question_index: usize,
    score: u32,
    current: Option<ActiveQuestion>,
    lifelines: Lifelines,
    history: QuestionHistory,
    phase: RoundPhase,
    total_questions: usize,
}

impl RoundState {
    pub fn new(player_name: impl Into<String>, theme: Theme, total_questions: usize) -> Self {
        Self {
            player_name: player_name.into(),
            theme,
            question_index: 0,
            score: 0,
            current: None,
            lifelines: Lifelines::new(),
            history: QuestionHistory::new(),
            phase: RoundPhase::InProgress,
            total_questions: total_questions.max(1),
        }
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn current(&self) -> Option<&ActiveQuestion> {
        self.current.as_ref()
    }

    pub fn lifelines(&self) -> &Lifelines {
        &self.lifelines
    }

    pub fn history(&self) -> &QuestionHistory {
        &self.history
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase != RoundPhase::InProgress
    }

    pub fn is_complete(&self) -> bool {
        self.phase == RoundPhase::Completed
    }

    pub fn needs_question(&self) -> bool {
        !self.is_over() && self.current.is_none()
    }

    pub fn install_question<R: Rng + ?Sized>(&mut self, record: QuestionRecord, rng: &mut R) {
        let shuffled = shuffle::shuffle(&record, rng);
        let displayed = shuffled.options.clone();
        self.current = Some(ActiveQuestion {
            record,
            shuffled,
            displayed,
            hint: None,
        });
    }

    /// Loads a question through `loader` if none is active.
    pub async fn ensure_question<R>(
        &mut self,
        loader: &QuestionLoader,
        rng: &mut R,
    ) -> Result<(), QuizError>
    where
        R: Rng + Send + ?Sized,
    {
        if self.is_over() {
            return Err(QuizError::RoundOver);
        }
        if self.current.is_some() {
            return Ok(());
        }

        let record = loader
            .load_question(self.theme, &mut self.history, rng)
            .await?;
        self.install_question(record, rng);
        Ok(())
    }

    /// Text of the displayed option with the given 1-based number.
    pub fn displayed_option(&self, number: usize) -> Option<&str> {
        let current = self.current.as_ref()?;
        number
            .checked_sub(1)
            .and_then(|i| current.displayed.get(i))
            .map(String::as_str)
    }

    pub fn use_lifeline<R: Rng + ?Sized>(
        &mut self,
        lifeline: Lifeline,
        rng: &mut R,
    ) -> LifelineOutcome {
        if self.is_over() {
            return LifelineOutcome::RoundOver;
        }
        if !self.lifelines.is_available(lifeline) {
            return LifelineOutcome::AlreadyUsed { lifeline };
        }
        let Some(current) = self.current.as_mut() else {
            return LifelineOutcome::NoActiveQuestion;
        };

        self.lifelines.consume(lifeline);
        match lifeline {
            Lifeline::FiftyFifty => {
                current.displayed = lifelines::fifty_fifty(&current.shuffled, rng);
                LifelineOutcome::FiftyFifty {
                    displayed: current.displayed.clone(),
                }
            }
            Lifeline::Hint => {
                let hint = lifelines::hint_prefix(current.record.explanation.as_deref());
                current.hint = Some(hint.clone());
                LifelineOutcome::Hint { hint }
            }
            Lifeline::Skip => {
                self.advance();
                LifelineOutcome::Skipped {
                    question_index: self.question_index,
                    round_complete: self.is_complete(),
                }
            }
        }
    }

    /// Scores `choice` by text against the correct option.
    pub fn submit_answer(&mut self, choice: &str) -> Result<AnswerOutcome, QuizError> {
        if self.is_over() {
            return Err(QuizError::RoundOver);
        }
        let Some(current) = self.current.as_ref() else {
            return Err(QuizError::NoActiveQuestion);
        };

        let correct_answer = current.shuffled.correct_text().to_string();
        let explanation = current.record.explanation.clone();
        let correct = choice.trim() == correct_answer;
        if correct {
            self.score += 1;
        }

        self.advance();
        tracing::debug!(
            theme = %self.theme,
            question.index = self.question_index,
            correct,
            score = self.score,
            "Answer submitted"
        );

        Ok(AnswerOutcome {
            correct,
            correct_answer,
            explanation,
            score: self.score,
            question_index: self.question_index,
            round_complete: self.is_complete(),
        })
    }

    /// Ends the round because the answer deadline passed. Nothing more is scored.
    pub fn time_out(&mut self) {
        if self.phase == RoundPhase::InProgress {
            self.phase = RoundPhase::TimedOut;
            self.current = None;
        }
    }

    /// The entry to persist, only for a round that ran to completion.
    pub fn high_score_entry(&self) -> Option<HighScoreEntry> {
        self.is_complete().then(|| HighScoreEntry {
            player_name: self.player_name.clone(),
            score: self.score,
        })
    }

    fn advance(&mut self) {
        self.current = None;
        self.question_index += 1;
        if self.question_index >= self.total_questions {
            self.phase = RoundPhase::Completed;
        }
    }
}
