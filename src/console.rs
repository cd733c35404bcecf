//! Console front end with a per-question countdown.
//!
//! Input lines arrive over an mpsc channel fed by a stdin reader task, and all
//! display output goes to one async writer.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::GameConfig;
use crate::error::Result as AppResult;
use crate::game_logic::timed::{Countdown, WaitEvent};
use crate::game_logic::{Lifeline, LifelineOutcome, QuestionLoader, RoundState, Theme};
use crate::leaderboard::LeaderboardStore;

const DEFAULT_PLAYER_NAME: &str = "Player";

#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub questions_per_round: usize,
    pub answer_time_limit: Duration,
    pub tick_every: Duration,
    pub prize_per_correct_answer: u64,
    pub default_theme: Theme,
}

impl ConsoleOptions {
    pub fn from_config(game: &GameConfig) -> Self {
        Self {
            questions_per_round: game.questions_per_round,
            answer_time_limit: game.answer_time_limit(),
            tick_every: Duration::from_secs(5),
            prize_per_correct_answer: game.prize_per_correct_answer,
            default_theme: game.default_theme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleRoundEnd {
    Completed { score: u32, winnings: u64 },
    TimedOut { score: u32, winnings: u64 },
    SourceFailed,
    InputClosed,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Answer(usize),
    Lifeline(Lifeline),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if let Ok(number) = line.parse::<usize>() {
        return Some(Command::Answer(number));
    }
    match line.to_ascii_lowercase().as_str() {
        "f" => Some(Command::Lifeline(Lifeline::FiftyFifty)),
        "s" => Some(Command::Lifeline(Lifeline::Skip)),
        "h" => Some(Command::Lifeline(Lifeline::Hint)),
        _ => None,
    }
}

pub struct ConsoleGame<W> {
    loader: QuestionLoader,
    leaderboard: Arc<LeaderboardStore>,
    options: ConsoleOptions,
    input: mpsc::Receiver<String>,
    out: W,
    rng: StdRng,
}

impl<W: AsyncWrite + Unpin + Send> ConsoleGame<W> {
    pub fn new(
        loader: QuestionLoader,
        leaderboard: Arc<LeaderboardStore>,
        options: ConsoleOptions,
        input: mpsc::Receiver<String>,
        out: W,
    ) -> Self {
        Self {
            loader,
            leaderboard,
            options,
            input,
            out,
            rng: StdRng::from_entropy(),
        }
    }

    async fn say(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    async fn read_line(&mut self) -> Option<String> {
        self.input.recv().await.map(|line| line.trim().to_string())
    }

    /// Drops lines already queued behind the deadline so they never answer a
    /// later prompt.
    fn discard_pending_input(&mut self) -> usize {
        let mut discarded = 0;
        while self.input.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Runs games until the player declines another one or input closes.
    pub async fn run(mut self) -> AppResult<()> {
        self.say("🎉 Welcome to Who Wants to Be a Millionaire!").await?;
        self.say("Enter your name:").await?;
        let Some(name) = self.read_line().await else {
            return Ok(());
        };
        let player_name = if name.is_empty() {
            DEFAULT_PLAYER_NAME.to_string()
        } else {
            name
        };

        loop {
            let Some(theme) = self.choose_theme().await? else {
                return Ok(());
            };

            if self.play_round(&player_name, theme).await? == ConsoleRoundEnd::InputClosed {
                return Ok(());
            }

            self.say("Do you want to play again? (y/n)").await?;
            match self.read_line().await {
                Some(answer) if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") => {}
                _ => break,
            }
        }

        self.say("Thanks for playing!").await?;
        Ok(())
    }

    async fn choose_theme(&mut self) -> AppResult<Option<Theme>> {
        self.say("Choose a theme:").await?;
        for (i, theme) in Theme::all().iter().enumerate() {
            self.say(&format!("  {}. {}", i + 1, theme)).await?;
        }
        self.say(&format!("Enter a theme number (1-{}):", Theme::all().len()))
            .await?;

        let Some(choice) = self.read_line().await else {
            return Ok(None);
        };
        let theme = match Theme::from_menu_choice(&choice) {
            Some(theme) => theme,
            None => {
                let fallback = self.options.default_theme;
                self.say(&format!("Invalid choice, defaulting to {}.", fallback))
                    .await?;
                fallback
            }
        };
        self.say(&format!("Theme: {}", theme)).await?;
        Ok(Some(theme))
    }

    #[tracing::instrument(skip(self), fields(theme = %theme))]
    pub async fn play_round(&mut self, player_name: &str, theme: Theme) -> AppResult<ConsoleRoundEnd> {
        let mut round = RoundState::new(player_name, theme, self.options.questions_per_round);
        let mut winnings: u64 = 0;

        while !round.is_over() {
            if let Err(e) = round.ensure_question(&self.loader, &mut self.rng).await {
                tracing::error!(error = %e, "Could not load a question");
                self.say(&format!("⚠️ Could not load a question: {}", e)).await?;
                return Ok(ConsoleRoundEnd::SourceFailed);
            }
            self.render_question(&round, winnings).await?;

            let mut countdown = Countdown::start(self.options.answer_time_limit, self.options.tick_every);
            loop {
                match countdown.next_event(&mut self.input).await {
                    WaitEvent::Expired => {
                        round.time_out();
                        let discarded = self.discard_pending_input();
                        if discarded > 0 {
                            tracing::debug!(discarded, "Dropped input that arrived after the deadline");
                        }
                        self.say(&format!("\n⏰ Time's up! You walk away with ₹{}.", winnings))
                            .await?;
                        countdown.stop().await;
                        return Ok(ConsoleRoundEnd::TimedOut {
                            score: round.score(),
                            winnings,
                        });
                    }
                    WaitEvent::Tick(remaining) => {
                        self.say(&format!("⏳ {}s left", remaining.as_secs_f64().round() as u64))
                            .await?;
                    }
                    WaitEvent::Input(None) => {
                        countdown.stop().await;
                        return Ok(ConsoleRoundEnd::InputClosed);
                    }
                    WaitEvent::Input(Some(line)) => match parse_command(&line) {
                        Some(Command::Answer(number)) => {
                            let Some(choice) = round.displayed_option(number).map(str::to_string) else {
                                let shown = round.current().map(|q| q.displayed.len()).unwrap_or(0);
                                self.say(&format!("Please pick an option between 1 and {}.", shown))
                                    .await?;
                                continue;
                            };
                            countdown.stop().await;
                            let outcome = round.submit_answer(&choice)?;
                            if outcome.correct {
                                winnings += self.options.prize_per_correct_answer;
                                self.say(&format!(
                                    "✅ Correct! You won ₹{}.",
                                    self.options.prize_per_correct_answer
                                ))
                                .await?;
                            } else {
                                self.say(&format!(
                                    "❌ Wrong! The correct answer was: {}",
                                    outcome.correct_answer
                                ))
                                .await?;
                            }
                            if let Some(explanation) = outcome.explanation.as_deref() {
                                self.say(&format!("ℹ️ {}", explanation)).await?;
                            }
                            break;
                        }
                        Some(Command::Lifeline(lifeline)) => {
                            let outcome = round.use_lifeline(lifeline, &mut self.rng);
                            let skipped = matches!(outcome, LifelineOutcome::Skipped { .. });
                            self.render_lifeline(&outcome).await?;
                            if skipped {
                                countdown.stop().await;
                                break;
                            }
                        }
                        None => {
                            self.say("Enter an option number, or f/s/h for a lifeline.")
                                .await?;
                        }
                    },
                }
            }
        }

        let score = round.score();
        self.say(&format!(
            "🏆 Game over! Final score: {}/{}. Total winnings: ₹{}.",
            score,
            round.total_questions(),
            winnings
        ))
        .await?;

        if let Some(entry) = round.high_score_entry() {
            match self.leaderboard.append(entry).await {
                Ok(entries) => {
                    self.say("📜 Leaderboard:").await?;
                    for entry in entries {
                        self.say(&format!("  {} - {}", entry.player_name, entry.score))
                            .await?;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to save high score");
                    self.say(&format!("⚠️ Could not save your score: {}", e)).await?;
                }
            }
        }

        Ok(ConsoleRoundEnd::Completed { score, winnings })
    }

    async fn render_question(&mut self, round: &RoundState, winnings: u64) -> AppResult<()> {
        let Some(current) = round.current() else {
            return Ok(());
        };
        let mut text = format!(
            "\nQuestion {}/{}: {}\n",
            round.question_index() + 1,
            round.total_questions(),
            current.record.question_text
        );
        for (i, option) in current.displayed.iter().enumerate() {
            text.push_str(&format!("  {}. {}\n", i + 1, option));
        }
        text.push_str(&format!(
            "Score: {}/{} | Winnings: ₹{}\n",
            round.score(),
            round.total_questions(),
            winnings
        ));

        let available: Vec<String> = round
            .lifelines()
            .available()
            .iter()
            .map(|l| format!("{} = {}", l.command(), l))
            .collect();
        if !available.is_empty() {
            text.push_str(&format!("Lifelines: {}\n", available.join(", ")));
        }
        text.push_str(&format!(
            "Your answer (1-{}), {}s on the clock:",
            current.displayed.len(),
            self.options.answer_time_limit.as_secs()
        ));
        self.say(&text).await?;
        Ok(())
    }

    async fn render_lifeline(&mut self, outcome: &LifelineOutcome) -> AppResult<()> {
        let text = match outcome {
            LifelineOutcome::FiftyFifty { displayed } => {
                let mut text = "🪄 50-50! Remaining options:".to_string();
                for (i, option) in displayed.iter().enumerate() {
                    text.push_str(&format!("\n  {}. {}", i + 1, option));
                }
                text
            }
            LifelineOutcome::Skipped { .. } => "⏭️ Question skipped.".to_string(),
            LifelineOutcome::Hint { hint } => format!("💡 Hint: {}", hint),
            LifelineOutcome::AlreadyUsed { lifeline } => {
                format!("You have already used {}.", lifeline)
            }
            LifelineOutcome::NoActiveQuestion => "No question to use a lifeline on.".to_string(),
            LifelineOutcome::RoundOver => "The round is over.".to_string(),
        };
        self.say(&text).await?;
        Ok(())
    }
}
