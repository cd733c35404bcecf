use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::shuffle::ShuffledOptions;

pub const NO_EXPLANATION_HINT: &str = "No explanation available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifeline {
    FiftyFifty,
    Skip,
    Hint,
}

impl Lifeline {
    pub fn all() -> [Lifeline; 3] {
        [Lifeline::FiftyFifty, Lifeline::Skip, Lifeline::Hint]
    }

    /// Single-letter console command.
    pub fn command(&self) -> char {
        match self {
            Lifeline::FiftyFifty => 'f',
            Lifeline::Skip => 's',
            Lifeline::Hint => 'h',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Lifeline::FiftyFifty => "50-50",
            Lifeline::Skip => "Skip",
            Lifeline::Hint => "Hint",
        }
    }
}

impl fmt::Display for Lifeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Lifeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "50-50" | "50/50" | "fifty_fifty" => Ok(Lifeline::FiftyFifty),
            "s" | "skip" => Ok(Lifeline::Skip),
            "h" | "hint" => Ok(Lifeline::Hint),
            other => Err(format!("Unknown lifeline '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifelineState {
    Available,
    Consumed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lifelines {
    fifty_fifty: LifelineState,
    skip: LifelineState,
    hint: LifelineState,
}

impl Default for Lifelines {
    fn default() -> Self {
        Self {
            fifty_fifty: LifelineState::Available,
            skip: LifelineState::Available,
            hint: LifelineState::Available,
        }
    }
}

impl Lifelines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, lifeline: Lifeline) -> LifelineState {
        match lifeline {
            Lifeline::FiftyFifty => self.fifty_fifty,
            Lifeline::Skip => self.skip,
            Lifeline::Hint => self.hint,
        }
    }

    pub fn is_available(&self, lifeline: Lifeline) -> bool {
        self.state(lifeline) == LifelineState::Available
    }

    pub fn available(&self) -> Vec<Lifeline> {
        Lifeline::all()
            .into_iter()
            .filter(|l| self.is_available(*l))
            .collect()
    }

    /// Marks `lifeline` consumed. Returns false if it already was.
    pub fn consume(&mut self, lifeline: Lifeline) -> bool {
        let slot = match lifeline {
            Lifeline::FiftyFifty => &mut self.fifty_fifty,
            Lifeline::Skip => &mut self.skip,
            Lifeline::Hint => &mut self.hint,
        };
        if *slot == LifelineState::Consumed {
            return false;
        }
        *slot = LifelineState::Consumed;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LifelineOutcome {
    FiftyFifty { displayed: Vec<String> },
    Skipped { question_index: usize, round_complete: bool },
    Hint { hint: String },
    AlreadyUsed { lifeline: Lifeline },
    NoActiveQuestion,
    RoundOver,
}

/// Keeps the correct option and one random wrong one, in shuffled order.
pub fn fifty_fifty<R: Rng + ?Sized>(shuffled: &ShuffledOptions, rng: &mut R) -> Vec<String> {
    let wrong: Vec<usize> = (0..shuffled.options.len())
        .filter(|&i| i != shuffled.correct_index)
        .collect();
    let Some(&kept_wrong) = wrong.choose(rng) else {
        return shuffled.options.clone();
    };

    shuffled
        .options
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == shuffled.correct_index || *i == kept_wrong)
        .map(|(_, text)| text.clone())
        .collect()
}

/// Explanation up to and including its first sentence boundary.
pub fn hint_prefix(explanation: Option<&str>) -> String {
    let Some(text) = explanation.map(str::trim).filter(|t| !t.is_empty()) else {
        return NO_EXPLANATION_HINT.to_string();
    };

    match sentence_end(text) {
        Some(end) => text[..=end].trim().to_string(),
        None => text.to_string(),
    }
}

/// Byte index of the first `.`, `!` or `?` followed by whitespace or the end
/// of the text. A period after a lone letter is an initial ("B. R.").
fn sentence_end(text: &str) -> Option<usize> {
    text.char_indices().find_map(|(i, c)| {
        if !matches!(c, '.' | '!' | '?') {
            return None;
        }
        let rest = &text[i + c.len_utf8()..];
        if !rest.chars().next().is_none_or(char::is_whitespace) {
            return None;
        }
        if c == '.' && ends_with_initial(&text[..i]) {
            return None;
        }
        Some(i)
    })
}

fn ends_with_initial(before: &str) -> bool {
    let word = before.rsplit(char::is_whitespace).next().unwrap_or("");
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(first), None) if first.is_alphabetic())
}
