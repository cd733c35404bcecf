use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::{OPTIONS_PER_QUESTION, QuestionRecord};

/// Options in display order. `correct_index` (0-based) follows the correct
/// option through the permutation, so repeated option texts are fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShuffledOptions {
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl ShuffledOptions {
    pub fn correct_text(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, display_index: usize) -> bool {
        display_index == self.correct_index
    }
}

pub fn shuffle<R: Rng + ?Sized>(record: &QuestionRecord, rng: &mut R) -> ShuffledOptions {
    let mut order: Vec<usize> = (0..OPTIONS_PER_QUESTION).collect();
    order.shuffle(rng);

    let correct = record.correct_position();
    let correct_index = order.iter().position(|&i| i == correct).unwrap_or(0);
    let options = order.iter().map(|&i| record.options[i].clone()).collect();

    ShuffledOptions {
        options,
        correct_index,
    }
}
