use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use millionaire::game_logic::{
    AnswerOracle, Lifeline, LifelineOutcome, QuestionLoader, QuestionSource, RoundPhase,
    RoundState, Theme,
};
use millionaire::leaderboard::{HighScoreEntry, LeaderboardStore};
use millionaire::llm::LlmError;

const HISTORY_QUESTIONS: [(&str, [&str; 4], u8); 5] = [
    (
        "Who founded the Maratha Empire?",
        ["Bajirao I", "Chhatrapati Shivaji Maharaj", "Shahaji Bhosale", "Tipu Sultan"],
        2,
    ),
    (
        "In which year did India gain independence?",
        ["1945", "1950", "1947", "1942"],
        3,
    ),
    (
        "Who was the first Prime Minister of India?",
        ["Jawaharlal Nehru", "Sardar Patel", "Indira Gandhi", "Lal Bahadur Shastri"],
        1,
    ),
    (
        "Which empire built the Taj Mahal?",
        ["Maurya", "Gupta", "Chola", "Mughal"],
        4,
    ),
    (
        "Where was the Battle of Plassey fought?",
        ["Bengal", "Punjab", "Deccan", "Gujarat"],
        1,
    ),
];

fn block(question: &str, options: &[&str; 4]) -> String {
    format!(
        "Question: {}\nOptions:\n1. {}\n2. {}\n3. {}\n4. {}\nExplanation: It is a well known fact. Look it up.",
        question, options[0], options[1], options[2], options[3]
    )
}

/// Serves the History questions in order and knows their answers.
struct HistoryQuiz;

#[async_trait]
impl QuestionSource for HistoryQuiz {
    async fn generate_question(&self, _theme: Theme, exclude: &[String]) -> Result<String, LlmError> {
        let (question, options, _) = HISTORY_QUESTIONS
            .get(exclude.len())
            .ok_or(LlmError::EmptyCompletion)?;
        Ok(block(question, options))
    }
}

#[async_trait]
impl AnswerOracle for HistoryQuiz {
    async fn answer(&self, question_block: &str) -> Result<String, LlmError> {
        let (_, _, correct) = HISTORY_QUESTIONS
            .iter()
            .find(|(q, _, _)| question_block.contains(*q))
            .ok_or(LlmError::EmptyCompletion)?;
        Ok(format!("The correct option is {}.", correct))
    }
}

struct VagueOracle;

#[async_trait]
impl AnswerOracle for VagueOracle {
    async fn answer(&self, _question_block: &str) -> Result<String, LlmError> {
        Ok("I think it's B".to_string())
    }
}

fn history_loader() -> QuestionLoader {
    let quiz = Arc::new(HistoryQuiz);
    QuestionLoader::new(quiz.clone(), quiz).with_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn test_history_round_all_correct_is_saved_once() {
    let dir = TempDir::new().unwrap();
    let store = LeaderboardStore::new(dir.path().join("highscores.csv"));
    let loader = history_loader();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut round = RoundState::new("Asha", Theme::History, 5);

    for (i, (_, options, correct)) in HISTORY_QUESTIONS.iter().enumerate() {
        round.ensure_question(&loader, &mut rng).await.unwrap();
        let current = round.current().unwrap();
        assert_eq!(current.displayed.len(), 4);
        assert_eq!(current.shuffled.correct_text(), options[usize::from(*correct) - 1]);

        let outcome = round
            .submit_answer(options[usize::from(*correct) - 1])
            .unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.question_index, i + 1);
    }

    assert_eq!(round.phase(), RoundPhase::Completed);
    assert_eq!(round.score(), 5);
    assert_eq!(round.history().for_theme(Theme::History).len(), 5);

    let entry = round.high_score_entry().unwrap();
    let board = store.append(entry).await.unwrap();
    assert_eq!(
        board,
        vec![HighScoreEntry {
            player_name: "Asha".to_string(),
            score: 5
        }]
    );
    assert_eq!(store.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_vague_oracle_still_lets_round_proceed() {
    let loader = QuestionLoader::new(Arc::new(HistoryQuiz), Arc::new(VagueOracle))
        .with_backoff(Duration::from_millis(1));
    let mut rng = StdRng::seed_from_u64(5);
    let mut round = RoundState::new("Ravi", Theme::History, 5);

    round.ensure_question(&loader, &mut rng).await.unwrap();
    let current = round.current().unwrap();
    assert!((1..=4).contains(&current.record.correct_option));

    let choice = current.displayed[0].clone();
    let outcome = round.submit_answer(&choice).unwrap();
    assert_eq!(outcome.question_index, 1);
    assert!(round.score() <= 1);

    round.ensure_question(&loader, &mut rng).await.unwrap();
    assert!(round.current().is_some());
}

#[tokio::test]
async fn test_lifelines_across_a_round_keep_score_bounded() {
    let loader = history_loader();
    let mut rng = StdRng::seed_from_u64(11);
    let mut round = RoundState::new("Meera", Theme::History, 5);

    round.ensure_question(&loader, &mut rng).await.unwrap();
    let LifelineOutcome::FiftyFifty { displayed } = round.use_lifeline(Lifeline::FiftyFifty, &mut rng)
    else {
        panic!("expected 50-50 to apply");
    };
    assert_eq!(displayed.len(), 2);
    assert!(displayed.contains(&"Chhatrapati Shivaji Maharaj".to_string()));
    round.submit_answer("Chhatrapati Shivaji Maharaj").unwrap();

    round.ensure_question(&loader, &mut rng).await.unwrap();
    assert!(matches!(
        round.use_lifeline(Lifeline::Skip, &mut rng),
        LifelineOutcome::Skipped { question_index: 2, round_complete: false }
    ));

    while !round.is_over() {
        round.ensure_question(&loader, &mut rng).await.unwrap();
        round.submit_answer("definitely wrong").unwrap();
    }

    assert_eq!(round.question_index(), 5);
    assert_eq!(round.score(), 1);
    assert!(round.score() as usize <= round.total_questions());
}
