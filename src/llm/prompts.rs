use crate::game_logic::Theme;

pub const QUESTION_SYSTEM_PROMPT: &str = "You are a strict trivia question generator.";
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a trivia answerer.";

pub fn question_prompt(theme: Theme, exclude: &[String]) -> String {
    let avoid = if exclude.is_empty() {
        "none yet".to_string()
    } else {
        exclude
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Create ONE easy multiple-choice question STRICTLY about: {theme}.\n\
         It MUST be factual and relevant to the theme.\n\
         Do NOT repeat these questions:\n{avoid}\n\n\
         Output exactly in this format:\n\
         Question: <question>\n\
         Options:\n\
         1. <option1>\n\
         2. <option2>\n\
         3. <option3>\n\
         4. <option4>\n\
         Explanation: <short explanation>"
    )
}

pub fn answer_prompt(question_block: &str) -> String {
    format!(
        "Answer this question: {}\nOutput only the correct option number (1-4).",
        question_block
    )
}
