//! Parsing of free-text model replies.
//!
//! The question source is asked for this block:
//!
//! ```text
//! Question: <text>
//! Options:
//! 1. <a>
//! 2. <b>
//! 3. <c>
//! 4. <d>
//! Explanation: <text>
//! ```
//!
//! Lines are trimmed and markdown bold markers are dropped before matching.
//! The explanation is optional, everything else is required.

use regex::Regex;
use std::sync::LazyLock;

use super::{OPTIONS_PER_QUESTION, QuizError};

static QUESTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^question\s*:\s*(.*)$").expect("QUESTION_LINE is a valid regex pattern")
});

static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([1-4])\s*[.)](?:\s+|$)(.*)$").expect("OPTION_LINE is a valid regex pattern")
});

static EXPLANATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^explanation\s*:\s*(.*)$")
        .expect("EXPLANATION_LINE is a valid regex pattern")
});

static ORACLE_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[1-4]").expect("ORACLE_DIGIT is a valid regex pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub question_text: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub explanation: Option<String>,
}

fn clean_line(line: &str) -> String {
    line.replace("**", "").trim().to_string()
}

pub fn parse_question_block(raw: &str) -> Result<ParsedQuestion, QuizError> {
    let mut question_text: Option<String> = None;
    let mut options: [Option<String>; OPTIONS_PER_QUESTION] = Default::default();
    let mut explanation: Option<String> = None;

    for line in raw.lines().map(clean_line).filter(|l| !l.is_empty()) {
        if question_text.is_none() {
            if let Some(caps) = QUESTION_LINE.captures(&line) {
                question_text = Some(caps[1].trim().to_string());
                continue;
            }
        }

        if let Some(caps) = OPTION_LINE.captures(&line) {
            // The pattern only admits 1-4.
            let slot = caps[1].parse::<usize>().unwrap_or(1) - 1;
            if options[slot].is_none() {
                options[slot] = Some(caps[2].trim().to_string());
            }
            continue;
        }

        if explanation.is_none() {
            if let Some(caps) = EXPLANATION_LINE.captures(&line) {
                let text = caps[1].trim();
                if !text.is_empty() {
                    explanation = Some(text.to_string());
                }
            }
        }
    }

    let question_text = match question_text {
        Some(text) if !text.is_empty() => text,
        Some(_) => {
            return Err(QuizError::MalformedResponse(
                "question line is empty".to_string(),
            ));
        }
        None => {
            return Err(QuizError::MalformedResponse(
                "no 'Question:' line found".to_string(),
            ));
        }
    };

    let found = options.iter().filter(|o| o.is_some()).count();
    if found < OPTIONS_PER_QUESTION {
        let missing: Vec<String> = options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_none())
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        return Err(QuizError::MalformedResponse(format!(
            "expected {} options, found {} (missing {})",
            OPTIONS_PER_QUESTION,
            found,
            missing.join(", ")
        )));
    }

    let options = options.map(Option::unwrap_or_default);
    if let Some(pos) = options.iter().position(String::is_empty) {
        return Err(QuizError::MalformedResponse(format!(
            "option {} has no text",
            pos + 1
        )));
    }

    Ok(ParsedQuestion {
        question_text,
        options,
        explanation,
    })
}

/// First option number 1-4 mentioned anywhere in an oracle reply.
pub fn extract_option_number(reply: &str) -> Option<u8> {
    ORACLE_DIGIT
        .find(reply)
        .and_then(|m| m.as_str().parse::<u8>().ok())
}
