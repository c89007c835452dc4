//! Deterministic grading for MCQ and DOUBLE_MCQ answers.
//!
//! Nothing here fails: an answer that cannot be read scores zero.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::model::{CorrectAnswer, Question, QuestionType, UnitScore};

/// Penalty per wrong option, relative to the size of the correct set.
pub const WRONG_OPTION_PENALTY: f64 = 0.25;

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Grade a single-answer question: 1 on a normalized match, else 0.
pub fn evaluate_mcq(user_answer: &str, correct: Option<&CorrectAnswer>) -> UnitScore {
    match correct {
        Some(CorrectAnswer::Single(expected)) if normalize(expected) == normalize(user_answer) => {
            UnitScore::ONE
        }
        _ => UnitScore::ZERO,
    }
}

/// Parse a DOUBLE_MCQ answer into a normalized option set.
///
/// Text starting with `[` is read as a JSON array; anything else, including
/// a broken array, is one option.
fn parse_selection(user_answer: &str) -> BTreeSet<String> {
    let trimmed = user_answer.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(trimmed) {
            return items
                .iter()
                .map(|item| match item {
                    Value::String(s) => normalize(s),
                    other => normalize(&other.to_string()),
                })
                .collect();
        }
    }
    BTreeSet::from([normalize(user_answer)])
}

/// Grade a multi-answer question with partial credit.
///
/// Exact set match scores 1. Otherwise the score is
/// `correct_selected / |correct| - 0.25 * wrong_selected / |correct|`,
/// clamped to `[0, 1]` and rounded to three decimals with ties to even.
pub fn evaluate_double_mcq(user_answer: &str, correct: Option<&CorrectAnswer>) -> UnitScore {
    let Some(correct) = correct else {
        return UnitScore::ZERO;
    };
    let correct_set: BTreeSet<String> = correct.values().into_iter().map(normalize).collect();
    if correct_set.is_empty() {
        return UnitScore::ZERO;
    }

    let selected = parse_selection(user_answer);
    if selected == correct_set {
        return UnitScore::ONE;
    }

    let expected = correct_set.len() as f64;
    let correct_selected = selected.intersection(&correct_set).count() as f64;
    let wrong_selected = selected.difference(&correct_set).count() as f64;
    let partial = correct_selected / expected - WRONG_OPTION_PENALTY * (wrong_selected / expected);
    UnitScore::from_f64(partial)
}

/// Grade an objective question. Subjective questions score zero here.
pub fn evaluate(question: &Question, user_answer: &str) -> UnitScore {
    let answer = user_answer.trim();
    let correct = question.correct_answer.as_ref();
    match question.question_type {
        QuestionType::Mcq => evaluate_mcq(answer, correct),
        QuestionType::DoubleMcq => evaluate_double_mcq(answer, correct),
        QuestionType::Subjective => UnitScore::ZERO,
    }
}
