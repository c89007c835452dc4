//! Question bank authoring: validation of new questions before they are
//! stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;
use crate::model::{CorrectAnswer, Difficulty, Question, QuestionType};

/// A question as submitted by an author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub module_id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<CorrectAnswer>,
    #[serde(default)]
    pub evaluation_rubric: Option<serde_json::Value>,
    #[serde(default)]
    pub concept_tags: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Structural checks every stored question must pass.
///
/// Objective questions need options and an answer key; DOUBLE_MCQ keys must
/// be lists.
pub fn check_question(question: &Question) -> Result<(), QuizError> {
    if question.text.trim().is_empty() {
        return Err(QuizError::Validation("question text is empty".into()));
    }
    if !question.weight.is_finite() || question.weight <= 0.0 {
        return Err(QuizError::Validation(format!(
            "weight must be positive, got {}",
            question.weight
        )));
    }

    let kind = question.question_type;
    if !kind.is_objective() {
        return Ok(());
    }
    if question.options.is_empty() {
        return Err(QuizError::Validation(
            "options are required for MCQ and DOUBLE_MCQ".into(),
        ));
    }
    match (kind, &question.correct_answer) {
        (_, None) => Err(QuizError::Validation(format!(
            "{kind} question needs a correct answer"
        ))),
        (QuestionType::DoubleMcq, Some(CorrectAnswer::Single(_))) => Err(QuizError::Validation(
            "DOUBLE_MCQ correct answer must be a list".into(),
        )),
        (_, Some(answer)) if answer.values().is_empty() => {
            Err(QuizError::Validation("correct answer is empty".into()))
        }
        _ => Ok(()),
    }
}

/// Check a new question and turn it into a bank entry with a fresh id.
///
/// A SUBJECTIVE question never keeps an answer key.
pub fn validate_new_question(new: NewQuestion) -> Result<Question, QuizError> {
    let correct_answer = if new.question_type.is_objective() {
        new.correct_answer
    } else {
        None
    };

    let question = Question {
        id: Uuid::new_v4(),
        module_id: new.module_id,
        question_type: new.question_type,
        difficulty: new.difficulty,
        text: new.text,
        options: new.options,
        correct_answer,
        evaluation_rubric: new.evaluation_rubric,
        concept_tags: new.concept_tags,
        weight: new.weight,
    };
    check_question(&question)?;
    Ok(question)
}
