//! Values returned by the quiz engine to its callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::{AggregatedScores, DimensionScores, Insights};
use crate::model::{EvaluationResult, Question, QuestionType, UserId};

/// A question as shown to the learner: no answer key, no rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    /// Present for MCQ and DOUBLE_MCQ only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl From<&Question> for QuizQuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            question_type: question.question_type,
            text: question.text.clone(),
            options: question
                .question_type
                .is_objective()
                .then(|| question.options.clone()),
        }
    }
}

/// Outcome of starting (or resuming) a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedQuiz {
    pub session_id: Uuid,
    /// True when an open session was picked up instead of creating one.
    pub resumed: bool,
    /// Unanswered questions in session order. Empty means nothing is left
    /// to answer.
    pub questions: Vec<QuizQuestionView>,
}

/// Outcome of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub attempt_id: Uuid,
    /// Always true: every accepted answer ends with a stored result.
    pub evaluated: bool,
    /// True when this answer completed the session.
    pub session_completed: bool,
    /// True when the stored result is the model-failure placeholder.
    pub fallback: bool,
    pub message: String,
}

/// One row of a completed session's breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerQuestionResult {
    pub question_id: Uuid,
    pub question_type: QuestionType,
    pub user_answer: Option<String>,
    #[serde(flatten)]
    pub scores: DimensionScores,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl PerQuestionResult {
    pub fn new(question: &Question, answer: Option<&str>, result: Option<&EvaluationResult>) -> Self {
        match result {
            Some(result) => Self {
                question_id: question.id,
                question_type: question.question_type,
                user_answer: answer.map(str::to_string),
                scores: DimensionScores::from(result),
                misconceptions: result.misconceptions.clone(),
                feedback: result.feedback.clone(),
            },
            None => Self {
                question_id: question.id,
                question_type: question.question_type,
                user_answer: answer.map(str::to_string),
                scores: DimensionScores {
                    correctness: Some(0.0),
                    ..DimensionScores::default()
                },
                misconceptions: Vec::new(),
                feedback: None,
            },
        }
    }
}

/// Progress of a session that still has unanswered questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub total_questions: usize,
    pub total_attempted: usize,
    pub questions_needed: usize,
}

/// Full breakdown of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizReport {
    pub total_questions: usize,
    /// Mean correctness over every question in the session, as a percentage.
    pub correctness_percentage: f64,
    pub per_question: Vec<PerQuestionResult>,
    pub aggregated_scores: AggregatedScores,
    #[serde(flatten)]
    pub insights: Insights,
}

/// What `result` returns for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizOutcome {
    InProgress(QuizProgress),
    Complete(QuizReport),
}

impl QuizOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, QuizOutcome::Complete(_))
    }

    pub fn report(&self) -> Option<&QuizReport> {
        match self {
            QuizOutcome::Complete(report) => Some(report),
            QuizOutcome::InProgress(_) => None,
        }
    }
}

/// A learner's standing on a module, taken from their latest completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleUnderstanding {
    pub module_id: Uuid,
    pub session_id: Uuid,
    pub aggregated_scores: AggregatedScores,
    #[serde(flatten)]
    pub insights: Insights,
}

/// Whether a learner has marked a module as complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub user_id: UserId,
    pub module_id: Uuid,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrectAnswer, Difficulty};

    fn question(question_type: QuestionType) -> Question {
        Question {
            id: Uuid::new_v4(),
            module_id: Uuid::new_v4(),
            question_type,
            difficulty: Difficulty::Easy,
            text: "Pick one".into(),
            options: vec!["A".into(), "B".into()],
            correct_answer: Some(CorrectAnswer::Single("A".into())),
            evaluation_rubric: Some(serde_json::json!({"points": 2})),
            concept_tags: vec![],
            weight: 1.0,
        }
    }

    #[test]
    fn view_hides_answer_key() {
        let view = QuizQuestionView::from(&question(QuestionType::Mcq));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "MCQ");
        assert!(json.get("correct_answer").is_none());
        assert!(json.get("evaluation_rubric").is_none());
        assert_eq!(json["options"], serde_json::json!(["A", "B"]));
    }

    #[test]
    fn subjective_view_has_no_options() {
        let view = QuizQuestionView::from(&question(QuestionType::Subjective));
        assert!(view.options.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("options").is_none());
    }

    #[test]
    fn outcome_is_tagged_by_status() {
        let outcome = QuizOutcome::InProgress(QuizProgress {
            total_questions: 3,
            total_attempted: 1,
            questions_needed: 2,
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["questions_needed"], 2);
        assert!(!outcome.is_complete());
        assert!(outcome.report().is_none());
    }

    #[test]
    fn missing_result_reports_zero_correctness_only() {
        let q = question(QuestionType::Subjective);
        let row = PerQuestionResult::new(&q, Some("text"), None);
        assert_eq!(row.scores.correctness, Some(0.0));
        assert_eq!(row.scores.conceptual_depth, None);
    }
}
