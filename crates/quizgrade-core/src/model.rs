//! Core data model types for quizgrade.
//!
//! Questions live in a per-module bank; a quiz session freezes an ordered
//! list of question ids; each answer becomes one attempt with exactly one
//! evaluation result. Scores form a separate append-only log that rollups
//! read from.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identity of a learner, resolved upstream by authentication.
pub type UserId = i64;

/// Feedback stored when the subjective pipeline could not produce a score.
pub const FALLBACK_FEEDBACK: &str = "Evaluation could not be completed.";

/// The three kinds of question a bank can hold.
///
/// Variant order is the selection priority order (MCQ first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Mcq,
    DoubleMcq,
    Subjective,
}

impl QuestionType {
    /// Every type, in selection priority order.
    pub const ALL: [QuestionType; 3] = [
        QuestionType::Mcq,
        QuestionType::DoubleMcq,
        QuestionType::Subjective,
    ];

    /// Objective questions are graded deterministically.
    pub fn is_objective(self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::DoubleMcq)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Mcq => write!(f, "MCQ"),
            QuestionType::DoubleMcq => write!(f, "DOUBLE_MCQ"),
            QuestionType::Subjective => write!(f, "SUBJECTIVE"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "MCQ" => Ok(QuestionType::Mcq),
            "DOUBLE_MCQ" => Ok(QuestionType::DoubleMcq),
            "SUBJECTIVE" => Ok(QuestionType::Subjective),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// Authoring difficulty label. Informational only; selection ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Expected answer for an objective question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    /// A single option value (MCQ).
    Single(String),
    /// A set of option values (DOUBLE_MCQ).
    Multiple(Vec<String>),
}

impl CorrectAnswer {
    /// All expected values, regardless of shape.
    pub fn values(&self) -> Vec<&str> {
        match self {
            CorrectAnswer::Single(value) => vec![value.as_str()],
            CorrectAnswer::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// A question in a module's bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    /// Module this question belongs to.
    pub module_id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub text: String,
    /// Ordered options; empty for SUBJECTIVE.
    #[serde(default)]
    pub options: Vec<String>,
    /// Absent for SUBJECTIVE.
    #[serde(default)]
    pub correct_answer: Option<CorrectAnswer>,
    /// Structured grading criteria, SUBJECTIVE only.
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

/// One quiz attempt by a user on a module.
///
/// `question_ids` is fixed when the session is created and never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub module_id: Uuid,
    pub question_ids: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// Create an open session with a frozen question order.
    pub fn new(user_id: UserId, module_id: Uuid, question_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            module_id,
            question_ids,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn contains(&self, question_id: Uuid) -> bool {
        self.question_ids.contains(&question_id)
    }
}

/// A submitted answer to one question of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAttempt {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    /// Raw answer text. DOUBLE_MCQ answers are JSON arrays.
    pub user_answer: String,
    /// Self-reported confidence in `[0, 10]`.
    pub confidence: f64,
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
}

/// A score in `[0, 1]` stored as whole thousandths.
///
/// Persisted dimensions use this instead of `f64` so values survive
/// round-trips without binary drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitScore(u16);

impl UnitScore {
    pub const ZERO: UnitScore = UnitScore(0);
    pub const ONE: UnitScore = UnitScore(SCALE);

    /// Clamp to `[0, 1]` and round to three decimals, ties to even.
    /// NaN becomes zero.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        let clamped = value.clamp(0.0, 1.0);
        UnitScore((clamped * f64::from(SCALE)).round_ties_even() as u16)
    }

    pub fn from_thousandths(value: u16) -> Self {
        UnitScore(value.min(SCALE))
    }

    pub fn thousandths(self) -> u16 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }
}

const SCALE: u16 = 1000;

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.as_f64())
    }
}

impl Serialize for UnitScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for UnitScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(UnitScore::from_f64(value))
    }
}

/// The graded outcome of one attempt. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub attempt_id: Uuid,
    pub correctness: UnitScore,
    pub conceptual_depth: UnitScore,
    pub reasoning_quality: UnitScore,
    pub confidence_alignment: UnitScore,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl EvaluationResult {
    /// Result for an objective question: only correctness carries signal.
    pub fn objective(attempt_id: Uuid, correctness: UnitScore) -> Self {
        Self {
            attempt_id,
            correctness,
            conceptual_depth: UnitScore::ZERO,
            reasoning_quality: UnitScore::ZERO,
            confidence_alignment: UnitScore::ZERO,
            misconceptions: Vec::new(),
            feedback: None,
        }
    }

    /// Explicit zero placeholder used when the model pipeline gave up.
    pub fn fallback(attempt_id: Uuid) -> Self {
        Self {
            feedback: Some(FALLBACK_FEEDBACK.to_string()),
            ..Self::objective(attempt_id, UnitScore::ZERO)
        }
    }
}

/// Title and body of a module's study material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleContent {
    pub module_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A learner marked a module's material as done.
///
/// At most one row per (user, module); marking again moves `completed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModuleCompletion {
    pub user_id: UserId,
    pub module_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// A course groups modules in a fixed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub module_ids: Vec<Uuid>,
}

/// One entry in the append-only score log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    /// Origin tag, e.g. "evaluation_engine" or "conversation_evaluation".
    pub score_type: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub correctness: UnitScore,
    pub conceptual_depth: UnitScore,
    pub reasoning_quality: UnitScore,
    pub confidence_alignment: UnitScore,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Score {
    /// Plain mean of the four dimensions.
    pub fn dimension_mean(&self) -> f64 {
        (self.correctness.as_f64()
            + self.conceptual_depth.as_f64()
            + self.reasoning_quality.as_f64()
            + self.confidence_alignment.as_f64())
            / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::DoubleMcq.to_string(), "DOUBLE_MCQ");
        assert_eq!("mcq".parse::<QuestionType>().unwrap(), QuestionType::Mcq);
        assert_eq!(
            "double-mcq".parse::<QuestionType>().unwrap(),
            QuestionType::DoubleMcq
        );
        assert_eq!(
            "Subjective".parse::<QuestionType>().unwrap(),
            QuestionType::Subjective
        );
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn question_type_serde_uses_wire_names() {
        let json = serde_json::to_string(&QuestionType::DoubleMcq).unwrap();
        assert_eq!(json, "\"DOUBLE_MCQ\"");
        let parsed: QuestionType = serde_json::from_str("\"SUBJECTIVE\"").unwrap();
        assert_eq!(parsed, QuestionType::Subjective);
    }

    #[test]
    fn unit_score_clamps_and_rounds() {
        assert_eq!(UnitScore::from_f64(1.5), UnitScore::ONE);
        assert_eq!(UnitScore::from_f64(-0.2), UnitScore::ZERO);
        assert_eq!(UnitScore::from_f64(f64::NAN), UnitScore::ZERO);
        assert_eq!(UnitScore::from_f64(0.3334).thousandths(), 333);
        assert_eq!(UnitScore::from_f64(0.5).as_f64(), 0.5);
        assert_eq!(UnitScore::from_thousandths(4000), UnitScore::ONE);
    }

    #[test]
    fn unit_score_rounds_exact_ties_to_even() {
        assert_eq!(UnitScore::from_f64(0.0625).thousandths(), 62);
        assert_eq!(UnitScore::from_f64(0.3125).thousandths(), 312);
        assert_eq!(UnitScore::from_f64(0.4375).thousandths(), 438);
    }

    #[test]
    fn unit_score_serializes_as_number() {
        let json = serde_json::to_string(&UnitScore::from_f64(0.75)).unwrap();
        assert_eq!(json, "0.75");
        let back: UnitScore = serde_json::from_str("1.7").unwrap();
        assert_eq!(back, UnitScore::ONE);
    }

    #[test]
    fn correct_answer_accepts_both_shapes() {
        let single: CorrectAnswer = serde_json::from_str("\"O(n)\"").unwrap();
        assert_eq!(single, CorrectAnswer::Single("O(n)".into()));
        let multiple: CorrectAnswer = serde_json::from_str("[\"A\", \"B\"]").unwrap();
        assert_eq!(multiple.values(), vec!["A", "B"]);
    }

    #[test]
    fn fallback_result_is_labelled() {
        let result = EvaluationResult::fallback(Uuid::nil());
        assert_eq!(result.feedback.as_deref(), Some(FALLBACK_FEEDBACK));
        assert_eq!(result.correctness, UnitScore::ZERO);
        assert!(EvaluationResult::objective(Uuid::nil(), UnitScore::ZERO)
            .feedback
            .is_none());
    }

    #[test]
    fn session_tracks_membership() {
        let q = Uuid::new_v4();
        let session = QuizSession::new(7, Uuid::new_v4(), vec![q]);
        assert!(session.contains(q));
        assert!(!session.contains(Uuid::new_v4()));
        assert!(!session.is_complete());
    }
}
