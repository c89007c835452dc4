//! Persistence seam for the quiz pipeline.
//!
//! [`QuizStore`] is everything the engine and rollups need from a
//! transactional store. Each method is one unit of work: a backend must
//! either apply all of a method's writes or none of them.
//! [`MemoryStore`] is the in-process implementation used by the CLI and
//! tests.

mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Course, EvaluationResult, ModuleContent, Question, QuestionAttempt, QuestionType,
    QuizSession, Score, UserId, UserModuleCompletion,
};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of [`QuizStore::record_attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedAttempt {
    /// Attempts in the session after this write.
    pub attempt_count: usize,
    /// True when this write made the session complete.
    pub session_completed: bool,
}

/// Queries and transactional writes against the quiz tables.
#[async_trait]
pub trait QuizStore: Send + Sync {
    // -- question bank ------------------------------------------------------

    async fn insert_question(&self, question: Question) -> Result<()>;

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>>;

    /// Fetch several questions. Unknown ids are skipped; order is unspecified.
    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>>;

    /// Available questions per type for a module. Types with no questions
    /// may be absent from the map.
    async fn count_questions_by_type(&self, module_id: Uuid)
        -> Result<BTreeMap<QuestionType, usize>>;

    /// Up to `limit` question ids of one type, drawn uniformly without
    /// replacement, in random order.
    async fn sample_question_ids(
        &self,
        module_id: Uuid,
        question_type: QuestionType,
        limit: usize,
    ) -> Result<Vec<Uuid>>;

    // -- module content -----------------------------------------------------

    async fn put_module_content(&self, content: ModuleContent) -> Result<()>;

    async fn module_content(&self, module_id: Uuid) -> Result<Option<ModuleContent>>;

    // -- sessions -----------------------------------------------------------

    /// Persist a new session. Fails with
    /// [`StoreError::OpenSessionExists`] if the user already has an open
    /// session for the module.
    async fn create_session(&self, session: QuizSession) -> Result<QuizSession>;

    async fn get_session(&self, id: Uuid) -> Result<Option<QuizSession>>;

    async fn find_open_session(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<QuizSession>>;

    async fn latest_completed_session(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<QuizSession>>;

    // -- attempts -----------------------------------------------------------

    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<QuestionAttempt>>;

    /// Attempts of a session paired with their evaluation results.
    async fn session_evaluations(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<(QuestionAttempt, Option<EvaluationResult>)>>;

    /// Atomically insert an attempt together with its evaluation.
    ///
    /// Rejects a second attempt for the same (session, question) with
    /// [`StoreError::DuplicateAttempt`], and marks the session complete when
    /// the attempt count reaches its question count.
    async fn record_attempt(
        &self,
        attempt: QuestionAttempt,
        evaluation: EvaluationResult,
    ) -> Result<RecordedAttempt>;

    // -- module completion --------------------------------------------------

    /// Insert the completion, or overwrite the timestamp of the existing
    /// row for the same (user, module). Returns the stored row.
    async fn upsert_module_completion(
        &self,
        completion: UserModuleCompletion,
    ) -> Result<UserModuleCompletion>;

    async fn module_completion(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<UserModuleCompletion>>;

    // -- score log ----------------------------------------------------------

    async fn append_score(&self, score: Score) -> Result<()>;

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<Score>>;

    // -- courses ------------------------------------------------------------

    async fn put_course(&self, course: Course) -> Result<()>;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>>;
}
