//! In-memory [`QuizStore`] implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use super::{QuizStore, RecordedAttempt, Result};
use crate::error::StoreError;
use crate::model::{
    Course, EvaluationResult, ModuleContent, Question, QuestionAttempt, QuestionType,
    QuizSession, Score, UserId, UserModuleCompletion,
};

struct Tables {
    questions: HashMap<Uuid, Question>,
    contents: HashMap<Uuid, ModuleContent>,
    sessions: HashMap<Uuid, QuizSession>,
    /// Insertion order is submission order.
    attempts: Vec<QuestionAttempt>,
    evaluations: HashMap<Uuid, EvaluationResult>,
    completions: HashMap<(UserId, Uuid), UserModuleCompletion>,
    scores: Vec<Score>,
    courses: HashMap<Uuid, Course>,
    rng: StdRng,
}

/// A store that keeps every table behind one mutex.
///
/// Holding a single lock per call makes each trait method one atomic unit,
/// which is what the check-then-insert in `record_attempt` relies on.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Store whose sampling is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tables: Mutex::new(Tables {
                questions: HashMap::new(),
                contents: HashMap::new(),
                sessions: HashMap::new(),
                attempts: Vec::new(),
                evaluations: HashMap::new(),
                completions: HashMap::new(),
                scores: Vec::new(),
                courses: HashMap::new(),
                rng,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn insert_question(&self, question: Question) -> Result<()> {
        self.lock()?.questions.insert(question.id, question);
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn get_questions(&self, ids: &[Uuid]) -> Result<Vec<Question>> {
        let tables = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.questions.get(id).cloned())
            .collect())
    }

    async fn count_questions_by_type(
        &self,
        module_id: Uuid,
    ) -> Result<BTreeMap<QuestionType, usize>> {
        let tables = self.lock()?;
        let mut counts = BTreeMap::new();
        for question in tables.questions.values() {
            if question.module_id == module_id {
                *counts.entry(question.question_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn sample_question_ids(
        &self,
        module_id: Uuid,
        question_type: QuestionType,
        limit: usize,
    ) -> Result<Vec<Uuid>> {
        let mut guard = self.lock()?;
        let tables = &mut *guard;
        let mut ids: Vec<Uuid> = tables
            .questions
            .values()
            .filter(|q| q.module_id == module_id && q.question_type == question_type)
            .map(|q| q.id)
            .collect();
        // HashMap order is arbitrary; sort so a seeded rng is reproducible.
        ids.sort();
        ids.shuffle(&mut tables.rng);
        ids.truncate(limit);
        Ok(ids)
    }

    async fn put_module_content(&self, content: ModuleContent) -> Result<()> {
        self.lock()?.contents.insert(content.module_id, content);
        Ok(())
    }

    async fn module_content(&self, module_id: Uuid) -> Result<Option<ModuleContent>> {
        Ok(self.lock()?.contents.get(&module_id).cloned())
    }

    async fn create_session(&self, session: QuizSession) -> Result<QuizSession> {
        let mut tables = self.lock()?;
        if let Some(open) = tables.sessions.values().find(|s| {
            s.user_id == session.user_id && s.module_id == session.module_id && !s.is_complete()
        }) {
            return Err(StoreError::OpenSessionExists {
                session_id: open.id,
            });
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<QuizSession>> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn find_open_session(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<QuizSession>> {
        let tables = self.lock()?;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.module_id == module_id && !s.is_complete())
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn latest_completed_session(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<QuizSession>> {
        let tables = self.lock()?;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.module_id == module_id)
            .filter(|s| s.completed_at.is_some())
            .max_by_key(|s| s.completed_at)
            .cloned())
    }

    async fn attempts_for_session(&self, session_id: Uuid) -> Result<Vec<QuestionAttempt>> {
        let tables = self.lock()?;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn session_evaluations(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<(QuestionAttempt, Option<EvaluationResult>)>> {
        let tables = self.lock()?;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .map(|a| (a.clone(), tables.evaluations.get(&a.id).cloned()))
            .collect())
    }

    async fn record_attempt(
        &self,
        attempt: QuestionAttempt,
        evaluation: EvaluationResult,
    ) -> Result<RecordedAttempt> {
        let mut guard = self.lock()?;
        let tables = &mut *guard;

        let question_count = tables
            .sessions
            .get(&attempt.session_id)
            .map(|s| s.question_ids.len())
            .ok_or_else(|| StoreError::NotFound(format!("quiz session {}", attempt.session_id)))?;

        if tables
            .attempts
            .iter()
            .any(|a| a.session_id == attempt.session_id && a.question_id == attempt.question_id)
        {
            return Err(StoreError::DuplicateAttempt {
                session_id: attempt.session_id,
                question_id: attempt.question_id,
            });
        }

        let session_id = attempt.session_id;
        tables.evaluations.insert(attempt.id, evaluation);
        tables.attempts.push(attempt);

        let attempt_count = tables
            .attempts
            .iter()
            .filter(|a| a.session_id == session_id)
            .count();

        let mut session_completed = false;
        if let Some(session) = tables.sessions.get_mut(&session_id) {
            if attempt_count >= question_count && session.completed_at.is_none() {
                session.completed_at = Some(Utc::now());
                session_completed = true;
            }
        }

        Ok(RecordedAttempt {
            attempt_count,
            session_completed,
        })
    }

    async fn upsert_module_completion(
        &self,
        completion: UserModuleCompletion,
    ) -> Result<UserModuleCompletion> {
        let mut tables = self.lock()?;
        let row = tables
            .completions
            .entry((completion.user_id, completion.module_id))
            .and_modify(|row| row.completed_at = completion.completed_at)
            .or_insert(completion);
        Ok(row.clone())
    }

    async fn module_completion(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<UserModuleCompletion>> {
        Ok(self.lock()?.completions.get(&(user_id, module_id)).cloned())
    }

    async fn append_score(&self, score: Score) -> Result<()> {
        self.lock()?.scores.push(score);
        Ok(())
    }

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<Score>> {
        let tables = self.lock()?;
        Ok(tables
            .scores
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn put_course(&self, course: Course) -> Result<()> {
        self.lock()?.courses.insert(course.id, course);
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, UnitScore};

    fn question(module_id: Uuid, question_type: QuestionType) -> Question {
        Question {
            id: Uuid::new_v4(),
            module_id,
            question_type,
            difficulty: Difficulty::Easy,
            text: "q".into(),
            options: vec![],
            correct_answer: None,
            evaluation_rubric: None,
            concept_tags: vec![],
            weight: 1.0,
        }
    }

    fn attempt(session_id: Uuid, question_id: Uuid) -> QuestionAttempt {
        QuestionAttempt {
            id: Uuid::new_v4(),
            session_id,
            question_id,
            user_answer: "A".into(),
            confidence: 5.0,
            evaluated_at: None,
        }
    }

    #[tokio::test]
    async fn counts_and_samples_per_type() {
        let store = MemoryStore::with_seed(7);
        let module = Uuid::new_v4();
        for _ in 0..5 {
            store
                .insert_question(question(module, QuestionType::Mcq))
                .await
                .unwrap();
        }
        store
            .insert_question(question(module, QuestionType::Subjective))
            .await
            .unwrap();
        store
            .insert_question(question(Uuid::new_v4(), QuestionType::Mcq))
            .await
            .unwrap();

        let counts = store.count_questions_by_type(module).await.unwrap();
        assert_eq!(counts.get(&QuestionType::Mcq), Some(&5));
        assert_eq!(counts.get(&QuestionType::Subjective), Some(&1));
        assert_eq!(counts.get(&QuestionType::DoubleMcq), None);

        let sample = store
            .sample_question_ids(module, QuestionType::Mcq, 3)
            .await
            .unwrap();
        assert_eq!(sample.len(), 3);
        let mut unique = sample.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn one_open_session_per_user_and_module() {
        let store = MemoryStore::new();
        let module = Uuid::new_v4();
        let first = store
            .create_session(QuizSession::new(1, module, vec![Uuid::new_v4()]))
            .await
            .unwrap();
        let err = store
            .create_session(QuizSession::new(1, module, vec![Uuid::new_v4()]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OpenSessionExists { session_id } if session_id == first.id));

        // A different user is unaffected.
        store
            .create_session(QuizSession::new(2, module, vec![Uuid::new_v4()]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn record_attempt_rejects_duplicates_and_completes() {
        let store = MemoryStore::new();
        let (q1, q2) = (Uuid::new_v4(), Uuid::new_v4());
        let session = store
            .create_session(QuizSession::new(1, Uuid::new_v4(), vec![q1, q2]))
            .await
            .unwrap();

        let first = attempt(session.id, q1);
        let recorded = store
            .record_attempt(
                first.clone(),
                EvaluationResult::objective(first.id, UnitScore::ONE),
            )
            .await
            .unwrap();
        assert_eq!(recorded.attempt_count, 1);
        assert!(!recorded.session_completed);

        let dup = attempt(session.id, q1);
        let err = store
            .record_attempt(dup.clone(), EvaluationResult::objective(dup.id, UnitScore::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAttempt { .. }));

        let second = attempt(session.id, q2);
        let recorded = store
            .record_attempt(
                second.clone(),
                EvaluationResult::objective(second.id, UnitScore::ZERO),
            )
            .await
            .unwrap();
        assert_eq!(recorded.attempt_count, 2);
        assert!(recorded.session_completed);

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert!(stored.is_complete());
        let evaluations = store.session_evaluations(session.id).await.unwrap();
        assert_eq!(evaluations.len(), 2);
        assert!(evaluations.iter().all(|(_, e)| e.is_some()));
    }

    #[tokio::test]
    async fn module_completion_is_one_row_per_user_and_module() {
        let store = MemoryStore::new();
        let module = Uuid::new_v4();
        assert!(store.module_completion(1, module).await.unwrap().is_none());

        let first = Utc::now() - chrono::Duration::minutes(5);
        store
            .upsert_module_completion(UserModuleCompletion {
                user_id: 1,
                module_id: module,
                completed_at: first,
            })
            .await
            .unwrap();
        let later = Utc::now();
        let row = store
            .upsert_module_completion(UserModuleCompletion {
                user_id: 1,
                module_id: module,
                completed_at: later,
            })
            .await
            .unwrap();
        assert_eq!(row.completed_at, later);

        let stored = store.module_completion(1, module).await.unwrap().unwrap();
        assert_eq!(stored.completed_at, later);
        assert!(store.module_completion(2, module).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_attempt_for_unknown_session_fails() {
        let store = MemoryStore::new();
        let a = attempt(Uuid::new_v4(), Uuid::new_v4());
        let err = store
            .record_attempt(a.clone(), EvaluationResult::objective(a.id, UnitScore::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
