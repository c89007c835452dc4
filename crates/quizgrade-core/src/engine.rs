//! Quiz session orchestrator.
//!
//! Drives start → submit → result for one (user, module) pair. Objective
//! answers are graded in place; subjective answers go through the model
//! pipeline and fall back to a labelled zero result when it gives up, so a
//! submission is never blocked by model availability.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::{aggregate, infer_insights, DimensionScores};
use crate::bank::{validate_new_question, NewQuestion};
use crate::error::{QuizError, StoreError};
use crate::model::{
    EvaluationResult, Question, QuestionAttempt, QuizSession, UserId, UserModuleCompletion,
};
use crate::objective;
use crate::results::{
    ModuleStatus, ModuleUnderstanding, PerQuestionResult, QuizOutcome, QuizProgress,
    QuizQuestionView, QuizReport, StartedQuiz, SubmitOutcome,
};
use crate::selection::select_questions;
use crate::store::QuizStore;
use crate::subjective::{SubjectiveEvaluator, SubjectiveInput};

/// Module body beyond this many characters is not passed to the model.
pub const MAX_MODULE_BODY_CHARS: usize = 2000;

/// Highest self-reported confidence.
pub const MAX_CONFIDENCE: f64 = 10.0;

/// One answer submitted by a learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: String,
    /// Self-reported confidence in `[0, 10]`.
    pub confidence: f64,
}

/// A graded answer and which branch produced it.
enum Graded {
    Scored(EvaluationResult),
    /// The model pipeline gave up or no model is configured.
    Fallback(EvaluationResult),
}

impl Graded {
    fn into_result(self) -> EvaluationResult {
        match self {
            Graded::Scored(result) | Graded::Fallback(result) => result,
        }
    }
}

/// The quiz engine.
pub struct QuizEngine {
    store: Arc<dyn QuizStore>,
    /// `None` runs without a model: every subjective answer gets the
    /// fallback result.
    evaluator: Option<SubjectiveEvaluator>,
}

impl QuizEngine {
    pub fn new(store: Arc<dyn QuizStore>, evaluator: Option<SubjectiveEvaluator>) -> Self {
        Self { store, evaluator }
    }

    pub fn store(&self) -> &Arc<dyn QuizStore> {
        &self.store
    }

    /// Start a quiz, or resume the user's open session for the module.
    pub async fn start(&self, user_id: UserId, module_id: Uuid) -> Result<StartedQuiz, QuizError> {
        if let Some(open) = self.store.find_open_session(user_id, module_id).await? {
            return self.resume(open).await;
        }

        let question_ids = select_questions(self.store.as_ref(), module_id).await?;
        if question_ids.is_empty() {
            return Err(QuizError::NotFound(format!(
                "no questions available for module {module_id}"
            )));
        }

        let session = QuizSession::new(user_id, module_id, question_ids);
        match self.store.create_session(session).await {
            Ok(session) => {
                tracing::info!(
                    session_id = %session.id,
                    user_id,
                    %module_id,
                    questions = session.question_ids.len(),
                    "created quiz session"
                );
                let questions = self.views_in_order(&session.question_ids).await?;
                Ok(StartedQuiz {
                    session_id: session.id,
                    resumed: false,
                    questions,
                })
            }
            // A concurrent start won the race; hand back its session.
            Err(StoreError::OpenSessionExists { session_id }) => {
                let open = self
                    .store
                    .get_session(session_id)
                    .await?
                    .ok_or_else(|| QuizError::NotFound(format!("quiz session {session_id}")))?;
                self.resume(open).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resume(&self, session: QuizSession) -> Result<StartedQuiz, QuizError> {
        let answered: HashSet<Uuid> = self
            .store
            .attempts_for_session(session.id)
            .await?
            .into_iter()
            .map(|a| a.question_id)
            .collect();
        let pending: Vec<Uuid> = session
            .question_ids
            .iter()
            .copied()
            .filter(|id| !answered.contains(id))
            .collect();

        tracing::info!(
            session_id = %session.id,
            pending = pending.len(),
            "resumed open quiz session"
        );
        Ok(StartedQuiz {
            session_id: session.id,
            resumed: true,
            questions: self.views_in_order(&pending).await?,
        })
    }

    async fn views_in_order(&self, ids: &[Uuid]) -> Result<Vec<QuizQuestionView>, QuizError> {
        let by_id = self.questions_by_id(ids).await?;
        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(QuizQuestionView::from)
            .collect())
    }

    async fn questions_by_id(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Question>, QuizError> {
        Ok(self
            .store
            .get_questions(ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect())
    }

    /// Load a session, hiding sessions owned by someone else.
    async fn owned_session(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<QuizSession, QuizError> {
        self.store
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| QuizError::NotFound(format!("quiz session {session_id}")))
    }

    /// Record and grade one answer.
    pub async fn submit(
        &self,
        user_id: UserId,
        request: SubmitRequest,
    ) -> Result<SubmitOutcome, QuizError> {
        if !request.confidence.is_finite() || !(0.0..=MAX_CONFIDENCE).contains(&request.confidence)
        {
            return Err(QuizError::Validation(format!(
                "confidence must be between 0 and {MAX_CONFIDENCE}, got {}",
                request.confidence
            )));
        }

        let session = self.owned_session(user_id, request.session_id).await?;
        if !session.contains(request.question_id) {
            return Err(QuizError::Conflict(
                "question is not part of this quiz session".into(),
            ));
        }

        // `record_attempt` re-checks this atomically.
        let already_answered = self
            .store
            .attempts_for_session(session.id)
            .await?
            .iter()
            .any(|a| a.question_id == request.question_id);
        if already_answered {
            return Err(QuizError::Conflict(
                "answer already submitted for this question".into(),
            ));
        }

        let question = self
            .store
            .get_question(request.question_id)
            .await?
            .ok_or_else(|| QuizError::NotFound(format!("question {}", request.question_id)))?;

        let attempt_id = Uuid::new_v4();
        let graded = if question.question_type.is_objective() {
            Graded::Scored(EvaluationResult::objective(
                attempt_id,
                objective::evaluate(&question, &request.user_answer),
            ))
        } else {
            self.evaluate_subjective(&session, &question, &request.user_answer, attempt_id)
                .await?
        };
        let fallback = matches!(graded, Graded::Fallback(_));
        let evaluation = graded.into_result();

        let attempt = QuestionAttempt {
            id: attempt_id,
            session_id: session.id,
            question_id: question.id,
            user_answer: request.user_answer,
            confidence: request.confidence,
            evaluated_at: Some(Utc::now()),
        };
        let recorded = self.store.record_attempt(attempt, evaluation).await?;

        tracing::debug!(
            session_id = %session.id,
            question_id = %question.id,
            question_type = %question.question_type,
            attempts = recorded.attempt_count,
            "recorded attempt"
        );
        if recorded.session_completed {
            tracing::info!(session_id = %session.id, "quiz session completed");
        }

        let message = if fallback {
            "Answer recorded. Evaluation could not be completed."
        } else {
            "Answer recorded."
        };
        Ok(SubmitOutcome {
            attempt_id,
            evaluated: true,
            session_completed: recorded.session_completed,
            fallback,
            message: message.to_string(),
        })
    }

    async fn evaluate_subjective(
        &self,
        session: &QuizSession,
        question: &Question,
        user_answer: &str,
        attempt_id: Uuid,
    ) -> Result<Graded, QuizError> {
        let Some(evaluator) = &self.evaluator else {
            tracing::warn!(question_id = %question.id, "no model configured, storing fallback result");
            return Ok(Graded::Fallback(EvaluationResult::fallback(attempt_id)));
        };

        let context = self.module_context(session.module_id).await?;
        let input = SubjectiveInput {
            question_text: &question.text,
            rubric: question.evaluation_rubric.as_ref(),
            user_answer,
            module_context: context.as_deref(),
        };

        match evaluator.evaluate(&input).await {
            Ok(scores) => Ok(Graded::Scored(scores.into_result(attempt_id))),
            Err(failure) => {
                tracing::warn!(
                    question_id = %question.id,
                    provider = evaluator.provider_name(),
                    "subjective evaluation failed, storing fallback result: {failure}"
                );
                Ok(Graded::Fallback(EvaluationResult::fallback(attempt_id)))
            }
        }
    }

    /// `title\nbody` for the module, with the body capped.
    async fn module_context(&self, module_id: Uuid) -> Result<Option<String>, QuizError> {
        let Some(content) = self.store.module_content(module_id).await? else {
            return Ok(None);
        };
        let body: String = content
            .content
            .unwrap_or_default()
            .chars()
            .take(MAX_MODULE_BODY_CHARS)
            .collect();
        let context = format!("{}\n{}", content.title.unwrap_or_default(), body);
        let context = context.trim();
        Ok((!context.is_empty()).then(|| context.to_string()))
    }

    /// Progress for an open session, or the full report once it is complete.
    pub async fn result(&self, user_id: UserId, session_id: Uuid) -> Result<QuizOutcome, QuizError> {
        let session = self.owned_session(user_id, session_id).await?;
        if !session.is_complete() {
            let attempted = self.store.attempts_for_session(session.id).await?.len();
            let total = session.question_ids.len();
            return Ok(QuizOutcome::InProgress(QuizProgress {
                total_questions: total,
                total_attempted: attempted,
                questions_needed: total.saturating_sub(attempted),
            }));
        }
        Ok(QuizOutcome::Complete(self.report(&session).await?))
    }

    async fn report(&self, session: &QuizSession) -> Result<QuizReport, QuizError> {
        let questions = self.questions_by_id(&session.question_ids).await?;
        let mut evaluations: HashMap<Uuid, (QuestionAttempt, Option<EvaluationResult>)> = self
            .store
            .session_evaluations(session.id)
            .await?
            .into_iter()
            .map(|(attempt, result)| (attempt.question_id, (attempt, result)))
            .collect();

        let per_question: Vec<PerQuestionResult> = session
            .question_ids
            .iter()
            .filter_map(|id| {
                let question = questions.get(id)?;
                let (attempt, result) = match evaluations.remove(id) {
                    Some((attempt, result)) => (Some(attempt), result),
                    None => (None, None),
                };
                Some(PerQuestionResult::new(
                    question,
                    attempt.as_ref().map(|a| a.user_answer.as_str()),
                    result.as_ref(),
                ))
            })
            .collect();

        let scores: Vec<DimensionScores> = per_question.iter().map(|r| r.scores).collect();
        let aggregated_scores = aggregate(&scores);
        let insights = infer_insights(&scores, aggregated_scores.composite);

        let total_questions = session.question_ids.len();
        let correctness_sum: f64 = scores.iter().filter_map(|s| s.correctness).sum();
        let correctness_percentage = if total_questions == 0 {
            0.0
        } else {
            (correctness_sum / total_questions as f64 * 10_000.0).round() / 100.0
        };

        Ok(QuizReport {
            total_questions,
            correctness_percentage,
            per_question,
            aggregated_scores,
            insights,
        })
    }

    /// Validate and store a new bank question, returning its id.
    pub async fn add_question(&self, new: NewQuestion) -> Result<Uuid, QuizError> {
        let question = validate_new_question(new)?;
        let id = question.id;
        tracing::debug!(question_id = %id, module_id = %question.module_id, "adding question");
        self.store.insert_question(question).await?;
        Ok(id)
    }

    /// Record that the user finished a module's material. Marking again
    /// refreshes the timestamp.
    pub async fn mark_module_complete(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<UserModuleCompletion, QuizError> {
        let row = self
            .store
            .upsert_module_completion(UserModuleCompletion {
                user_id,
                module_id,
                completed_at: Utc::now(),
            })
            .await?;
        tracing::info!(user_id, %module_id, "module marked complete");
        Ok(row)
    }

    pub async fn module_status(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<ModuleStatus, QuizError> {
        let completion = self.store.module_completion(user_id, module_id).await?;
        Ok(ModuleStatus {
            user_id,
            module_id,
            completed: completion.is_some(),
            completed_at: completion.map(|c| c.completed_at),
        })
    }

    /// Aggregates of the user's most recently completed session on a module.
    pub async fn module_understanding(
        &self,
        user_id: UserId,
        module_id: Uuid,
    ) -> Result<Option<ModuleUnderstanding>, QuizError> {
        let Some(session) = self
            .store
            .latest_completed_session(user_id, module_id)
            .await?
        else {
            return Ok(None);
        };
        let report = self.report(&session).await?;
        Ok(Some(ModuleUnderstanding {
            module_id,
            session_id: session.id,
            aggregated_scores: report.aggregated_scores,
            insights: report.insights,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::model::{CorrectAnswer, Difficulty, ModuleContent, QuestionType, FALLBACK_FEEDBACK};
    use crate::store::MemoryStore;
    use crate::subjective::{EvaluatorConfig, RetryPolicy};
    use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

    /// Always answers with the same text and remembers the last prompt.
    struct FixedReply {
        reply: String,
        last_prompt: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl LlmProvider for FixedReply {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
            Ok(GenerateResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn evaluator(provider: Arc<FixedReply>) -> SubjectiveEvaluator {
        SubjectiveEvaluator::new(
            provider,
            EvaluatorConfig {
                call_timeout: Duration::from_secs(5),
                retry: RetryPolicy {
                    max_attempts: 2,
                    initial_backoff: Duration::ZERO,
                    max_backoff: Duration::ZERO,
                },
                ..EvaluatorConfig::default()
            },
        )
    }

    fn fixed(reply: &str) -> Arc<FixedReply> {
        Arc::new(FixedReply {
            reply: reply.to_string(),
            last_prompt: std::sync::Mutex::new(None),
        })
    }

    fn mcq(module_id: Uuid, answer: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            module_id,
            question_type: QuestionType::Mcq,
            difficulty: Difficulty::Easy,
            text: "Pick one".into(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: Some(CorrectAnswer::Single(answer.into())),
            evaluation_rubric: None,
            concept_tags: vec![],
            weight: 1.0,
        }
    }

    fn subjective(module_id: Uuid) -> Question {
        Question {
            id: Uuid::new_v4(),
            module_id,
            question_type: QuestionType::Subjective,
            difficulty: Difficulty::Medium,
            text: "Explain head insertion".into(),
            options: vec![],
            correct_answer: None,
            evaluation_rubric: Some(serde_json::json!({"criteria": ["constant time"]})),
            concept_tags: vec![],
            weight: 1.0,
        }
    }

    async fn seeded(questions: Vec<Question>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_seed(1));
        for q in questions {
            store.insert_question(q).await.unwrap();
        }
        store
    }

    fn answer(session_id: Uuid, question_id: Uuid, text: &str) -> SubmitRequest {
        SubmitRequest {
            session_id,
            question_id,
            user_answer: text.to_string(),
            confidence: 5.0,
        }
    }

    #[tokio::test]
    async fn start_unknown_module_is_not_found() {
        let engine = QuizEngine::new(Arc::new(MemoryStore::new()), None);
        let err = engine.start(1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_then_resume_returns_pending_only() {
        let module = Uuid::new_v4();
        let store = seeded(vec![mcq(module, "A"), mcq(module, "B"), mcq(module, "C")]).await;
        let engine = QuizEngine::new(store, None);

        let started = engine.start(1, module).await.unwrap();
        assert!(!started.resumed);
        assert_eq!(started.questions.len(), 3);

        let first = started.questions[0].id;
        engine
            .submit(1, answer(started.session_id, first, "A"))
            .await
            .unwrap();

        let resumed = engine.start(1, module).await.unwrap();
        assert!(resumed.resumed);
        assert_eq!(resumed.session_id, started.session_id);
        let pending: Vec<Uuid> = resumed.questions.iter().map(|q| q.id).collect();
        let expected: Vec<Uuid> = started.questions[1..].iter().map(|q| q.id).collect();
        assert_eq!(pending, expected);
    }

    #[tokio::test]
    async fn submit_checks_ownership_membership_and_duplicates() {
        let module = Uuid::new_v4();
        let store = seeded(vec![mcq(module, "A"), mcq(module, "B"), mcq(module, "C")]).await;
        let engine = QuizEngine::new(store, None);
        let started = engine.start(1, module).await.unwrap();
        let q = started.questions[0].id;

        let err = engine
            .submit(2, answer(started.session_id, q, "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::NotFound(_)));

        let err = engine
            .submit(1, answer(started.session_id, Uuid::new_v4(), "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Conflict(_)));

        engine.submit(1, answer(started.session_id, q, "A")).await.unwrap();
        let err = engine
            .submit(1, answer(started.session_id, q, "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Conflict(_)));
    }

    #[tokio::test]
    async fn submit_rejects_out_of_range_confidence() {
        let module = Uuid::new_v4();
        let store = seeded(vec![mcq(module, "A")]).await;
        let engine = QuizEngine::new(store, None);
        let started = engine.start(1, module).await.unwrap();
        let mut request = answer(started.session_id, started.questions[0].id, "A");
        request.confidence = 11.0;
        let err = engine.submit(1, request).await.unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));
    }

    #[tokio::test]
    async fn result_reports_progress_until_complete() {
        let module = Uuid::new_v4();
        let store = seeded(vec![mcq(module, "A"), mcq(module, "B"), mcq(module, "C")]).await;
        let engine = QuizEngine::new(store, None);
        let started = engine.start(1, module).await.unwrap();

        let outcome = engine.result(1, started.session_id).await.unwrap();
        match outcome {
            QuizOutcome::InProgress(progress) => {
                assert_eq!(progress.total_questions, 3);
                assert_eq!(progress.questions_needed, 3);
            }
            QuizOutcome::Complete(_) => panic!("session should still be open"),
        }

        let mut last = None;
        for q in &started.questions {
            last = Some(
                engine
                    .submit(1, answer(started.session_id, q.id, "A"))
                    .await
                    .unwrap(),
            );
        }
        assert!(last.unwrap().session_completed);

        let outcome = engine.result(1, started.session_id).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.total_questions, 3);
        assert_eq!(report.correctness_percentage, 33.33);
        let order: Vec<Uuid> = report.per_question.iter().map(|r| r.question_id).collect();
        let expected: Vec<Uuid> = started.questions.iter().map(|q| q.id).collect();
        assert_eq!(order, expected);

        assert!(matches!(
            engine.result(2, started.session_id).await,
            Err(QuizError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subjective_answer_uses_model_scores_and_context() {
        let module = Uuid::new_v4();
        let store = seeded(vec![subjective(module)]).await;
        store
            .put_module_content(ModuleContent {
                module_id: module,
                title: Some("Linked lists".into()),
                content: Some("Nodes point to the next node.".into()),
            })
            .await
            .unwrap();
        let provider = fixed(
            r#"{"correctness": 1.5, "conceptual_depth": 0.5, "reasoning_quality": 0.5, "confidence_alignment": 0.5, "misconceptions": [], "feedback": "Solid."}"#,
        );
        let engine = QuizEngine::new(store.clone(), Some(evaluator(provider.clone())));

        let started = engine.start(1, module).await.unwrap();
        let outcome = engine
            .submit(1, answer(started.session_id, started.questions[0].id, "Only the head changes."))
            .await
            .unwrap();
        assert!(outcome.evaluated);
        assert!(!outcome.fallback);
        assert!(outcome.session_completed);

        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Linked lists\nNodes point to the next node."));

        let evaluations = store.session_evaluations(started.session_id).await.unwrap();
        let result = evaluations[0].1.as_ref().unwrap();
        assert_eq!(result.correctness.as_f64(), 1.0);
        assert_eq!(result.feedback.as_deref(), Some("Solid."));
    }

    #[tokio::test]
    async fn subjective_falls_back_when_model_output_is_unusable() {
        let module = Uuid::new_v4();
        let store = seeded(vec![subjective(module)]).await;
        let engine = QuizEngine::new(store.clone(), Some(evaluator(fixed("not json"))));

        let started = engine.start(1, module).await.unwrap();
        let outcome = engine
            .submit(1, answer(started.session_id, started.questions[0].id, "text"))
            .await
            .unwrap();
        assert!(outcome.evaluated);
        assert!(outcome.fallback);

        let evaluations = store.session_evaluations(started.session_id).await.unwrap();
        let result = evaluations[0].1.as_ref().unwrap();
        assert_eq!(result.feedback.as_deref(), Some(FALLBACK_FEEDBACK));
    }

    #[tokio::test]
    async fn model_zero_score_is_not_reported_as_fallback() {
        let module = Uuid::new_v4();
        let store = seeded(vec![subjective(module)]).await;
        let reply = format!(
            r#"{{"correctness": 0, "conceptual_depth": 0, "reasoning_quality": 0.3, "confidence_alignment": 0.2, "misconceptions": [], "feedback": "{FALLBACK_FEEDBACK}"}}"#
        );
        let engine = QuizEngine::new(store.clone(), Some(evaluator(fixed(&reply))));

        let started = engine.start(1, module).await.unwrap();
        let outcome = engine
            .submit(1, answer(started.session_id, started.questions[0].id, "text"))
            .await
            .unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.message, "Answer recorded.");

        let evaluations = store.session_evaluations(started.session_id).await.unwrap();
        let result = evaluations[0].1.as_ref().unwrap();
        assert_eq!(result.reasoning_quality.as_f64(), 0.3);
    }

    #[tokio::test]
    async fn add_question_validates_before_storing() {
        let store = Arc::new(MemoryStore::new());
        let engine = QuizEngine::new(store.clone(), None);
        let module = Uuid::new_v4();

        let err = engine
            .add_question(NewQuestion {
                module_id: module,
                question_type: QuestionType::Mcq,
                difficulty: Difficulty::Easy,
                text: "Pick".into(),
                options: vec![],
                correct_answer: Some(CorrectAnswer::Single("A".into())),
                evaluation_rubric: None,
                concept_tags: vec![],
                weight: 1.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));

        let id = engine
            .add_question(NewQuestion {
                module_id: module,
                question_type: QuestionType::Subjective,
                difficulty: Difficulty::Hard,
                text: "Explain".into(),
                options: vec![],
                correct_answer: None,
                evaluation_rubric: None,
                concept_tags: vec![],
                weight: 2.0,
            })
            .await
            .unwrap();
        assert!(store.get_question(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn module_understanding_uses_latest_completed_session() {
        let module = Uuid::new_v4();
        let store = seeded(vec![mcq(module, "A")]).await;
        let engine = QuizEngine::new(store, None);
        assert!(engine.module_understanding(1, module).await.unwrap().is_none());

        let started = engine.start(1, module).await.unwrap();
        engine
            .submit(1, answer(started.session_id, started.questions[0].id, "a"))
            .await
            .unwrap();

        let understanding = engine.module_understanding(1, module).await.unwrap().unwrap();
        assert_eq!(understanding.session_id, started.session_id);
        assert_eq!(understanding.aggregated_scores.correctness, 1.0);
        assert_eq!(understanding.aggregated_scores.composite, 0.4);
        assert_eq!(understanding.insights.strengths, vec!["Correctness"]);
    }

    #[tokio::test]
    async fn module_status_follows_completion_marks() {
        let engine = QuizEngine::new(Arc::new(MemoryStore::new()), None);
        let module = Uuid::new_v4();

        let status = engine.module_status(1, module).await.unwrap();
        assert!(!status.completed);
        assert!(status.completed_at.is_none());

        let first = engine.mark_module_complete(1, module).await.unwrap();
        let status = engine.module_status(1, module).await.unwrap();
        assert!(status.completed);
        assert_eq!(status.completed_at, Some(first.completed_at));

        let again = engine.mark_module_complete(1, module).await.unwrap();
        assert!(again.completed_at >= first.completed_at);
        let status = engine.module_status(1, module).await.unwrap();
        assert_eq!(status.completed_at, Some(again.completed_at));

        assert!(!engine.module_status(2, module).await.unwrap().completed);
    }
}
