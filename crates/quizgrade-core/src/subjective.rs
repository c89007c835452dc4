//! Model-assisted grading of free-text answers.
//!
//! One evaluation is: build a prompt, call the model, parse its reply into
//! four clamped dimensions. A failed call or an unreadable reply is retried
//! with the identical prompt; when the retries are spent the evaluator
//! reports a [`PipelineFailure`] instead of inventing a score.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::error::ProviderError;
use crate::model::{EvaluationResult, UnitScore};
use crate::traits::{GenerateRequest, LlmProvider, DEFAULT_SYSTEM_PROMPT};

/// Module context beyond this many characters is cut from the prompt.
pub const MAX_CONTEXT_CHARS: usize = 3000;

/// Stored feedback is cut to this many characters.
pub const MAX_FEEDBACK_CHARS: usize = 500;

const NO_ANSWER_MARKER: &str = "(No answer provided)";
const NO_CONTEXT_MARKER: &str = "No additional context.";

/// Everything the prompt is built from.
#[derive(Debug, Clone)]
pub struct SubjectiveInput<'a> {
    pub question_text: &'a str,
    pub rubric: Option<&'a Value>,
    pub user_answer: &'a str,
    pub module_context: Option<&'a str>,
}

/// The four dimensions plus free-text findings, already clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectiveScores {
    pub correctness: UnitScore,
    pub conceptual_depth: UnitScore,
    pub reasoning_quality: UnitScore,
    pub confidence_alignment: UnitScore,
    pub misconceptions: Vec<String>,
    pub feedback: String,
}

impl SubjectiveScores {
    pub fn into_result(self, attempt_id: uuid::Uuid) -> EvaluationResult {
        EvaluationResult {
            attempt_id,
            correctness: self.correctness,
            conceptual_depth: self.conceptual_depth,
            reasoning_quality: self.reasoning_quality,
            confidence_alignment: self.confidence_alignment,
            misconceptions: self.misconceptions,
            feedback: Some(self.feedback),
        }
    }
}

/// Why the pipeline gave up after its last attempt.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("model call failed: {0}")]
    Call(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model reply was not a valid evaluation object")]
    Unparseable,
}

/// Fixed-count retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total calls, including the first. Two means one retry.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay, including provider hints.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Configuration for the subjective evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Applied to every call separately, including retries.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Build the grading prompt. Pure function of its input.
pub fn build_prompt(input: &SubjectiveInput<'_>) -> String {
    let context: String = input
        .module_context
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_CONTEXT_CHARS)
        .collect();
    let context = if context.is_empty() {
        NO_CONTEXT_MARKER.to_string()
    } else {
        context
    };

    let rubric = input
        .rubric
        .and_then(|r| serde_json::to_string_pretty(r).ok())
        .unwrap_or_else(|| "{}".to_string());

    let answer = if input.user_answer.trim().is_empty() {
        NO_ANSWER_MARKER
    } else {
        input.user_answer
    };

    format!(
        r#"Evaluate the following answer to a subjective question strictly against the rubric.

Module context (reference only):
{context}

Evaluation rubric:
{rubric}

Question:
{question}

Learner's answer:
{answer}

Rules:
- Do NOT teach, give hints, or reveal the correct answer, not even in the feedback.
- Score every dimension from 0.0 to 1.0. When uncertain, score lower.
- Output exactly one JSON object and no other text, with exactly these keys:
  correctness, conceptual_depth, reasoning_quality, confidence_alignment,
  misconceptions (array of strings), feedback (short, neutral string that does not reveal the answer).
- Example: {{"correctness": 0.7, "conceptual_depth": 0.6, "reasoning_quality": 0.5, "confidence_alignment": 0.8, "misconceptions": [], "feedback": "Review how the definition applies to edge cases."}}
"#,
        question = input.question_text,
    )
}

/// Leftmost `{...}` span that contains no other braces.
fn first_flat_object(text: &str) -> Option<&str> {
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => start = Some(i),
            '}' => {
                if let Some(s) = start {
                    return Some(&text[s..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Missing or null is zero; numbers, numeric strings and booleans coerce;
/// anything else makes the reply unusable.
fn coerce_dimension(object: &Map<String, Value>, key: &str) -> Option<UnitScore> {
    let value = match object.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(_) => return None,
    };
    Some(UnitScore::from_f64(value))
}

/// Parse a model reply into scores, or `None` if it is unusable.
pub fn parse_reply(text: &str) -> Option<SubjectiveScores> {
    let text = text.trim();
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(first_flat_object(text)?).ok()?,
    };
    let Value::Object(object) = value else {
        return None;
    };

    let misconceptions = match object.get("misconceptions") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let feedback = match object.get("feedback") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Some(SubjectiveScores {
        correctness: coerce_dimension(&object, "correctness")?,
        conceptual_depth: coerce_dimension(&object, "conceptual_depth")?,
        reasoning_quality: coerce_dimension(&object, "reasoning_quality")?,
        confidence_alignment: coerce_dimension(&object, "confidence_alignment")?,
        misconceptions,
        feedback: feedback.chars().take(MAX_FEEDBACK_CHARS).collect(),
    })
}

/// Grades subjective answers through an injected model client.
pub struct SubjectiveEvaluator {
    provider: Arc<dyn LlmProvider>,
    config: EvaluatorConfig,
}

impl SubjectiveEvaluator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: EvaluatorConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run the full pipeline for one answer.
    #[instrument(skip(self, input), fields(provider = %self.provider.name()))]
    pub async fn evaluate(
        &self,
        input: &SubjectiveInput<'_>,
    ) -> Result<SubjectiveScores, PipelineFailure> {
        let prompt = build_prompt(input);
        tracing::debug!(prompt_chars = prompt.len(), "built evaluation prompt");

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let retry = &self.config.retry;
        let mut delay = retry.initial_backoff;
        let mut last_failure = PipelineFailure::Unparseable;

        for attempt in 1..=retry.max_attempts.max(1) {
            if attempt > 1 {
                tokio::time::sleep(delay.min(retry.max_backoff)).await;
                delay = (delay * 2).min(retry.max_backoff);
            }

            match tokio::time::timeout(self.config.call_timeout, self.provider.generate(&request))
                .await
            {
                Ok(Ok(response)) => match parse_reply(&response.content) {
                    Some(scores) => return Ok(scores),
                    None => {
                        tracing::warn!(attempt, "model reply could not be parsed");
                        last_failure = PipelineFailure::Unparseable;
                    }
                },
                Ok(Err(e)) => {
                    tracing::warn!(attempt, "model call failed: {e:#}");
                    if let Some(ms) = e
                        .downcast_ref::<ProviderError>()
                        .and_then(ProviderError::retry_after_ms)
                    {
                        delay = Duration::from_millis(ms);
                    }
                    last_failure = PipelineFailure::Call(e.to_string());
                }
                Err(_) => {
                    tracing::warn!(attempt, timeout = ?self.config.call_timeout, "model call timed out");
                    last_failure = PipelineFailure::Timeout(self.config.call_timeout);
                }
            }
        }

        Err(last_failure)
    }
}
