//! Mock provider for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use quizgrade_core::error::ProviderError;
use quizgrade_core::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text as the model output.
    Text(String),
    /// Fail the call with a network error carrying this message.
    Error(String),
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }
}

/// A mock LLM provider for exercising the grader without real API calls.
///
/// Scripted replies are consumed in order; once they run out every call
/// gets the default reply.
pub struct MockProvider {
    script: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Replies in order, then an empty evaluation object.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            default_reply: MockReply::text("{}"),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock that always returns the same text.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::scripted(Vec::new()).with_default(MockReply::text(response))
    }

    /// Replace the reply used after the script runs out.
    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this provider.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        let content = match reply {
            MockReply::Text(content) => content,
            MockReply::Error(message) => return Err(ProviderError::NetworkError(message).into()),
        };

        // Rough estimate
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "mock-model".into(),
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let provider = MockProvider::with_fixed_response(r#"{"correctness": 1}"#);
        let response = provider.generate(&request("anything")).await.unwrap();
        assert_eq!(response.content, r#"{"correctness": 1}"#);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn script_then_default() {
        let provider = MockProvider::scripted(vec![
            MockReply::error("connection reset"),
            MockReply::text("not json"),
        ]);

        let err = provider.generate(&request("first")).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        let second = provider.generate(&request("second")).await.unwrap();
        assert_eq!(second.content, "not json");

        let third = provider.generate(&request("third")).await.unwrap();
        assert_eq!(third.content, "{}");

        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.last_request().unwrap().prompt, "third");
    }
}
