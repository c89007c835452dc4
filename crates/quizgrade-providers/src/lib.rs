//! quizgrade-providers: language-model clients.
//!
//! Implements the `LlmProvider` trait for Anthropic and Gemini, plus a
//! scripted mock, so the subjective grader can run against any backend.

pub mod anthropic;
pub mod config;
pub mod gemini;
pub mod mock;

pub use config::{create_provider, load_config, load_config_from, ProviderConfig, QuizgradeConfig};
pub use quizgrade_core::error::ProviderError;
