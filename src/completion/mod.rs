//! Text completion providers

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
pub mod mock;
pub mod openai;

pub use mock::{MockCompletionMode, MockCompletionProvider};
pub use openai::OpenAiProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// One chat-style completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutput {
    /// Generated text, whitespace-trimmed
    pub text: String,
    pub total_tokens: Option<u32>,
    pub model: String,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, request: CompletionRequest)
    -> Result<CompletionOutput, ProviderError>;

    /// Model identifier reported on generation records
    fn model(&self) -> &str;
}
