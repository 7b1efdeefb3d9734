use super::{CompletionOutput, CompletionProvider, CompletionRequest, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Debug)]
pub enum MockCompletionMode {
    /// Echo the user prompt back inside a canned answer
    Success,
    /// Always fail with an upstream status error
    Failure,
}

/// In-process provider for tests
#[derive(Clone)]
pub struct MockCompletionProvider {
    mode: MockCompletionMode,
    calls: Arc<AtomicUsize>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self::with_mode(MockCompletionMode::Success)
    }

    pub fn failing() -> Self {
        Self::with_mode(MockCompletionMode::Failure)
    }

    pub fn with_mode(mode: MockCompletionMode) -> Self {
        Self {
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `generate` calls so far, shared between clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            MockCompletionMode::Success => Ok(CompletionOutput {
                text: format!("Mock content for: {}", request.user_prompt.trim()),
                total_tokens: Some(42),
                model: self.model().to_string(),
            }),
            MockCompletionMode::Failure => Err(ProviderError::Status {
                status: 503,
                body: "mock provider unavailable".to_string(),
            }),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
