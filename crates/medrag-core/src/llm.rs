//! Language-model abstraction.

use anyhow::Result;
use async_trait::async_trait;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Generate a completion. `Ok(None)` means the model returned no content.
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>>;
}
