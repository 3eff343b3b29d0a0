//! Text-generation capability the pipeline calls once per attempt.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpGenerator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator configuration error: {0}")]
    Config(String),
    #[error("LLM request failed: {0}")]
    Request(String),
    #[error("LLM API request failed: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("No response from LLM API")]
    EmptyResponse,
    #[error("Failed to decode LLM API response: {0}")]
    Decode(String),
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError> {
        (**self).generate(prompt, options).await
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError> {
        (**self).generate(prompt, options).await
    }
}
