use super::{GenerateOptions, GeneratorError, TextGenerator};
use crate::config::GeneratorConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    /// Some reasoning models answer here instead of in `content`.
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl HttpGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() || api_key == PLACEHOLDER_API_KEY {
            return Err(GeneratorError::Config(
                "LLM_API_KEY is not set. Add it to your environment or .env file.".to_string(),
            ));
        }
        let base_url = config.api_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(GeneratorError::Config("LLM_API_URL is not set.".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GeneratorError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        })
    }

    /// Endpoints tried in order; later ones are only used after a 404.
    fn endpoints(&self) -> [String; 3] {
        let prefix = if self.base_url.contains("/v1") { "" } else { "/v1" };
        [
            format!("{prefix}/chat/completions"),
            format!("{prefix}/models/{}/chat/completions", urlencoding::encode(&self.model)),
            "/chat/completions".to_string(),
        ]
    }

    async fn post(
        &self,
        endpoint: &str,
        body: &ChatRequest<'_>,
    ) -> Result<reqwest::Response, GeneratorError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, model = %self.model, max_tokens = body.max_tokens, "sending chat completion");
        self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GeneratorError::Request(format!("{e} (URL: {url})")))
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GeneratorError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let endpoints = self.endpoints();
        let mut response = None;
        for endpoint in &endpoints {
            let current = self.post(endpoint, &body).await?;
            if current.status() == StatusCode::NOT_FOUND {
                warn!(%endpoint, "endpoint returned 404, trying next");
                response = Some(current);
                continue;
            }
            response = Some(current);
            break;
        }
        let response = response.ok_or(GeneratorError::EmptyResponse)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GeneratorError::Decode(e.to_string()))?;
        if !status.is_success() {
            return Err(error_from_body(status, text));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| GeneratorError::Decode(e.to_string()))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(GeneratorError::EmptyResponse)?
            .message;
        Ok(message_text(message))
    }
}

fn message_text(message: ChoiceMessage) -> String {
    message
        .content
        .filter(|content| !content.is_empty())
        .or(message.reasoning_content)
        .unwrap_or_default()
}

fn error_from_body(status: StatusCode, body: String) -> GeneratorError {
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => GeneratorError::Api(parsed.error.message),
        Err(_) => GeneratorError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> GeneratorConfig {
        GeneratorConfig {
            api_url: url.to_string(),
            api_key: "test-key".to_string(),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn rejects_missing_or_placeholder_key() {
        let mut cfg = config("https://example.com");
        cfg.api_key = String::new();
        assert!(matches!(HttpGenerator::new(&cfg), Err(GeneratorError::Config(_))));
        cfg.api_key = PLACEHOLDER_API_KEY.to_string();
        assert!(matches!(HttpGenerator::new(&cfg), Err(GeneratorError::Config(_))));
    }

    #[test]
    fn endpoints_respect_versioned_base() {
        let generator = HttpGenerator::new(&config("https://example.com/")).unwrap();
        assert_eq!(generator.base_url, "https://example.com");
        let endpoints = generator.endpoints();
        assert_eq!(endpoints[0], "/v1/chat/completions");
        assert_eq!(
            endpoints[1],
            "/v1/models/nvidia%2Fnvidia-nemotron-nano-9b-v2/chat/completions"
        );
        assert_eq!(endpoints[2], "/chat/completions");

        let generator = HttpGenerator::new(&config("https://example.com/v1")).unwrap();
        assert_eq!(generator.endpoints()[0], "/chat/completions");
    }

    #[test]
    fn prefers_content_over_reasoning() {
        let message = ChoiceMessage {
            content: Some("flowchart TD".to_string()),
            reasoning_content: Some("thinking".to_string()),
        };
        assert_eq!(message_text(message), "flowchart TD");
        let message = ChoiceMessage {
            content: None,
            reasoning_content: Some("===MERMAID_CODE===".to_string()),
        };
        assert_eq!(message_text(message), "===MERMAID_CODE===");
    }

    #[test]
    fn api_error_bodies_are_unwrapped() {
        let err = error_from_body(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"rate limited","type":"quota"}}"#.to_string(),
        );
        assert_eq!(err.to_string(), "LLM API error: rate limited");
        let err = error_from_body(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(err.to_string(), "LLM API request failed: 502 - upstream down");
    }
}
