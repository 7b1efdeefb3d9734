use super::config::CompletionConfig;
use super::{CompletionOutput, CompletionProvider, CompletionRequest, ProviderError};
use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const TOP_P: f32 = 0.9;
const FREQUENCY_PENALTY: f32 = 0.1;
const PRESENCE_PENALTY: f32 = 0.1;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenAiProvider {
    pub fn new(config: CompletionConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionBody<'a> {
        ChatCompletionBody {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
        }
    }
}

fn parse_response(
    raw: &str,
    fallback_model: &str,
) -> Result<CompletionOutput, ProviderError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(raw).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("response has no content".to_string()))?;

    Ok(CompletionOutput {
        text,
        total_tokens: response.usage.map(|usage| usage.total_tokens),
        model: response
            .model
            .unwrap_or_else(|| fallback_model.to_string()),
    })
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutput, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "completion.api_key is empty".to_string(),
            ));
        }

        debug!(model = %self.config.model, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !status.is_success() {
            error!(status = status.as_u16(), "Completion provider returned an error");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: raw,
            });
        }

        parse_response(&raw, &self.config.model)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl HealthChecker for OpenAiProvider {
    fn name(&self) -> &str {
        "completion"
    }

    async fn check(&self) -> HealthCheckResult {
        if self.config.api_key.is_empty() {
            HealthCheckResult::degraded_with_details(
                "Completion API key not configured".to_string(),
                serde_json::json!({ "model": self.config.model }),
            )
        } else {
            HealthCheckResult::healthy_with_details(serde_json::json!({
                "model": self.config.model,
                "base_url": self.config.base_url,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(CompletionConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:1/v1/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider();
        let request = CompletionRequest {
            system_prompt: "system".to_string(),
            user_prompt: "user".to_string(),
        };
        let body = serde_json::to_value(provider.body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(provider.endpoint(), "http://localhost:1/v1/chat/completions");
    }

    #[test]
    fn test_parse_response_trims_and_reads_usage() {
        let raw = r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [{"message": {"role": "assistant", "content": "  Hola mundo \n"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let output = parse_response(raw, "fallback").unwrap();
        assert_eq!(output.text, "Hola mundo");
        assert_eq!(output.total_tokens, Some(15));
        assert_eq!(output.model, "gpt-3.5-turbo-0125");
    }

    #[test]
    fn test_parse_response_rejects_empty_choices() {
        let raw = r#"{"choices": []}"#;
        assert!(matches!(
            parse_response(raw, "fallback"),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(parse_response("not json", "fallback").is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let provider = OpenAiProvider::new(CompletionConfig::default()).unwrap();
        let result = provider
            .generate(CompletionRequest {
                system_prompt: String::new(),
                user_prompt: "topic".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
