use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{LlmError, Result};
use super::prompts;
use crate::config::GroqConfig;
use crate::game_logic::{AnswerOracle, QuestionSource, Theme};

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(LlmError::EmptyCompletion)
    }
}

/// Groq chat-completions client. Serves as both Question Source and Answer
/// Oracle.
#[derive(Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn from_config(config: &GroqConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: completions_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    #[tracing::instrument(skip(self, system, user), fields(model = %self.model))]
    async fn chat(&self, system: &str, user: &str, temperature: Option<f32>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error body".to_string());
            tracing::error!(status = %status, body = %body, "Chat completion request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<ChatCompletionResponse>().await?.into_content()
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl QuestionSource for GroqClient {
    async fn generate_question(&self, theme: Theme, exclude: &[String]) -> Result<String> {
        let prompt = prompts::question_prompt(theme, exclude);
        self.chat(
            prompts::QUESTION_SYSTEM_PROMPT,
            &prompt,
            Some(self.temperature),
        )
        .await
    }
}

#[async_trait]
impl AnswerOracle for GroqClient {
    async fn answer(&self, question_block: &str) -> Result<String> {
        let prompt = prompts::answer_prompt(question_block);
        self.chat(prompts::ANSWER_SYSTEM_PROMPT, &prompt, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        assert_eq!(
            completions_endpoint("https://api.groq.com/openai/v1/"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:8080/v1"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_omits_missing_temperature() {
        let request = ChatCompletionRequest {
            model: "llama-3.1-8b-instant",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_takes_first_choice_trimmed() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  2\n"}},{"index":1,"message":{"role":"assistant","content":"3"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_content().unwrap(), "2");
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            response.into_content(),
            Err(LlmError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_client_builds_from_config() {
        let config = GroqConfig {
            api_key: "gsk_test".to_string(),
            ..GroqConfig::default()
        };
        let client = GroqClient::from_config(&config).unwrap();
        assert_eq!(
            client.endpoint,
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
