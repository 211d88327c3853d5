//! Topic classifier backed by the OpenAI chat completions API.
//!
//! The model is constrained to a JSON schema with a single boolean field, so
//! a usable answer always parses as `{"isOnTopic": bool}`.

use super::Classifier;
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub struct OpenAiClassifier {
    client: HttpClient,
    api_key: String,
    api_base: String,
    model: String,
    topic: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: serde_json::Value,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    /// Null when the model refuses
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicVerdict {
    is_on_topic: bool,
}

impl OpenAiClassifier {
    /// `None` when no API key is configured.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>, ClassifierError> {
        let api_key = match &config.api_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => return Ok(None),
        };

        let client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Some(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            topic: config.topic.clone(),
        }))
    }

    fn build_request(&self, text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You moderate a social media feed about {topic} and keep it on topic. \
                         For each post, answer true if the post is about {topic} and false \
                         otherwise. Posts about politics are not about {topic}.",
                        topic = self.topic
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Is this post about {}?\n\n{}", self.topic, text),
                },
            ],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "topic_verdict",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": { "isOnTopic": { "type": "boolean" } },
                        "required": ["isOnTopic"],
                        "additionalProperties": false
                    }
                }
            }),
            temperature: 0.0,
        }
    }
}

fn parse_verdict(response: ChatCompletionResponse) -> Result<bool, ClassifierError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ClassifierError::NoVerdict("empty completion".to_string()))?;

    serde_json::from_str::<TopicVerdict>(&content)
        .map(|verdict| verdict.is_on_topic)
        .map_err(|e| ClassifierError::NoVerdict(e.to_string()))
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn is_on_topic(&self, text: &str) -> Result<bool, ClassifierError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::NoVerdict(e.to_string()))?;
        parse_verdict(body)
    }
}
