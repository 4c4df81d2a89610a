//! Gemini API client for chat completion
//!
//! Centralizes all calls to the AI provider so CRM, pipeline and worker code
//! share one integration point and the provider can be swapped later.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::{AppError, AppResult};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    chat_model: String,
    base_url: String,
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in a chat exchange
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: Option<i64>,
    message: Option<String>,
}

impl GeminiClient {
    /// Create a client from configuration
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    fn ensure_api_key(&self) -> AppResult<&str> {
        if self.api_key.is_empty() {
            return Err(AppError::Configuration(
                "Gemini API key is not configured".to_string(),
            ));
        }
        Ok(&self.api_key)
    }

    /// Chat completion over role-tagged messages
    ///
    /// System and assistant turns are flattened into the single prompt the
    /// generateContent endpoint expects.
    pub async fn chat(&self, messages: &[ChatMessage]) -> AppResult<String> {
        let api_key = self.ensure_api_key()?;

        let mut prompt_parts: Vec<String> = Vec::with_capacity(messages.len());
        for msg in messages {
            match msg.role {
                ChatRole::System => prompt_parts.push(format!(
                    "[System Instructions]\n{}\n[/System Instructions]",
                    msg.content
                )),
                ChatRole::User => prompt_parts.push(msg.content.clone()),
                ChatRole::Assistant => prompt_parts.push(format!(
                    "[Previous Response]\n{}\n[/Previous Response]",
                    msg.content
                )),
            }
        }
        let prompt = prompt_parts.join("\n\n");

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.chat_model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .timeout(CHAT_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::AiProvider(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::AiProvider(format!("invalid chat response: {}", e)))?;

        let Some(candidate) = data.candidates.into_iter().next() else {
            if let Some(reason) = data.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(AppError::AiProvider(format!(
                    "prompt blocked, reason: {}",
                    reason
                )));
            }
            return Ok(String::new());
        };

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }

    async fn error_from_response(response: reqwest::Response) -> AppError {
        let status = response.status();
        match response.json::<ApiErrorResponse>().await {
            Ok(body) => {
                let detail = body.error.unwrap_or(ApiErrorDetail {
                    code: None,
                    message: None,
                });
                AppError::AiProvider(format!(
                    "error {}: {}",
                    detail.code.unwrap_or_else(|| status.as_u16() as i64),
                    detail.message.unwrap_or_else(|| status.to_string())
                ))
            }
            Err(_) => AppError::AiProvider(format!("error {}", status)),
        }
    }
}
