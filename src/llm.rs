use crate::config::LlmSettings;
use crate::error::{QueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Text generation capability: messages in, text out.
///
/// Implementations neither retry nor cache; every call is a fresh round trip.
/// Transport and upstream failures surface as
/// [`QueryError::RemoteGeneration`].
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            settings.api_key.clone(),
            settings.model.clone(),
            settings.base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a trivial prompt so the first real request does not pay for
    /// model loading. Failures are logged, never returned.
    pub async fn warm_up(&self) {
        info!("Warming up model: {}", self.model);
        match self.generate(&[ChatMessage::user("SELECT 1;")]).await {
            Ok(_) => info!("Model {} is ready", self.model),
            Err(e) => warn!("Failed to warm up model {}: {}", self.model, e),
        }
    }

    async fn call_llm(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.1,
            "stream": false,
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::RemoteGeneration(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QueryError::RemoteGeneration(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            QueryError::RemoteGeneration(format!("Failed to parse LLM response: {}", e))
        })?;

        extract_content(&response_json)
    }
}

#[async_trait]
impl GenerationClient for LlmClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        info!("Sending request to model: {}", self.model);
        debug!("Messages: {:?}", messages);
        self.call_llm(messages).await
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(QueryError::RemoteGeneration(format!("LLM API error: {}", error)));
    }

    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            QueryError::RemoteGeneration(format!(
                "No choices array in LLM response. Response: {}",
                response_json
            ))
        })?;

    let first = choices
        .first()
        .ok_or_else(|| QueryError::RemoteGeneration("Empty choices array in LLM response".to_string()))?;

    if first.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
        warn!("LLM response was truncated due to length limit");
    }

    let content = first["message"]["content"].as_str().ok_or_else(|| {
        QueryError::RemoteGeneration(format!("No content in LLM response. Response: {}", first))
    })?;

    if content.trim().is_empty() {
        return Err(QueryError::RemoteGeneration("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}
