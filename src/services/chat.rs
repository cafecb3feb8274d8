use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use super::ensure_success;
use crate::error::ServiceError;

const CHAT_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_TOKENS: u32 = 400;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Cliente del endpoint de chat completions
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, url: String, api_key: String) -> Self {
        Self { http, url, api_key }
    }

    /// Envía la pregunta con el prompt de sistema indicado.
    pub async fn ask(&self, system_prompt: &str, query: &str) -> Result<String, ServiceError> {
        debug!("🤖 Consultando GPT ({} caracteres)", query.chars().count());

        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&chat_body(system_prompt, query))
            .timeout(CHAT_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!("Error de red con Azure GPT: {}", e);
                ServiceError::from(e)
            })?;

        let completion: ChatCompletion = ensure_success(response).await?.json().await?;
        extract_reply(completion)
    }
}

fn chat_body(system_prompt: &str, query: &str) -> Value {
    json!({
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": query}
        ],
        "max_tokens": MAX_TOKENS
    })
}

fn extract_reply(completion: ChatCompletion) -> Result<String, ServiceError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ServiceError::EmptyReply)
}
