//! OpenAI-compatible chat completions backend.
//!
//! Works with any endpoint speaking the `/chat/completions` dialect,
//! including Gemini's OpenAI compatibility layer.

use super::{Connector, Session};
use crate::config::ApiConfig;
use crate::error::RemoteError;
use crate::utils::check_response_status;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body for the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

/// A message in the conversation.
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response from the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

/// A single choice in the response.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Message content in a response.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Connector for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiConnector {
    base_url: String,
    timeout: Duration,
    verify_on_connect: bool,
}

impl OpenAiConnector {
    /// Creates a connector from the API section of the config.
    pub fn new(api_config: &ApiConfig) -> Self {
        Self {
            base_url: api_config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(api_config.request_timeout_sec),
            verify_on_connect: api_config.verify_on_connect,
        }
    }

    fn build_client(&self, credential: &str) -> Result<Client, RemoteError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential))
            .map_err(|_| RemoteError::Other("API key contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| RemoteError::Other(format!("Failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Connector for OpenAiConnector {
    fn name(&self) -> &'static str {
        "OpenAI-compatible"
    }

    async fn connect(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<Box<dyn Session>, RemoteError> {
        if credential.trim().is_empty() {
            return Err(RemoteError::Other("API key is empty".to_string()));
        }
        if model.trim().is_empty() {
            return Err(RemoteError::Other("model identifier is empty".to_string()));
        }

        let client = self.build_client(credential)?;

        if self.verify_on_connect {
            let url = format!("{}/models", self.base_url);
            let response = client.get(&url).send().await?;
            check_response_status(response).await?;
        }

        Ok(Box::new(OpenAiSession {
            client,
            url: format!("{}/chat/completions", self.base_url),
            model: model.to_string(),
        }))
    }
}

/// Session bound to one key/model pair.
struct OpenAiSession {
    client: Client,
    url: String,
    model: String,
}

#[async_trait]
impl Session for OpenAiSession {
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let response = check_response_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Other(format!("Failed to parse API response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(RemoteError::EmptyResponse)
    }
}
