use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

use super::{normalize, ModelClient, ModelReply, UpstreamError, BUSINESS_CONTEXT};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const TEMPERATURE: f32 = 0.3;
pub const MAX_TOKENS: u32 = 200;

#[derive(Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

// Keep the bearer token out of logs.
impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &"****")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GROQ_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `GROQ_API_KEY` (required) and `GROQ_MODEL` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .context("Missing GROQ_API_KEY: set it in the environment or .env before starting")?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GROQ_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Value,
}

pub struct GroqClient {
    client: Client,
    config: GroqConfig,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ModelClient for GroqClient {
    async fn ask(&self, question: &str) -> Result<ModelReply, UpstreamError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: BUSINESS_CONTEXT },
                ChatMessage { role: "user", content: question },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!("Sending question to Groq model {}", self.config.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Groq returned {}: {}", status, body);
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::InvalidResponse("no choices in response".to_string()))?;

        Ok(normalize(&choice.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Option<(HeaderMap, Value)>>>;

    async fn spawn_mock(status: StatusCode, body: Value, captured: Captured) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(req): Json<Value>| {
                let captured = captured.clone();
                let body = body.clone();
                async move {
                    *captured.lock().unwrap() = Some((headers, req));
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> GroqClient {
        GroqClient::new(GroqConfig::new("gsk_test").with_base_url(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_ask_sends_policy_and_sanitizes_reply() {
        let captured: Captured = Arc::default();
        let base = spawn_mock(
            StatusCode::OK,
            json!({"choices": [{"message": {"content": "As an AI,  we   do brake\ninspections."}}]}),
            captured.clone(),
        )
        .await;

        let reply = client_for(base).ask("Do you do brake inspections?").await.unwrap();
        assert_eq!(reply.text, "we do brake inspections.");
        assert_eq!(reply.confidence, None);

        let (headers, req) = captured.lock().unwrap().take().unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer gsk_test");
        assert_eq!(req["model"], DEFAULT_MODEL);
        assert_eq!(req["max_tokens"], MAX_TOKENS);
        assert!(req["temperature"].as_f64().unwrap() < 0.5);
        assert_eq!(req["messages"][0]["role"], "system");
        assert_eq!(req["messages"][0]["content"], BUSINESS_CONTEXT);
        assert_eq!(req["messages"][1]["role"], "user");
        assert_eq!(req["messages"][1]["content"], "Do you do brake inspections?");
    }

    #[tokio::test]
    async fn test_ask_unpacks_structured_content() {
        let base = spawn_mock(
            StatusCode::OK,
            json!({"choices": [{"message": {"content": {"text": "Open at 9.", "confidence": 0.5}}}]}),
            Arc::default(),
        )
        .await;

        let reply = client_for(base).ask("When do you open?").await.unwrap();
        assert_eq!(reply.text, "Open at 9.");
        assert_eq!(reply.confidence, Some(0.5));
    }

    #[tokio::test]
    async fn test_ask_surfaces_provider_error_body() {
        let base = spawn_mock(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"message": "Rate limit reached"}}),
            Arc::default(),
        )
        .await;

        let err = client_for(base).ask("hello").await.unwrap_err();
        match &err {
            UpstreamError::Status { status, body } => {
                assert_eq!(*status, 429);
                assert!(body.contains("Rate limit reached"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().starts_with("Groq API error: {"));
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_choices() {
        let base = spawn_mock(StatusCode::OK, json!({"choices": []}), Arc::default()).await;
        let err = client_for(base).ask("hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = GroqConfig::new("gsk_secret_value");
        assert!(!format!("{:?}", config).contains("gsk_secret_value"));
    }
}
