//! Completion-backend implementations.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! OpenAI-compatible `/chat/completions` endpoint. Connection profiles map
//! a profile id to an endpoint, key, and model; one backend instance can
//! serve any number of profiles.
//!
//! Non-streaming only. Responses are decoded through
//! [`BackendReply::from_json`] so provider shape quirks stay out of the
//! calling code.

use std::collections::HashMap;

use async_trait::async_trait;
use tidbit_core::backend::{BackendReply, ChatMessage, PrimaryBackend, ProfileBackend};
use tidbit_core::error::BackendError;
use tracing::{debug, warn};

/// One named connection profile: where to send the request and as whom.
#[derive(Clone)]
pub struct ProfileSpec {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for ProfileSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSpec")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish()
    }
}

impl ProfileSpec {
    /// Create a profile for an arbitrary OpenAI-compatible endpoint.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Create an OpenAI profile (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", api_key, model)
    }

    /// Create an OpenRouter profile (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama profile (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }
}

/// An OpenAI-compatible profile backend.
///
/// This handles the vast majority of hosted and local model endpoints
/// since most expose an OpenAI-compatible `/chat/completions` route.
pub struct OpenAiCompatBackend {
    name: String,
    profiles: HashMap<String, ProfileSpec>,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new backend with no profiles registered.
    pub fn new(name: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            profiles: HashMap::new(),
            client,
        })
    }

    /// Register a connection profile under the given id.
    pub fn with_profile(mut self, id: impl Into<String>, spec: ProfileSpec) -> Self {
        self.profiles.insert(id.into(), spec);
        self
    }

    /// The ids of all registered profiles, unordered.
    pub fn profile_ids(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    fn profile(&self, id: &str) -> Result<&ProfileSpec, BackendError> {
        self.profiles.get(id).ok_or_else(|| {
            BackendError::NotConfigured(format!("unknown connection profile: {id}"))
        })
    }
}

#[async_trait]
impl ProfileBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        profile_id: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> std::result::Result<BackendReply, BackendError> {
        let spec = self.profile(profile_id)?;
        let url = format!("{}/chat/completions", spec.base_url);

        let body = serde_json::json!({
            "model": spec.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": false,
        });

        debug!(backend = %self.name, profile = %profile_id, model = %spec.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", spec.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(e.to_string())
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(BackendError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let value: serde_json::Value =
            response.json().await.map_err(|e| BackendError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(BackendReply::from_json(&value))
    }
}

/// Adapts a [`ProfileBackend`] into a [`PrimaryBackend`] by rendering the
/// quiet-prompt call shape as a two-message chat: the context transcript
/// as the system message, the instruction as the user message.
///
/// Useful when the host has no native quiet-prompt connection and
/// everything goes through one chat endpoint.
pub struct PrimaryOverProfile<B> {
    inner: B,
    profile_id: String,
}

impl<B: ProfileBackend> PrimaryOverProfile<B> {
    pub fn new(inner: B, profile_id: impl Into<String>) -> Self {
        Self {
            inner,
            profile_id: profile_id.into(),
        }
    }
}

#[async_trait]
impl<B: ProfileBackend> PrimaryBackend for PrimaryOverProfile<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        context: &str,
        instruction: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        let mut messages = Vec::with_capacity(2);
        if !context.is_empty() {
            messages.push(ChatMessage::system(context));
        }
        messages.push(ChatMessage::user(instruction));

        let reply = self.inner.send(&self.profile_id, messages, max_tokens).await?;
        Ok(reply.into_text())
    }
}
