//! Completion backend traits — the abstraction over text generation.
//!
//! Two call shapes exist, mirroring the two ways a host exposes its model
//! connection:
//!
//! - **Primary**: a single "quiet" call taking a flat context string and an
//!   instruction string, returning plain text directly.
//! - **Profile**: a chat-completion call taking role-tagged messages and a
//!   token budget, addressed to a named connection profile. Its response
//!   shape varies by provider and is normalized through [`BackendReply`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Role tag for a profile-backend message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to a profile backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// The normalized shape of a profile-backend response.
///
/// Providers return anything from a bare string to a full chat-completion
/// envelope; implementations decode into this sum type and [`BackendReply::into_text`]
/// is the single place the variants collapse to plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// A bare text response.
    PlainText(String),

    /// A chat-completion message, possibly with the text in the reasoning
    /// field instead of the content field.
    ChatCompletion {
        content: Option<String>,
        reasoning_content: Option<String>,
    },

    /// Anything we could not recognize. Normalizes to an empty string
    /// instead of erroring; the extractor's parse failure handles it.
    Unrecognized,
}

impl BackendReply {
    /// Collapse to plain text. `content` wins over `reasoning_content`;
    /// empty and unrecognized shapes become `""`.
    pub fn into_text(self) -> String {
        match self {
            Self::PlainText(text) => text,
            Self::ChatCompletion {
                content,
                reasoning_content,
            } => content
                .filter(|c| !c.is_empty())
                .or(reasoning_content)
                .unwrap_or_default(),
            Self::Unrecognized => String::new(),
        }
    }

    /// Decode a raw JSON response value into a reply.
    ///
    /// Recognized shapes, probed in order:
    /// - a bare JSON string
    /// - an object with a top-level `content` string
    /// - an object with `choices[0].message.{content,reasoning_content}`
    pub fn from_json(value: &serde_json::Value) -> Self {
        if let Some(s) = value.as_str() {
            return Self::PlainText(s.to_string());
        }

        if let Some(content) = value.get("content").and_then(|c| c.as_str()) {
            return Self::PlainText(content.to_string());
        }

        if let Some(message) = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
        {
            let content = message
                .get("content")
                .and_then(|c| c.as_str())
                .map(String::from);
            let reasoning_content = message
                .get("reasoning_content")
                .and_then(|c| c.as_str())
                .map(String::from);
            if content.is_some() || reasoning_content.is_some() {
                return Self::ChatCompletion {
                    content,
                    reasoning_content,
                };
            }
        }

        Self::Unrecognized
    }
}

/// The primary generation capability: a single quiet prompt call against
/// the host's main connection.
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "main-api").
    fn name(&self) -> &str;

    /// Run one completion. `context` is the flat context transcript,
    /// `instruction` the composed generation prompt.
    async fn complete(
        &self,
        context: &str,
        instruction: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, BackendError>;
}

/// The profile generation capability: a chat-completion call addressed to
/// a named connection profile.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Run one completion against the given profile.
    async fn send(
        &self,
        profile_id: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> std::result::Result<BackendReply, BackendError>;
}
