//! Configuration loading, validation, and defaults for Tidbit.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at load. Configuration is an explicit
//! value passed into each pipeline call — there is no ambient global state.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The default free-text directive steering what kind of facts to generate.
pub const DEFAULT_DIRECTIVE: &str = "\
Generate interesting TMI facts about the current conversation, mixing character details and world-building.

Good TMI examples:
- Character quirks, habits, or hidden thoughts
- World-building details and lore
- Environmental or setting details
- Relationship dynamics
- Background context or history

Mix character-focused and world-focused facts naturally.";

/// Builtin alternative directive: world-building focus.
pub const WORLD_DIRECTIVE: &str = "\
Generate world-building TMI facts about the setting, environment, and lore of the current scene.

Focus on:
- Location history and significance
- Cultural or societal details
- Environmental characteristics
- Technological or magical systems
- Background events or context
- Setting atmosphere and mood";

/// Builtin alternative directive: character-emotion focus.
pub const EMOTION_DIRECTIVE: &str = "\
Analyze the emotional undertones and psychological nuances of the characters in the conversation.

Focus on:
- Hidden feelings and subtext
- Relationship dynamics and tensions
- Character motivations and desires
- Inner thoughts and conflicts
- Unspoken emotions or intentions
- Psychological state and mood";

/// How long each generated fact should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthClass {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthClass {
    /// The sentence-count hint restated verbatim in the generation prompt.
    pub fn sentence_hint(self) -> &'static str {
        match self {
            Self::Short => "1-2 sentences per fact (keep it brief)",
            Self::Medium => "3-5 sentences per fact (balanced detail)",
            Self::Long => "7+ sentences per fact (comprehensive detail)",
        }
    }
}

/// Which generation capability to dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    /// The host's main connection (quiet prompt)
    #[default]
    Main,
    /// A named connection profile (chat completion)
    Profile,
}

/// Immutable-during-a-call snapshot of everything the composer and
/// assembler need. Supplied by configuration; never mutated by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// How many facts to request (1-10)
    #[serde(default = "default_fact_count")]
    pub fact_count: usize,

    /// Length class per fact
    #[serde(default)]
    pub length: LengthClass,

    /// Target language. `None` means the model's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Free-text directive ("what kind of facts"), already host-substituted
    #[serde(default = "default_directive")]
    pub directive: String,

    /// How many recent turns go into the context window
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Max output tokens per generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_fact_count() -> usize {
    3
}
fn default_directive() -> String {
    DEFAULT_DIRECTIVE.into()
}
fn default_context_turns() -> usize {
    20
}
fn default_max_tokens() -> u32 {
    500
}
fn default_true() -> bool {
    true
}
fn default_retention_days() -> i64 {
    30
}
fn default_lore_budget() -> usize {
    8000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            fact_count: default_fact_count(),
            length: LengthClass::default(),
            language: None,
            directive: default_directive(),
            context_turns: default_context_turns(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// The root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Which backend variant generation dispatches to
    #[serde(default)]
    pub source: GenerationSource,

    /// Connection profile id (required when `source = "profile"`)
    #[serde(default)]
    pub profile_id: String,

    /// Generate automatically when a new character turn renders
    #[serde(default = "default_true")]
    pub auto_generate: bool,

    /// Show freshly generated facts expanded
    #[serde(default)]
    pub auto_open: bool,

    /// Stored fact sets older than this many days are purged at load
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Character budget handed to the world-lore scan
    #[serde(default = "default_lore_budget")]
    pub lore_budget_chars: usize,

    /// Prompt-level settings
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: GenerationSource::default(),
            profile_id: String::new(),
            auto_generate: true,
            auto_open: false,
            retention_days: default_retention_days(),
            lore_budget_chars: default_lore_budget(),
            prompt: PromptConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// Environment overrides (highest priority):
    /// - `TIDBIT_SOURCE` ("main" or "profile")
    /// - `TIDBIT_PROFILE_ID`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(source) = std::env::var("TIDBIT_SOURCE") {
            config.source = match source.as_str() {
                "main" => GenerationSource::Main,
                "profile" => GenerationSource::Profile,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "TIDBIT_SOURCE must be \"main\" or \"profile\", got {other:?}"
                    )));
                }
            };
        }
        if let Ok(profile_id) = std::env::var("TIDBIT_PROFILE_ID") {
            config.profile_id = profile_id;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.prompt.fact_count) {
            return Err(ConfigError::ValidationError(
                "prompt.fact_count must be between 1 and 10".into(),
            ));
        }
        if self.prompt.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "prompt.max_tokens must be greater than 0".into(),
            ));
        }
        if self.retention_days < 1 {
            return Err(ConfigError::ValidationError(
                "retention_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
