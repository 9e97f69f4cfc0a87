use serde::Deserialize;
use std::path::Path;

use crate::error::ChatError;

/// Environment variable that overrides `provider.api_key` from config.toml.
const API_KEY_ENV: &str = "RESCUEBOT_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub tool_server: ToolServerConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// Completion/embedding provider settings. One credential covers both the
/// chat model and the embedding model.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Must match the model used at ingestion time — retrieval quality
    /// degrades silently if the embedding space changes between the two.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Command line for the tool-execution process the bridge spawns at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolServerConfig {
    #[serde(default = "default_tool_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            args: Vec::new(),
        }
    }
}

fn default_tool_command() -> String {
    "rescuebot-tools".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Flat FAQ document whose sections are separated by the `###` marker.
    #[serde(default = "default_source_path")]
    pub source_path: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source_path: default_source_path(),
            top_k: default_top_k(),
        }
    }
}

fn default_db_path() -> String {
    "knowledge.db".to_string()
}
fn default_source_path() -> String {
    "data/faq.md".to_string()
}
fn default_top_k() -> usize {
    3
}

impl AppConfig {
    /// Load configuration from a TOML file. The `RESCUEBOT_API_KEY`
    /// environment variable, if set, takes precedence over the file value.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.provider.api_key = key;
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, ChatError> {
        toml::from_str(content).map_err(|e| ChatError::Configuration(e.to_string()))
    }

    fn validate(&self) -> Result<(), ChatError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(ChatError::Configuration(format!(
                "provider.api_key is missing; set it in config.toml or via {}",
                API_KEY_ENV
            )));
        }
        Ok(())
    }
}
