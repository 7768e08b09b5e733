use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::ChatError;

pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_PROMPT_TEMPLATE: &str = "I want a movie recommendation. {input}";

pub const API_KEY_VARIABLE: &str = "GROQ_API_KEY";

#[derive(Deserialize, Debug)]
pub struct Environment {
    pub groq_api_key: Option<String>,
}

impl Environment {
    pub fn api_key(self) -> Result<String, ChatError> {
        self.groq_api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ChatError::ConfigurationMissing {
                variable: API_KEY_VARIABLE,
            })
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub prompt_template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            temperature: None,
            max_tokens: None,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config TOML")
    }

    /// Settings that change what the endpoint returns for the same prompt.
    pub fn cache_scope(&self) -> String {
        format!(
            "{}\n{}\n{:?}\n{:?}",
            self.base_url, self.model, self.temperature, self.max_tokens
        )
    }
}
