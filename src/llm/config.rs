//! LLM responder configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompts::DEFAULT_REPLY_PROMPT;

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, OpenRouter, etc.)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" | "openrouter" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for the response generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider-specific defaults apply)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom prompt (uses the {reply} placeholder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Responses longer than this are cut at a character boundary.
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
    /// HTTP timeout for one generation call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_response_chars() -> usize {
    280
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            prompt: None,
            max_response_chars: default_max_response_chars(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "ollama" (default), "openai", "groq", "together" or "openrouter"
    /// - `LLM_ENDPOINT`: API endpoint (defaults based on provider)
    /// - `LLM_API_KEY`: API key for OpenAI-compatible providers
    /// - `LLM_MODEL`: Model name
    /// - `LLM_MAX_TOKENS`: Maximum tokens in response
    /// - `LLM_TEMPERATURE`: Generation temperature (0.0-1.0)
    /// - `LLM_PROMPT`: Custom prompt with a `{reply}` placeholder
    ///
    /// An explicit `LLM_PROVIDER` wins over auto-detection from `GROQ_API_KEY`
    /// or `OPENAI_API_KEY`.
    pub fn with_env_overrides(mut self) -> Self {
        let explicit_provider = std::env::var("LLM_PROVIDER").ok();
        if let Some(provider) = explicit_provider.as_deref().and_then(LlmProvider::from_str) {
            self.provider = provider;
        }

        let explicit_endpoint = std::env::var("LLM_ENDPOINT").ok();
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = endpoint.clone();
        }

        if let Ok(val) = std::env::var("LLM_API_KEY") {
            self.api_key = Some(val);
        }

        match explicit_provider.map(|p| p.to_lowercase()) {
            Some(provider) => {
                if explicit_endpoint.is_none() {
                    if let Some(endpoint) = provider_endpoint(&provider) {
                        self.endpoint = endpoint.to_string();
                    }
                }
                if self.api_key.is_none() {
                    self.api_key = match provider.as_str() {
                        "groq" => std::env::var("GROQ_API_KEY").ok(),
                        "openai" => std::env::var("OPENAI_API_KEY").ok(),
                        "openrouter" => std::env::var("OPENROUTER_API_KEY").ok(),
                        _ => None,
                    };
                }
            }
            None if self.api_key.is_none() => {
                for (var, provider) in [("GROQ_API_KEY", "groq"), ("OPENAI_API_KEY", "openai")] {
                    if let Ok(key) = std::env::var(var) {
                        self.api_key = Some(key);
                        self.provider = LlmProvider::OpenAI;
                        if explicit_endpoint.is_none() {
                            if let Some(endpoint) = provider_endpoint(provider) {
                                self.endpoint = endpoint.to_string();
                            }
                        }
                        break;
                    }
                }
            }
            None => {}
        }

        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = t;
            }
        }
        if let Ok(val) = std::env::var("LLM_PROMPT") {
            self.prompt = Some(val);
        }
        self
    }

    /// Get the prompt template, using custom or default.
    pub fn prompt_template(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_REPLY_PROMPT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn provider_endpoint(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some("https://api.groq.com/openai"),
        "openai" => Some("https://api.openai.com"),
        "together" => Some("https://api.together.xyz"),
        "openrouter" => Some("https://openrouter.ai/api"),
        _ => None,
    }
}
