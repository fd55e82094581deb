//! Configuration management using the prefer crate for file discovery.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::pipeline::PipelineConfig;
use crate::platform::PlatformConfig;
use crate::rate_limit::RateLimitConfig;

/// Name prefer searches for (`reply-engine.toml`, `reply-engine.yaml`, ...).
pub const CONFIG_NAME: &str = "reply-engine";

fn default_database_url() -> String {
    "sqlite:reply-engine.db".to_string()
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite path / `sqlite:` URL, or a `postgres://` URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default, skip_serializing_if = "RateLimitConfig::is_default")]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            platform: PlatformConfig::default(),
            rate_limits: RateLimitConfig::default(),
            pipeline: PipelineConfig::default(),
            llm: LlmConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    /// Environment overrides are applied either way.
    pub async fn load() -> Self {
        let discovered = match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => pref_config.source_path().map(|p| p.to_path_buf()),
            Err(_) => None,
        };

        let config = match discovered {
            Some(path) => match Self::load_from_path(&path).await {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// `DATABASE_URL` here; platform and LLM sections read their own.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        self.platform = self.platform.with_env_overrides();
        self.llm = self.llm.with_env_overrides();
        self
    }

    /// Directory of the loaded config file, if any.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Database URL with relative SQLite paths resolved against the config
    /// file's directory.
    pub fn resolved_database_url(&self) -> String {
        let url = self.database_url.as_str();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return url.to_string();
        }
        let path = Path::new(url.strip_prefix("sqlite:").unwrap_or(url));
        match self.base_dir() {
            Some(base) if path.is_relative() && url != ":memory:" => {
                base.join(path).display().to_string()
            }
            _ => path.display().to_string(),
        }
    }
}
