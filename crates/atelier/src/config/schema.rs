use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credits::{CreditSettings, DEFAULT_CREDITS_PER_IMAGE};
use crate::secrets::SecretSources;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub api: ApiConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub credits: CreditsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    pub fn token_sources(&self) -> SecretSources<'_> {
        SecretSources::new(
            self.token.as_deref(),
            self.token_file.as_deref(),
            self.token_env_var.as_deref(),
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            token: None,
            token_file: None,
            token_env_var: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_success_banner_secs")]
    pub success_banner_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_success_banner_secs() -> u64 {
    5
}

impl GenerationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn success_banner(&self) -> Duration {
        Duration::from_secs(self.success_banner_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            success_banner_secs: default_success_banner_secs(),
        }
    }
}

/// Freshness windows for the three results-view resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_collection_ttl_secs")]
    pub collection_ttl_secs: u64,
    #[serde(default = "default_model_stats_ttl_secs")]
    pub model_stats_ttl_secs: u64,
    #[serde(default = "default_history_ttl_secs")]
    pub history_ttl_secs: u64,
}

fn default_collection_ttl_secs() -> u64 {
    30
}

fn default_model_stats_ttl_secs() -> u64 {
    300
}

fn default_history_ttl_secs() -> u64 {
    60
}

impl CacheConfig {
    pub fn collection_ttl(&self) -> Duration {
        Duration::from_secs(self.collection_ttl_secs)
    }

    pub fn model_stats_ttl(&self) -> Duration {
        Duration::from_secs(self.model_stats_ttl_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            collection_ttl_secs: default_collection_ttl_secs(),
            model_stats_ttl_secs: default_model_stats_ttl_secs(),
            history_ttl_secs: default_history_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Where files land. Defaults to the platform download directory.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

fn default_item_delay_ms() -> u64 {
    300
}

impl DownloadConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    /// The configured directory with `~` expanded, else the platform download
    /// directory, else `./downloads`.
    pub fn resolved_directory(&self) -> PathBuf {
        match self.directory.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(dir) => PathBuf::from(crate::secrets::expand_home(dir)),
            None => dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads")),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsConfig {
    /// Used when the credit-settings endpoint is unavailable.
    #[serde(default = "default_credits_per_image")]
    pub default_credits_per_image: u32,
}

fn default_credits_per_image() -> u32 {
    DEFAULT_CREDITS_PER_IMAGE
}

impl CreditsConfig {
    pub fn fallback_settings(&self) -> CreditSettings {
        CreditSettings::new(self.default_credits_per_image)
    }
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            default_credits_per_image: default_credits_per_image(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
