use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Credential passed as the `access_key` query parameter.
    #[serde(default)]
    pub access_key: String,
    /// A request hanging longer than this counts as the provider being down.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api.exchangeratesapi.io".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            access_key: String::new(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Reference currency all fetched rates are expressed against.
    #[serde(default = "default_anchor")]
    pub anchor: String,
    /// Initial source currency of the conversion selection.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Initial target currency of the conversion selection.
    #[serde(default = "default_target_currency")]
    pub target_currency: String,
}

fn default_anchor() -> String {
    "EUR".to_string()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_target_currency() -> String {
    "PKR".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            anchor: default_anchor(),
            base_currency: default_base_currency(),
            target_currency: default_target_currency(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "cambist")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
