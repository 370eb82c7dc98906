use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default = "default_bot_config")]
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Tenant subdomain, i.e. the `{subdomain}.beekeeper.io` part of the API host.
    pub subdomain: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_api_version() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_bot_config() -> BotConfig {
    BotConfig {
        poll_interval_secs: default_poll_interval_secs(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
