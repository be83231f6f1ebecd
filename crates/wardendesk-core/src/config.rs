//! Application configuration management.
//!
//! Configuration is stored at `~/.config/wardendesk/config.json` and holds
//! the service base URLs, cache tuning, and the signed-in warden's defaults.
//! A few settings can be overridden from the environment (or a `.env` file
//! loaded by the binary).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::{
    DEFAULT_ADMIN_BASE_URL, DEFAULT_COMPLAINTS_BASE_URL, DEFAULT_NOTIFICATIONS_BASE_URL,
    DEFAULT_PUSH_SEND_URL, DEFAULT_PUSH_TOKENS_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::api::Endpoints;
use crate::cache::{CacheConfig, DEFAULT_CACHE_TTL, DEFAULT_PAGE_SIZE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "wardendesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_COMPLAINTS_URL: &str = "WARDENDESK_COMPLAINTS_URL";
pub const ENV_ADMIN_URL: &str = "WARDENDESK_ADMIN_URL";
pub const ENV_HOSTEL: &str = "WARDENDESK_HOSTEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub complaints_base_url: String,
    pub admin_base_url: String,
    pub notifications_base_url: String,
    pub push_tokens_base_url: String,
    pub push_send_url: String,
    pub page_size: u32,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    /// Hostel to show instead of the one on the warden profile
    pub hostel: Option<String>,
    pub warden_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            complaints_base_url: DEFAULT_COMPLAINTS_BASE_URL.to_string(),
            admin_base_url: DEFAULT_ADMIN_BASE_URL.to_string(),
            notifications_base_url: DEFAULT_NOTIFICATIONS_BASE_URL.to_string(),
            push_tokens_base_url: DEFAULT_PUSH_TOKENS_BASE_URL.to_string(),
            push_send_url: DEFAULT_PUSH_SEND_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            hostel: None,
            warden_id: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Overlay environment settings. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = set(ENV_COMPLAINTS_URL) {
            self.complaints_base_url = url;
        }
        if let Some(url) = set(ENV_ADMIN_URL) {
            self.admin_base_url = url;
        }
        if let Some(hostel) = set(ENV_HOSTEL) {
            self.hostel = Some(hostel);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the session file lives.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            complaints: trim_slash(&self.complaints_base_url),
            admin: trim_slash(&self.admin_base_url),
            notifications: trim_slash(&self.notifications_base_url),
            push_tokens: trim_slash(&self.push_tokens_base_url),
            push_send: self.push_send_url.clone(),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            page_size: self.page_size.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn trim_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
