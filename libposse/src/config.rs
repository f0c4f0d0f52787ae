//! Configuration management for posse
//!
//! Settings come from an optional TOML file, then environment variables
//! (typically loaded from `.env` by the binary) override them:
//!
//! | variable                | setting                  |
//! |-------------------------|--------------------------|
//! | `BASE_URL`              | `site.base_url`          |
//! | `BSKY_HANDLE`           | `bluesky.handle`         |
//! | `BSKY_PASSWORD`         | `bluesky.app_password`   |
//! | `MASTODON_API_BASE`     | `mastodon.instance`      |
//! | `MASTODON_ACCESS_TOKEN` | `mastodon.access_token`  |

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, Result};
use crate::reachability::DEFAULT_TIMEOUT;

pub const ENV_CONFIG_PATH: &str = "POSSE_CONFIG";
pub const ENV_BASE_URL: &str = "BASE_URL";
pub const ENV_BSKY_HANDLE: &str = "BSKY_HANDLE";
pub const ENV_BSKY_PASSWORD: &str = "BSKY_PASSWORD";
pub const ENV_MASTODON_API_BASE: &str = "MASTODON_API_BASE";
pub const ENV_MASTODON_ACCESS_TOKEN: &str = "MASTODON_ACCESS_TOKEN";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    pub bluesky: Option<BlueskyConfig>,
    pub mastodon: Option<MastodonConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Public root of the site, e.g. `https://blog.example`
    pub base_url: Option<String>,
    /// Seconds to wait for the live page before treating it as unreachable
    #[serde(default = "default_timeout_secs")]
    pub reachability_timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            reachability_timeout_secs: default_timeout_secs(),
        }
    }
}

impl SiteConfig {
    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_secs(self.reachability_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Deserialize)]
pub struct BlueskyConfig {
    pub handle: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub app_password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct MastodonConfig {
    /// Instance base URL, e.g. `https://mastodon.social`
    pub instance: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token: SecretString,
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Config {
    /// Load configuration for a run.
    ///
    /// An explicit `path` must exist. Without one, the file named by
    /// `POSSE_CONFIG` or the XDG default is used when present. Environment
    /// variables are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = resolve_config_path()?;
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Overlay credential and site variables, ignoring blank values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = var(ENV_BASE_URL) {
            self.site.base_url = Some(base_url);
        }

        let handle =
            var(ENV_BSKY_HANDLE).or_else(|| self.bluesky.as_ref().map(|b| b.handle.clone()));
        let password = var(ENV_BSKY_PASSWORD).or_else(|| {
            self.bluesky
                .as_ref()
                .map(|b| b.app_password.expose_secret().to_string())
        });
        self.bluesky = match (handle, password) {
            (Some(handle), Some(password)) => Some(BlueskyConfig {
                handle,
                app_password: SecretString::from(password),
            }),
            _ => None,
        };

        let instance = var(ENV_MASTODON_API_BASE)
            .or_else(|| self.mastodon.as_ref().map(|m| m.instance.clone()));
        let token = var(ENV_MASTODON_ACCESS_TOKEN).or_else(|| {
            self.mastodon
                .as_ref()
                .map(|m| m.access_token.expose_secret().to_string())
        });
        self.mastodon = match (instance, token) {
            (Some(instance), Some(token)) => Some(MastodonConfig {
                instance,
                access_token: SecretString::from(token),
            }),
            _ => None,
        };
    }

    /// Whether credentials exist for at least one platform
    pub fn has_credentials(&self) -> bool {
        self.bluesky.is_some() || self.mastodon.is_some()
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("posse").join("config.toml"))
}
