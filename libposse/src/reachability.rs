//! Live URL verification
//!
//! A post is only syndicated once its public page answers `200 OK`. Anything
//! else (another status, a timeout, a refused connection) counts as
//! unreachable and is logged, never raised.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{ConfigError, PosseError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (SyndicationScript)";

#[async_trait]
pub trait Reachability: Send + Sync {
    /// Return `true` iff `url` responds with `200 OK` within `timeout`.
    async fn check_reachable(&self, url: &str, timeout: Duration) -> bool;
}

/// HTTP GET based checker
pub struct HttpReachability {
    client: reqwest::Client,
}

impl HttpReachability {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(client_error)?;
        Ok(Self { client })
    }
}

fn client_error(e: reqwest::Error) -> PosseError {
    ConfigError::HttpClient(e.to_string()).into()
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn check_reachable(&self, url: &str, timeout: Duration) -> bool {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!("{} answered {}", url, response.status());
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::error!("Timed out after {:?} checking {}", timeout, url);
                false
            }
            Err(e) => {
                tracing::error!("Connection failed for {}: {}", url, e);
                false
            }
        }
    }
}
