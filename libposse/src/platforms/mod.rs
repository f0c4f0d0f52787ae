//! Platform abstraction and implementations
//!
//! Every syndication target implements [`Publisher`]. The orchestrator only
//! ever looks a publisher up by [`Target`] and calls it through the trait, so
//! adding a network means adding an implementation and a registry entry.
//!
//! # Examples
//!
//! ```no_run
//! use libposse::platforms::{mastodon::MastodonPublisher, Publisher, Syndication};
//!
//! # async fn example() -> Result<(), libposse::error::PublishError> {
//! let mastodon = MastodonPublisher::new("mastodon.social", "access-token".to_string())?;
//!
//! let post = Syndication::new(
//!     Some("Hello"),
//!     "A short summary of the post.",
//!     "https://blog.example/posts/hello/",
//! );
//! let status_id = mastodon.publish(&post).await?;
//! println!("Posted: {}", status_id);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ConfigError, PublishError, Result};
use crate::types::Target;

pub mod bluesky;
pub mod mastodon;

// Mock publisher is available for all builds (not just tests) to support integration tests
pub mod mock;

pub type PublishResult<T> = std::result::Result<T, PublishError>;

const DEFAULT_TITLE: &str = "New Post";
const ELLIPSIS: &str = "...";

/// What gets syndicated for one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syndication {
    pub title: String,
    /// The post's `microblog_content`
    pub summary: String,
    /// Canonical URL of the post on the site
    pub url: String,
}

impl Syndication {
    pub fn new(title: Option<&str>, summary: &str, url: &str) -> Self {
        Self {
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            summary: summary.trim().to_string(),
            url: url.to_string(),
        }
    }
}

/// A syndication target network.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn target(&self) -> Target;

    /// Maximum characters of composed text this publisher will send
    fn character_limit(&self) -> usize;

    /// Build the status text for `post`, already fitted to the platform limit.
    fn compose(&self, post: &Syndication) -> String;

    /// Publish `post` with exactly one network call.
    ///
    /// Returns the platform's identifier for the new post (an AT URI for
    /// Bluesky, a status id for Mastodon).
    ///
    /// # Errors
    ///
    /// Any non-success response maps to a [`PublishError`] carrying the
    /// platform's reported cause. No retries are attempted.
    async fn publish(&self, post: &Syndication) -> PublishResult<String>;
}

/// Join `title` and `content` with a blank line so the result fits `limit`
/// characters, shortening `content` (or, if nothing else fits, the title)
/// with a trailing ellipsis.
pub fn truncate_text(title: &str, content: &str, limit: usize) -> String {
    let reserved = title.chars().count() + 2;
    if content.is_empty() {
        return shorten(title, limit);
    }

    if reserved + content.chars().count() <= limit {
        format!("{}\n\n{}", title, content)
    } else if reserved + ELLIPSIS.len() < limit {
        format!("{}\n\n{}", title, shorten(content, limit - reserved))
    } else {
        shorten(title, limit)
    }
}

fn shorten(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let cut: String = text.chars().take(keep).collect();
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

/// Publishers available for a run, keyed by target
#[derive(Default)]
pub struct Publishers {
    inner: HashMap<Target, Box<dyn Publisher>>,
}

impl Publishers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, publisher: Box<dyn Publisher>) {
        self.inner.insert(publisher.target(), publisher);
    }

    pub fn with(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.insert(publisher);
        self
    }

    pub fn get(&self, target: Target) -> Option<&dyn Publisher> {
        self.inner.get(&target).map(|p| p.as_ref())
    }

    pub fn targets(&self) -> Vec<Target> {
        Target::ALL
            .into_iter()
            .filter(|t| self.inner.contains_key(t))
            .collect()
    }
}

/// Build and authenticate a publisher for every platform with credentials.
///
/// # Errors
///
/// Fails with [`ConfigError::NoCredentials`] when no platform is configured,
/// and with the platform's error when a configured client cannot be created
/// or logged in. Both abort the run before any post is processed.
pub async fn create_publishers(config: &Config) -> Result<Publishers> {
    if !config.has_credentials() {
        return Err(ConfigError::NoCredentials.into());
    }

    let mut publishers = Publishers::new();

    if let Some(bluesky) = &config.bluesky {
        debug!("Logging in to Bluesky");
        let client = bluesky::BlueskyPublisher::login(
            &bluesky.handle,
            bluesky.app_password.expose_secret(),
        )
        .await?;
        info!("Connected to Bluesky as {}", client.handle());
        publishers.insert(Box::new(client));
    }

    if let Some(mastodon) = &config.mastodon {
        let client = mastodon::MastodonPublisher::new(
            &mastodon.instance,
            mastodon.access_token.expose_secret().to_string(),
        )?;
        info!("Connected to Mastodon at {}", client.instance_url());
        publishers.insert(Box::new(client));
    }

    Ok(publishers)
}
