//! Bluesky platform implementation
//!
//! Posts are created as `app.bsky.feed.post` records carrying the title and
//! summary as text, plus an external link card pointing at the post. The URL
//! lives in the card, so the text itself stays within Bluesky's limit.

use async_trait::async_trait;
use bsky_sdk::api::app::bsky::embed::external;
use bsky_sdk::api::app::bsky::feed::post::{RecordData, RecordEmbedRefs};
use bsky_sdk::api::types::string::Datetime;
use bsky_sdk::api::types::Union;
use bsky_sdk::BskyAgent;

use crate::error::PublishError;
use crate::platforms::{truncate_text, PublishResult, Publisher, Syndication};
use crate::types::Target;

/// Composed text budget, below Bluesky's 300 character hard limit
pub const BSKY_CHAR_LIMIT: usize = 290;

const BSKY_HARD_LIMIT: usize = 300;
const CARD_DESCRIPTION_LIMIT: usize = 200;

/// Map Bluesky/AT Protocol errors to PublishError
///
/// bsky-sdk errors are inspected through their display and debug output,
/// which carry both XRPC status codes and AT Protocol error names.
fn map_bluesky_error<E: std::fmt::Display + std::fmt::Debug>(
    error: E,
    context: &str,
) -> PublishError {
    let error_msg = format!("{}", error);
    let debug_msg = format!("{:?}", error);

    if error_msg.contains("401")
        || error_msg.contains("403")
        || error_msg.contains("AuthenticationRequired")
        || error_msg.contains("InvalidToken")
        || error_msg.contains("ExpiredToken")
        || debug_msg.contains("Unauthorized")
        || debug_msg.contains("Forbidden")
    {
        return PublishError::Authentication(format!(
            "Bluesky authentication failed during {}: {}. Please check your credentials.",
            context, error_msg
        ));
    }

    if error_msg.contains("InvalidCredentials")
        || error_msg.contains("AccountNotFound")
        || (context == "login" && error_msg.contains("invalid"))
    {
        return PublishError::Authentication(format!(
            "Invalid Bluesky credentials: {}. Please check your handle and app password.",
            error_msg
        ));
    }

    if error_msg.contains("429")
        || error_msg.contains("RateLimitExceeded")
        || error_msg.contains("TooManyRequests")
        || debug_msg.contains("RateLimit")
    {
        return PublishError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}. Please wait before trying again.",
            context, error_msg
        ));
    }

    if error_msg.contains("400")
        || error_msg.contains("InvalidRequest")
        || error_msg.contains("InvalidRecord")
        || error_msg.contains("ValidationError")
        || debug_msg.contains("BadRequest")
    {
        return PublishError::Validation(format!(
            "Bluesky rejected the request during {}: {}. Check content format and length.",
            context, error_msg
        ));
    }

    let lower = error_msg.to_lowercase();
    if lower.contains("connection")
        || lower.contains("network")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("unreachable")
        || lower.contains("dns")
        || debug_msg.contains("Connect")
        || debug_msg.contains("Timeout")
    {
        return PublishError::Network(format!(
            "Network error while connecting to Bluesky PDS during {}: {}",
            context, error_msg
        ));
    }

    PublishError::Posting(format!(
        "Bluesky operation failed during {}: {}",
        context, error_msg
    ))
}

/// Bluesky publisher holding a logged-in agent
pub struct BlueskyPublisher {
    agent: BskyAgent,
    handle: String,
}

impl BlueskyPublisher {
    /// Create an agent and log in with an app password.
    ///
    /// # Arguments
    ///
    /// * `handle` - The Bluesky handle (e.g., "user.bsky.social")
    /// * `app_password` - An app password (not the account password)
    pub async fn login(handle: &str, app_password: &str) -> PublishResult<Self> {
        let agent = BskyAgent::builder()
            .build()
            .await
            .map_err(|e| PublishError::Network(format!("Failed to create Bluesky agent: {}", e)))?;

        tracing::debug!("Creating Bluesky session for handle: {}", handle);
        agent
            .login(handle, app_password)
            .await
            .map_err(|e| map_bluesky_error(e, "login"))?;

        Ok(Self {
            agent,
            handle: handle.to_string(),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

fn validate_content(content: &str) -> PublishResult<()> {
    if content.trim().is_empty() {
        return Err(PublishError::Validation("Content cannot be empty".to_string()));
    }

    let char_count = content.chars().count();
    if char_count > BSKY_HARD_LIMIT {
        return Err(PublishError::Validation(format!(
            "Content exceeds Bluesky's {} character limit (current: {} characters)",
            BSKY_HARD_LIMIT, char_count
        )));
    }

    Ok(())
}

fn link_card(post: &Syndication) -> Union<RecordEmbedRefs> {
    let description: String = post.summary.chars().take(CARD_DESCRIPTION_LIMIT).collect();
    let card = external::MainData {
        external: external::ExternalData {
            description,
            thumb: None,
            title: post.title.clone(),
            uri: post.url.clone(),
        }
        .into(),
    };
    Union::Refs(RecordEmbedRefs::AppBskyEmbedExternalMain(Box::new(card.into())))
}

#[async_trait]
impl Publisher for BlueskyPublisher {
    fn target(&self) -> Target {
        Target::Bluesky
    }

    fn character_limit(&self) -> usize {
        BSKY_CHAR_LIMIT
    }

    fn compose(&self, post: &Syndication) -> String {
        compose_text(post, self.character_limit())
    }

    async fn publish(&self, post: &Syndication) -> PublishResult<String> {
        let text = self.compose(post);
        validate_content(&text)?;

        tracing::debug!("Posting to Bluesky: {} characters", text.chars().count());

        let record = RecordData {
            created_at: Datetime::now(),
            embed: Some(link_card(post)),
            entities: None,
            facets: None,
            labels: None,
            langs: None,
            reply: None,
            tags: None,
            text,
        };

        let response = self
            .agent
            .create_record(record)
            .await
            .map_err(|e| map_bluesky_error(e, "posting"))?;

        let at_uri = response.uri.to_string();
        tracing::debug!("Posted to Bluesky: {}", at_uri);

        Ok(at_uri)
    }
}

fn compose_text(post: &Syndication, limit: usize) -> String {
    truncate_text(&post.title, &post.summary, limit)
}
