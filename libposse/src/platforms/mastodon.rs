//! Mastodon platform implementation
//!
//! Posts statuses through the megalodon library, which also speaks to other
//! Fediverse servers implementing the Mastodon API.

use async_trait::async_trait;
use megalodon::{Megalodon, SNS};

use crate::error::PublishError;
use crate::platforms::{truncate_text, PublishResult, Publisher, Syndication};
use crate::types::Target;

/// Composed status length, kept under Mastodon's default 500 with some slack
pub const MASTODON_CHAR_LIMIT: usize = 490;

/// Mastodon publisher
pub struct MastodonPublisher {
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,
}

impl MastodonPublisher {
    /// Create a new Mastodon publisher
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance base URL; `https://` is assumed when no scheme is given
    /// * `access_token` - OAuth access token for the posting account
    pub fn new(instance: &str, access_token: String) -> PublishResult<Self> {
        if access_token.trim().is_empty() {
            return Err(PublishError::Authentication(
                "Mastodon access token is empty".to_string(),
            ));
        }

        let instance_url = normalize_instance_url(instance);
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token.trim().to_string()),
            None,
        )
        .map_err(|e| {
            PublishError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn validate_content(&self, content: &str) -> PublishResult<()> {
        if content.trim().is_empty() {
            return Err(PublishError::Validation("Content cannot be empty".to_string()));
        }

        let char_count = content.chars().count();
        let limit = self.character_limit();
        if char_count > limit {
            return Err(PublishError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                limit, char_count
            )));
        }

        Ok(())
    }
}

fn normalize_instance_url(instance: &str) -> String {
    let instance = instance.trim().trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn target(&self) -> Target {
        Target::Mastodon
    }

    fn character_limit(&self) -> usize {
        MASTODON_CHAR_LIMIT
    }

    /// Title and summary, then the link on its own paragraph. The link is
    /// never truncated.
    fn compose(&self, post: &Syndication) -> String {
        let budget = self.character_limit().saturating_sub(post.url.chars().count() + 2);
        let text = truncate_text(&post.title, &post.summary, budget);
        format!("{}\n\n{}", text, post.url)
    }

    async fn publish(&self, post: &Syndication) -> PublishResult<String> {
        let status = self.compose(post);
        self.validate_content(&status)?;

        tracing::debug!("Posting to Mastodon: {} characters", status.chars().count());

        let response = self
            .client
            .post_status(status, None)
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => status.id,
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }
}

/// Map megalodon errors to PublishError
///
/// - HTTP 401/403 → `Authentication` (token issues)
/// - HTTP 422 → `Validation`
/// - HTTP 429 → `RateLimit`
/// - HTTP 5xx and connection failures → `Network`
/// - Parse errors → `Posting`
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PublishError {
    classify_error(&error.to_string(), context)
}

fn classify_error(error_str: &str, context: &str) -> PublishError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PublishError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                    Suggestion: Verify your access token is valid and has write:statuses scope.",
            context, error_str
        )),
        Some(422) => PublishError::Validation(format!(
            "Mastodon validation failed ({}): {}. \
                    Suggestion: Check that your content meets the instance's requirements.",
            context, error_str
        )),
        Some(429) => PublishError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}. \
                    Suggestion: Wait a few minutes before running again.",
            context, error_str
        )),
        Some(500..=599) => PublishError::Network(format!(
            "Mastodon server error ({}): {}. \
                    Suggestion: The instance may be experiencing issues.",
            context, error_str
        )),
        Some(_) => {
            PublishError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("authentication")
                || error_lower.contains("token")
            {
                PublishError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("parse")
                || error_lower.contains("json")
                || error_lower.contains("deserialize")
            {
                PublishError::Posting(format!(
                    "Mastodon response parse error ({}): {}. \
                        Suggestion: The instance may run an incompatible server version.",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PublishError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("validation") || error_lower.contains("unprocessable") {
                PublishError::Validation(format!(
                    "Mastodon validation failed ({}): {}",
                    context, error_str
                ))
            } else {
                PublishError::Network(format!(
                    "Mastodon error ({}): {}. \
                        Suggestion: Check your network connection and instance availability.",
                    context, error_str
                ))
            }
        }
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for patterns like "HTTP 401", "status 403", "code: 429" or a
/// standalone "401:".
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        if window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit())
        {
            let code = std::str::from_utf8(&window[..3])
                .ok()
                .and_then(|s| s.parse::<u16>().ok());
            if let Some(code) = code.filter(|c| (100..=599).contains(c)) {
                return Some(code);
            }
        }
    }

    None
}
