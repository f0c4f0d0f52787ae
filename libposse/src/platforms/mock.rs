//! Mock publisher implementation for testing
//!
//! Simulates a platform without credentials or network access. Clones share
//! their call log, so a test can box one copy into
//! [`Publishers`](super::Publishers) and inspect another afterwards.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::PublishError;
use crate::platforms::{truncate_text, PublishResult, Publisher, Syndication};
use crate::types::Target;

const MOCK_CHARACTER_LIMIT: usize = 500;

/// Mock publisher for testing
#[derive(Clone)]
pub struct MockPublisher {
    target: Target,
    failure: Option<PublishError>,
    published: Arc<Mutex<Vec<Syndication>>>,
}

impl MockPublisher {
    /// Create a mock publisher that always succeeds
    pub fn success(target: Target) -> Self {
        Self {
            target,
            failure: None,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock publisher that always fails with `error`
    pub fn failure(target: Target, error: PublishError) -> Self {
        Self {
            failure: Some(error),
            ..Self::success(target)
        }
    }

    /// Number of times publish was called
    pub fn call_count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Every post handed to publish, in call order
    pub fn published(&self) -> Vec<Syndication> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn target(&self) -> Target {
        self.target
    }

    fn character_limit(&self) -> usize {
        MOCK_CHARACTER_LIMIT
    }

    fn compose(&self, post: &Syndication) -> String {
        truncate_text(&post.title, &post.summary, self.character_limit())
    }

    async fn publish(&self, post: &Syndication) -> PublishResult<String> {
        let call = {
            let mut published = self
                .published
                .lock()
                .map_err(|_| PublishError::Posting("mock call log poisoned".to_string()))?;
            published.push(post.clone());
            published.len()
        };

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(format!("mock-{}-{}", self.target, call)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Syndication {
        Syndication::new(Some("Title"), "Summary", "https://blog.example/p/")
    }

    #[tokio::test]
    async fn test_success_records_calls() {
        let mock = MockPublisher::success(Target::Bluesky);
        let handle = mock.clone();

        assert_eq!(mock.publish(&post()).await.unwrap(), "mock-bluesky-1");
        assert_eq!(mock.publish(&post()).await.unwrap(), "mock-bluesky-2");

        assert_eq!(handle.call_count(), 2);
        assert_eq!(handle.published()[0].url, "https://blog.example/p/");
    }

    #[tokio::test]
    async fn test_failure_returns_error_and_records_call() {
        let mock = MockPublisher::failure(
            Target::Mastodon,
            PublishError::Authentication("bad token".to_string()),
        );

        let err = mock.publish(&post()).await.unwrap_err();
        assert_eq!(err, PublishError::Authentication("bad token".to_string()));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_compose() {
        let mock = MockPublisher::success(Target::Mastodon);
        assert_eq!(mock.compose(&post()), "Title\n\nSummary");
        assert_eq!(mock.target(), Target::Mastodon);
    }
}
