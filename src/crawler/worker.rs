//! Source crawl worker contract

use crate::tracker::EvasionStrategy;
use crate::WorkerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A listing as one source presented it, before normalization
///
/// Everything here is untrusted page text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub price_text: Option<String>,
    /// Absolute listing URL
    pub url: String,
    pub source_name: String,
    pub condition_text: Option<String>,
    pub location_text: Option<String>,
    /// Absolute image URLs
    pub image_urls: Vec<String>,
}

impl RawListing {
    pub fn new(
        source_name: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn with_price(mut self, price_text: impl Into<String>) -> Self {
        self.price_text = Some(price_text.into());
        self
    }

    pub fn with_condition(mut self, condition_text: impl Into<String>) -> Self {
        self.condition_text = Some(condition_text.into());
        self
    }

    pub fn with_location(mut self, location_text: impl Into<String>) -> Self {
        self.location_text = Some(location_text.into());
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_urls.push(image_url.into());
        self
    }
}

/// One source's fetch and extraction, behind a uniform interface
///
/// Adding a source means adding an implementation; the dispatcher never
/// changes. Implementations:
///
/// - apply the strategy's think time before any network request
/// - return `Ok(vec![])` when the source answered but had nothing matching
/// - return [`WorkerError::Blocked`] for bot-detection responses, so the
///   tracker can escalate instead of counting an ordinary failure
///
/// `deadline` is informational (e.g. for HTTP client timeouts); the
/// dispatcher cancels a worker that overruns it.
#[async_trait]
pub trait SourceWorker: Send + Sync {
    /// Name the source is tracked under
    fn source_name(&self) -> &str;

    async fn crawl(
        &self,
        query: &str,
        strategy: &EvasionStrategy,
        deadline: Instant,
    ) -> Result<Vec<RawListing>, WorkerError>;
}
