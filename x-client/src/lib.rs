pub mod api;
pub mod rate_limiter;
pub mod simulated;


pub use api::{UserKeys, XApiClient, XUser};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use simulated::SimulatedPlatform;

use std::sync::Arc;
use trendcaster_core::{CoreError, EngagementCounters};

/// Public counters for a single post, as returned by the read endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLookup {
    pub post_id: String,
    pub counters: EngagementCounters,
    pub created_at: Option<String>,
}

/// Read/write access to the social platform
pub trait SocialPlatform {
    /// Publish `text` and return the identifier the platform assigned
    async fn create_post(&self, text: &str, media_ids: Option<&[String]>)
        -> Result<String, CoreError>;

    /// Fetch public engagement counters; `Ok(None)` when the platform has no data
    async fn lookup_post(&self, post_id: &str) -> Result<Option<PostLookup>, CoreError>;

    /// True for stand-ins that never reach the real platform
    fn is_simulated(&self) -> bool {
        false
    }
}

impl<T: SocialPlatform> SocialPlatform for Arc<T> {
    async fn create_post(
        &self,
        text: &str,
        media_ids: Option<&[String]>,
    ) -> Result<String, CoreError> {
        (**self).create_post(text, media_ids).await
    }

    async fn lookup_post(&self, post_id: &str) -> Result<Option<PostLookup>, CoreError> {
        (**self).lookup_post(post_id).await
    }

    fn is_simulated(&self) -> bool {
        (**self).is_simulated()
    }
}
