use crate::{PostLookup, SocialPlatform};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};
use trendcaster_core::{CoreError, EngagementCounters};

/// In-memory platform for dry runs. Posts get `sim_` identifiers and
/// engagement is derived from a hash of the text, so the same text always
/// reports the same counters.
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    posts: Mutex<HashMap<String, String>>,
    sequence: AtomicU64,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_count(&self) -> usize {
        self.posts.lock().await.len()
    }

    /// Deterministic pseudo-engagement for `text`
    pub fn counters_for(text: &str) -> EngagementCounters {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        // Independent slices of the hash for each counter
        let slice = |shift: u32, modulo: u64| (seed >> shift) % modulo;
        EngagementCounters {
            likes: 1 + slice(0, 50),
            retweets: slice(8, 15),
            replies: slice(16, 8),
            quotes: slice(24, 5),
            bookmarks: slice(32, 12),
            impressions: 100 + slice(40, 1000),
        }
    }
}

impl SocialPlatform for SimulatedPlatform {
    async fn create_post(
        &self,
        text: &str,
        _media_ids: Option<&[String]>,
    ) -> Result<String, CoreError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!("sim_{}_{}", chrono::Utc::now().timestamp_millis(), seq);

        self.posts.lock().await.insert(id.clone(), text.to_string());
        info!("Simulated post {} ({} chars)", id, text.chars().count());
        Ok(id)
    }

    async fn lookup_post(&self, post_id: &str) -> Result<Option<PostLookup>, CoreError> {
        let posts = self.posts.lock().await;
        let Some(text) = posts.get(post_id) else {
            debug!("Simulated lookup for unknown post {}", post_id);
            return Ok(None);
        };

        Ok(Some(PostLookup {
            post_id: post_id.to_string(),
            counters: Self::counters_for(text),
            created_at: None,
        }))
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
