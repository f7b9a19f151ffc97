use crate::timer::Pacer;
use std::time::Duration;
use tracing::{error, info, warn};
use trendcaster_core::{
    determine_strategy, CoreError, EngagementMetrics, MetricsBatch, RecoveryStrategy, Stage,
};
use x_client::SocialPlatform;

/// Polls the platform for public engagement counters
#[derive(Debug)]
pub struct MetricsTracker<P> {
    platform: P,
    pacer: Pacer,
}

impl<P: SocialPlatform> MetricsTracker<P> {
    pub fn new(platform: P, pacer: Pacer) -> Self {
        Self { platform, pacer }
    }

    /// Whether simulated posts can be looked up, which holds only when the
    /// platform itself is simulated
    pub fn tracks_simulated(&self) -> bool {
        self.platform.is_simulated()
    }

    /// Wait `wait_before_poll`, then fetch metrics for one post. `Ok(None)`
    /// when the platform had nothing for it; `Err` only on cancellation.
    pub async fn track(
        &self,
        post_id: &str,
        wait_before_poll: Duration,
    ) -> Result<Option<EngagementMetrics>, CoreError> {
        if !wait_before_poll.is_zero() {
            info!(
                "Waiting {:?} for engagement on post {}",
                wait_before_poll, post_id
            );
        }
        self.pacer.wait(wait_before_poll).await?;
        Ok(self.fetch(post_id).await)
    }

    /// Fetch metrics for each identifier without waiting. Lookups that fail
    /// or return nothing are listed in `missing` instead.
    pub async fn track_many(&self, post_ids: &[String]) -> MetricsBatch {
        let mut batch = MetricsBatch::default();

        for post_id in post_ids {
            match self.fetch(post_id).await {
                Some(metrics) => {
                    batch.metrics.insert(post_id.clone(), metrics);
                }
                None => batch.missing.push(post_id.clone()),
            }
        }

        info!(
            "Tracked metrics for {} of {} posts",
            batch.len(),
            post_ids.len()
        );
        batch
    }

    async fn fetch(&self, post_id: &str) -> Option<EngagementMetrics> {
        match self.platform.lookup_post(post_id).await {
            Ok(Some(lookup)) => Some(EngagementMetrics::from_counters(
                post_id,
                lookup.counters,
                lookup.created_at,
            )),
            Ok(None) => {
                warn!("No metrics available for post {}", post_id);
                None
            }
            Err(e) => {
                match determine_strategy(Stage::Track, &e) {
                    RecoveryStrategy::Skip => {
                        warn!("Skipping metrics for post {}: {}", post_id, e)
                    }
                    _ => error!("Metrics lookup for post {} failed: {}", post_id, e),
                }
                None
            }
        }
    }
}
