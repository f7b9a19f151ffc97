use crate::timer::Pacer;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use trendcaster_core::{
    char_len, determine_strategy, truncate_chars, CoreError, PostDraft, PublishOutcome,
    PublishedPost, RecoveryStrategy, Settings, Stage, MAX_POST_CHARS,
};
use x_client::SocialPlatform;

/// Characters kept from an over-long post before the ellipsis
pub const TRUNCATED_BODY_CHARS: usize = MAX_POST_CHARS - 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPolicy {
    pub cooldown: Duration,
    pub max_posts: usize,
    /// Record a simulated post when the platform rejects a publish
    pub simulate_on_failure: bool,
}

impl PublishPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cooldown: settings.cooldown(),
            max_posts: settings.max_posts_per_cycle,
            simulate_on_failure: settings.simulate_on_publish_failure,
        }
    }
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Fit `text` into a single post, replacing the tail with "..." when it is too long
pub fn fit_to_limit(text: &str) -> String {
    if char_len(text) <= MAX_POST_CHARS {
        return text.to_string();
    }
    warn!("Post truncated to fit the {} character limit", MAX_POST_CHARS);
    format!("{}...", truncate_chars(text, TRUNCATED_BODY_CHARS))
}

/// Publishes drafts one at a time with a cooldown between posts
#[derive(Debug)]
pub struct Publisher<P> {
    platform: P,
    pacer: Pacer,
    policy: PublishPolicy,
    sequence: AtomicU64,
}

impl<P: SocialPlatform> Publisher<P> {
    pub fn new(platform: P, pacer: Pacer, policy: PublishPolicy) -> Self {
        Self {
            platform,
            pacer,
            policy,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    fn simulated_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("sim_{}_{}", Utc::now().timestamp_millis(), seq)
    }

    pub async fn publish_one(&self, text: &str) -> PublishOutcome {
        let text = fit_to_limit(text);

        match self.platform.create_post(&text, None).await {
            Ok(id) if self.platform.is_simulated() => {
                info!("Post {} recorded on the simulated platform", id);
                PublishOutcome::Simulated { id }
            }
            Ok(id) => {
                info!("Post {} published: {}", id, truncate_chars(&text, 50));
                PublishOutcome::Published { id }
            }
            Err(e) => match determine_strategy(Stage::Publish, &e) {
                RecoveryStrategy::Simulate if self.policy.simulate_on_failure => {
                    let id = self.simulated_id();
                    warn!("Publishing failed ({}), recorded simulated post {}", e, id);
                    PublishOutcome::Simulated { id }
                }
                _ => {
                    error!("Publishing failed: {}", e);
                    PublishOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
        }
    }

    /// Publish drafts in order, at most `max_posts` of them. The cooldown runs
    /// after each recorded post except the last draft; a failed draft
    /// consumes no cooldown. Returns `CoreError::Cancelled` if the pacer is
    /// cancelled between posts.
    pub async fn publish_many(&self, drafts: &[PostDraft]) -> Result<Vec<PublishedPost>, CoreError> {
        let batch = &drafts[..drafts.len().min(self.policy.max_posts)];
        if batch.len() < drafts.len() {
            warn!(
                "Publishing {} of {} drafts (max posts per cycle)",
                batch.len(),
                drafts.len()
            );
        }

        let mut published = Vec::with_capacity(batch.len());
        for (index, draft) in batch.iter().enumerate() {
            let outcome = self.publish_one(&draft.text).await;
            let simulated = outcome.is_simulated();
            let Some(id) = outcome.id() else {
                warn!("Skipping {} draft {}", draft.category, index + 1);
                continue;
            };

            published.push(PublishedPost {
                id: id.to_string(),
                text: draft.text.clone(),
                category: draft.category,
                published_at: Utc::now(),
                simulated,
                metrics: None,
            });

            if index + 1 < batch.len() {
                info!("Waiting {:?} before the next post", self.policy.cooldown);
                if let Err(e) = self.pacer.wait(self.policy.cooldown).await {
                    warn!("Publishing cancelled after {} posts", published.len());
                    return Err(e);
                }
            }
        }

        info!("Published {} of {} drafts", published.len(), batch.len());
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use trendcaster_core::{Category, PlatformApiError};
    use x_client::PostLookup;

    /// Scripted platform: each call pops the next reply, defaulting to success
    #[derive(Default)]
    struct ScriptedPlatform {
        failures: Mutex<Vec<Option<PlatformApiError>>>,
        posted: Mutex<Vec<String>>,
    }

    impl ScriptedPlatform {
        fn with_script(script: Vec<Option<PlatformApiError>>) -> Self {
            Self {
                failures: Mutex::new(script.into_iter().rev().collect()),
                posted: Mutex::new(Vec::new()),
            }
        }

        fn posted(&self) -> Vec<String> {
            self.posted.lock().unwrap().clone()
        }
    }

    impl SocialPlatform for ScriptedPlatform {
        async fn create_post(
            &self,
            text: &str,
            _media_ids: Option<&[String]>,
        ) -> Result<String, CoreError> {
            let next = self.failures.lock().unwrap().pop().flatten();
            if let Some(error) = next {
                return Err(error.into());
            }
            let mut posted = self.posted.lock().unwrap();
            posted.push(text.to_string());
            Ok(format!("id-{}", posted.len()))
        }

        async fn lookup_post(&self, _post_id: &str) -> Result<Option<PostLookup>, CoreError> {
            Ok(None)
        }
    }

    fn drafts(count: usize) -> Vec<PostDraft> {
        (0..count)
            .map(|i| {
                PostDraft::new(
                    Category::ALL[i % 3],
                    format!("Draft number {} with enough text", i + 1),
                )
            })
            .collect()
    }

    fn policy(cooldown_minutes: u64) -> PublishPolicy {
        PublishPolicy {
            cooldown: Duration::from_secs(cooldown_minutes * 60),
            max_posts: 10,
            simulate_on_failure: true,
        }
    }

    #[test]
    fn test_fit_to_limit() {
        assert_eq!(fit_to_limit("short"), "short");

        let exact = "a".repeat(MAX_POST_CHARS);
        assert_eq!(fit_to_limit(&exact), exact);

        let fitted = fit_to_limit(&"b".repeat(300));
        assert_eq!(char_len(&fitted), MAX_POST_CHARS);
        assert!(fitted.ends_with("..."));
        assert_eq!(fitted.matches('b').count(), TRUNCATED_BODY_CHARS);
    }

    #[tokio::test]
    async fn test_publish_one_success() {
        let publisher = Publisher::new(ScriptedPlatform::default(), Pacer::new(), policy(0));
        let outcome = publisher.publish_one("Hello there, this is a post").await;
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                id: "id-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_simulated_platform_posts_are_marked() {
        let publisher = Publisher::new(x_client::SimulatedPlatform::new(), Pacer::new(), policy(0));

        let posted = publisher.publish_many(&drafts(2)).await.unwrap();
        assert_eq!(posted.len(), 2);
        assert!(posted.iter().all(|p| p.simulated && p.id.starts_with("sim_")));
        assert!(!ScriptedPlatform::default().is_simulated());
    }

    #[tokio::test]
    async fn test_publish_one_sends_truncated_text() {
        let publisher = Publisher::new(ScriptedPlatform::default(), Pacer::new(), policy(0));
        publisher.publish_one(&"z".repeat(500)).await;
        let sent = publisher.platform.posted();
        assert_eq!(char_len(&sent[0]), MAX_POST_CHARS);
    }

    #[tokio::test]
    async fn test_server_error_is_simulated() {
        let platform =
            ScriptedPlatform::with_script(vec![Some(PlatformApiError::ServerError { status_code: 503 })]);
        let publisher = Publisher::new(platform, Pacer::new(), policy(0));

        let outcome = publisher.publish_one("Will the platform take it?").await;
        assert!(outcome.is_simulated());
        assert!(outcome.id().unwrap().starts_with("sim_"));
    }

    #[tokio::test]
    async fn test_simulation_can_be_disabled() {
        let platform =
            ScriptedPlatform::with_script(vec![Some(PlatformApiError::ServerError { status_code: 500 })]);
        let publisher = Publisher::new(
            platform,
            Pacer::new(),
            PublishPolicy {
                simulate_on_failure: false,
                ..policy(0)
            },
        );

        let outcome = publisher.publish_one("Will the platform take it?").await;
        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_token_fails() {
        let platform = ScriptedPlatform::with_script(vec![Some(PlatformApiError::InvalidToken)]);
        let publisher = Publisher::new(platform, Pacer::new(), policy(0));

        let outcome = publisher.publish_one("Nobody is logged in").await;
        assert!(matches!(outcome, PublishOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_simulated_ids_are_unique() {
        let platform = ScriptedPlatform::with_script(vec![
            Some(PlatformApiError::RequestTimeout),
            Some(PlatformApiError::RequestTimeout),
        ]);
        let publisher = Publisher::new(platform, Pacer::new(), policy(0));

        let first = publisher.publish_one("first attempt at posting").await;
        let second = publisher.publish_one("second attempt at posting").await;
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_many_waits_between_posts() {
        let publisher = Publisher::new(ScriptedPlatform::default(), Pacer::new(), policy(30));

        let started = tokio::time::Instant::now();
        let posted = publisher.publish_many(&drafts(3)).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(posted.len(), 3);
        assert_eq!(posted[0].id, "id-1");
        assert_eq!(posted[1].category, Category::List);
        assert!(posted.iter().all(|p| !p.simulated && p.metrics.is_none()));
        // Two cooldowns: none after the last post
        assert!(elapsed >= Duration::from_secs(60 * 60));
        assert!(elapsed < Duration::from_secs(90 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_draft_consumes_no_cooldown() {
        let platform = ScriptedPlatform::with_script(vec![
            None,
            Some(PlatformApiError::InvalidToken),
            None,
        ]);
        let publisher = Publisher::new(platform, Pacer::new(), policy(30));

        let started = tokio::time::Instant::now();
        let posted = publisher.publish_many(&drafts(3)).await.unwrap();

        assert_eq!(posted.len(), 2);
        assert_eq!(posted[1].category, Category::Question);
        assert!(started.elapsed() < Duration::from_secs(60 * 60));
        assert!(started.elapsed() >= Duration::from_secs(30 * 60));
    }

    #[tokio::test]
    async fn test_all_failures_give_empty_batch() {
        let platform = ScriptedPlatform::with_script(vec![Some(PlatformApiError::InvalidToken); 3]);
        let publisher = Publisher::new(platform, Pacer::new(), policy(0));

        let posted = publisher.publish_many(&drafts(3)).await.unwrap();
        assert!(posted.is_empty());
    }

    #[tokio::test]
    async fn test_max_posts_cap() {
        let publisher = Publisher::new(
            ScriptedPlatform::default(),
            Pacer::new(),
            PublishPolicy {
                max_posts: 2,
                ..policy(0)
            },
        );

        let posted = publisher.publish_many(&drafts(5)).await.unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(publisher.platform.posted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_publishing() {
        let pacer = Pacer::new();
        let publisher = Publisher::new(ScriptedPlatform::default(), pacer.clone(), policy(30));

        let canceller = pacer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            canceller.cancel();
        });

        let result = publisher.publish_many(&drafts(3)).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(publisher.platform.posted().len(), 1);
    }
}
