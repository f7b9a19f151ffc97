use crate::publisher::Publisher;
use crate::results::{ResultKind, ResultStore};
use crate::timer::Pacer;
use crate::tracker::MetricsTracker;
use chrono::Utc;
use llm_interface::{ContentGenerator, FallbackTier, LlmProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strategy_engine::{StrategyOptimizer, TrendSource};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use trendcaster_core::{
    char_len, determine_strategy, CoreError, ErrorExt, PerformanceDigest, PostDraft,
    PublishedPost, RecoveryStrategy, RunSummary, Settings, Stage,
};
use x_client::SocialPlatform;

/// Drafts shorter than this get the leading trend hashtag appended
pub const HASHTAG_ROOM_CHARS: usize = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Pause between publishing and the metrics poll
    pub engagement_wait: Duration,
    pub engagement_threshold: u64,
    pub dry_run: bool,
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            engagement_wait: settings.engagement_wait(),
            engagement_threshold: settings.engagement_threshold,
            dry_run: false,
        }
    }
}

/// Clears the run flag when the cycle ends, however it ends
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::RunInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Append `hashtag` to every draft that still has room for it
pub fn decorate_with_hashtag(drafts: Vec<PostDraft>, hashtag: Option<&str>) -> Vec<PostDraft> {
    let Some(hashtag) = hashtag else {
        return drafts;
    };

    drafts
        .into_iter()
        .map(|draft| {
            if char_len(&draft.text) < HASHTAG_ROOM_CHARS {
                PostDraft::new(draft.category, format!("{} {}", draft.text, hashtag))
            } else {
                draft
            }
        })
        .collect()
}

/// Runs discover, generate, publish, track and optimize as one cycle
pub struct Orchestrator<L, P> {
    trends: TrendSource,
    generator: ContentGenerator<L>,
    publisher: Publisher<P>,
    tracker: MetricsTracker<P>,
    optimizer: StrategyOptimizer,
    pacer: Pacer,
    store: Option<ResultStore>,
    options: OrchestratorOptions,
    running: AtomicBool,
    previous: Mutex<Option<PerformanceDigest>>,
}

impl<L: LlmProvider, P: SocialPlatform> Orchestrator<L, P> {
    pub fn new(
        trends: TrendSource,
        generator: ContentGenerator<L>,
        publisher: Publisher<P>,
        tracker: MetricsTracker<P>,
        pacer: Pacer,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            trends,
            generator,
            publisher,
            tracker,
            optimizer: StrategyOptimizer::new(options.engagement_threshold),
            pacer,
            store: None,
            options,
            running: AtomicBool::new(false),
            previous: Mutex::new(None),
        }
    }

    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn result_kind(&self) -> ResultKind {
        if self.options.dry_run {
            ResultKind::DryRun
        } else {
            ResultKind::Run
        }
    }

    pub async fn previous_performance(&self) -> Option<PerformanceDigest> {
        self.previous.lock().await.clone()
    }

    pub async fn set_previous_performance(&self, digest: Option<PerformanceDigest>) {
        *self.previous.lock().await = digest;
    }

    /// Seed the feedback loop from the newest saved summary. A missing or
    /// unreadable file leaves the digest empty.
    pub async fn load_previous_performance(&self) {
        let Some(store) = &self.store else {
            return;
        };

        match store.latest(self.result_kind()).await {
            Ok(Some(summary)) => {
                let digest = summary.digest();
                if digest.is_some() {
                    info!("Loaded previous performance from {}", summary.timestamp);
                }
                self.set_previous_performance(digest).await;
            }
            Ok(None) => info!("No previous results found"),
            Err(e) => {
                e.log_warn();
            }
        }
    }

    /// One full cycle. Fails with `RunInProgress` if a cycle is already
    /// running, `RunAborted` when there is nothing to publish or nothing was
    /// published, and `Cancelled` when the pacer fires mid-cycle.
    pub async fn run_cycle(&self) -> Result<RunSummary, CoreError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let timestamp = Utc::now();
        info!(
            "Starting run cycle{}",
            if self.options.dry_run { " (dry run)" } else { "" }
        );

        info!("Step 1: discovering trends");
        let trends = self.trends.snapshot().await;

        info!("Step 2: generating drafts");
        let previous = self.previous_performance().await;
        let generation = self
            .generator
            .generate(&trends.patterns, previous.as_ref())
            .await?;
        if generation.tier != FallbackTier::None {
            warn!("Drafts use fallback tier {:?}", generation.tier);
        }
        if generation.drafts.is_empty() {
            return Err(CoreError::RunAborted {
                stage: Stage::Generate,
                reason: "no drafts were generated".to_string(),
            });
        }

        let drafts =
            decorate_with_hashtag(generation.drafts, trends.hashtags.first().map(String::as_str));
        for (i, draft) in drafts.iter().enumerate() {
            info!("Draft {} ({}): {}", i + 1, draft.category, draft.text);
        }

        info!("Step 3: publishing");
        let mut posts = self.publisher.publish_many(&drafts).await?;
        if posts.is_empty() {
            return Err(CoreError::RunAborted {
                stage: Stage::Publish,
                reason: "no posts were published".to_string(),
            });
        }

        info!("Step 4: tracking engagement");
        self.pacer.wait(self.options.engagement_wait).await?;
        let tracked: Vec<String> = posts
            .iter()
            .filter(|post| !post.simulated || self.tracker.tracks_simulated())
            .map(|post| post.id.clone())
            .collect();
        let batch = self.tracker.track_many(&tracked).await;
        for post in posts.iter_mut() {
            post.metrics = batch.get(&post.id).cloned();
        }
        if !batch.missing.is_empty() {
            warn!("No metrics for posts {:?}", batch.missing);
        }

        info!("Step 5: optimizing strategy");
        let (insights, hypothesis) = self.optimizer.optimize(&posts);

        let summary = RunSummary {
            timestamp,
            trends_used: trends.patterns,
            hashtags_used: trends.hashtags,
            drafts_generated: drafts,
            posts_published: posts,
            insights,
            hypothesis,
            dry_run: self.options.dry_run,
        };

        self.persist(&summary).await;
        if let Some(digest) = summary.digest() {
            self.set_previous_performance(Some(digest)).await;
        }
        log_summary(&summary);

        Ok(summary)
    }

    /// `run_cycle` with failures reduced to a log line
    pub async fn run(&self) -> Option<RunSummary> {
        match self.run_cycle().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Run cycle failed: {}", e);
                e.log_error();
                None
            }
        }
    }

    async fn persist(&self, summary: &RunSummary) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = store.save(summary, self.result_kind()).await {
            match determine_strategy(Stage::Persist, &e) {
                RecoveryStrategy::Skip => warn!("Could not save results: {}", e),
                _ => error!("Could not save results: {}", e),
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    let published = real_posts(&summary.posts_published).count();

    info!("{}", "=".repeat(50));
    info!("RUN SUMMARY");
    info!(
        "Posts published: {} ({} simulated)",
        summary.posts_published.len(),
        summary.posts_published.len() - published
    );
    if let Some(insights) = &summary.insights {
        info!("Best post got {} likes", insights.best_post.likes());
        info!("Average engagement rate: {}%", insights.avg_engagement_rate);
        info!("Best performing type: {}", insights.best_performing_category);
    }
    info!("{}", "=".repeat(50));
}

/// Posts that went out for real, as opposed to local placeholders
pub fn real_posts(posts: &[PublishedPost]) -> impl Iterator<Item = &PublishedPost> {
    posts.iter().filter(|p| !p.simulated)
}
