use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use trendcaster_core::TrendSnapshot;

pub const PATTERN_POOL: [&str; 10] = [
    "Hook + numbered list format",
    "Question-based engagement tweets",
    "Personal story with lesson learned",
    "Contrarian takes on popular topics",
    "Behind-the-scenes content",
    "Thread starters with cliffhangers",
    "Relatable daily struggles",
    "Quick tips and hacks",
    "Motivational morning thoughts",
    "Weekend reflection posts",
];

pub const HASHTAG_POOL: [&str; 10] = [
    "#MondayMotivation",
    "#TechTips",
    "#ProductivityHack",
    "#WeekendReflections",
    "#StartupLife",
    "#RemoteWork",
    "#LifeLessons",
    "#GrowthMindset",
    "#Innovation",
    "#Success",
];

pub const PATTERNS_PER_SAMPLE: usize = 5;
pub const HASHTAGS_PER_SAMPLE: usize = 3;

/// Samples trend labels from static pools. Every call is an independent
/// draw without replacement.
#[derive(Debug)]
pub struct TrendSource {
    rng: Mutex<fastrand::Rng>,
    latency_ms: Option<RangeInclusive<u64>>,
}

impl Default for TrendSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
            latency_ms: None,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
            latency_ms: None,
        }
    }

    /// Sleep a random duration in `range` before each draw, like a remote lookup would
    pub fn with_simulated_latency(mut self, range: RangeInclusive<Duration>) -> Self {
        let start = range.start().as_millis() as u64;
        let end = range.end().as_millis() as u64;
        self.latency_ms = Some(start.min(end)..=end.max(start));
        self
    }

    async fn sample(&self, pool: &[&str], amount: usize) -> Vec<String> {
        if let Some(range) = &self.latency_ms {
            let delay = self.rng.lock().await.u64(range.clone());
            debug!("Simulating trend lookup latency of {}ms", delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut rng = self.rng.lock().await;
        let mut picked = rng.choose_multiple(pool.iter(), amount);
        rng.shuffle(&mut picked);
        picked.into_iter().map(|label| label.to_string()).collect()
    }

    pub async fn patterns(&self) -> Vec<String> {
        let patterns = self.sample(&PATTERN_POOL, PATTERNS_PER_SAMPLE).await;
        info!("Discovered trending patterns: {:?}", patterns);
        patterns
    }

    pub async fn hashtags(&self) -> Vec<String> {
        let hashtags = self.sample(&HASHTAG_POOL, HASHTAGS_PER_SAMPLE).await;
        info!("Discovered trending hashtags: {:?}", hashtags);
        hashtags
    }

    pub async fn snapshot(&self) -> TrendSnapshot {
        TrendSnapshot {
            patterns: self.patterns().await,
            hashtags: self.hashtags().await,
        }
    }
}
