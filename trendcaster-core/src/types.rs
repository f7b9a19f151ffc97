use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Hard character limit of a single post on the platform
pub const MAX_POST_CHARS: usize = 280;

/// Shortest draft the generator is willing to publish
pub const MIN_DRAFT_CHARS: usize = 20;

/// Style classification of generated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hook,
    List,
    Question,
}

impl Category {
    /// Generation order: the n-th parsed line becomes the n-th category
    pub const ALL: [Category; 3] = [Category::Hook, Category::List, Category::Question];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hook => "hook",
            Category::List => "list",
            Category::Question => "question",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hook" => Ok(Category::Hook),
            "list" => Ok(Category::List),
            "question" => Ok(Category::Question),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown post category '{}'", other),
            }),
        }
    }
}

/// Content advice for the next batch, keyed by the category that performed best.
/// `None` stands for a category we could not determine.
pub fn recommendation_for(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Hook) => "Strong opening statements with immediate value",
        Some(Category::List) => "Numbered lists and actionable tips",
        Some(Category::Question) => "Engaging questions that encourage replies",
        None => "Authentic, conversational content",
    }
}

/// Number of characters (not bytes) in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` down to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// An unpublished candidate post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub category: Category,
    pub text: String,
}

impl PostDraft {
    /// Build a draft, truncating the text to the platform limit
    pub fn new(category: Category, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if char_len(&text) > MAX_POST_CHARS {
            truncate_chars(&text, MAX_POST_CHARS)
        } else {
            text
        };
        Self { category, text }
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }

    /// Whether the text length lies in `[MIN_DRAFT_CHARS, MAX_POST_CHARS]`
    pub fn is_publishable(&self) -> bool {
        (MIN_DRAFT_CHARS..=MAX_POST_CHARS).contains(&self.char_len())
    }
}

/// Result of publishing a single post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The platform accepted the post and assigned `id`
    Published { id: String },
    /// The platform call failed and a placeholder `id` was synthesized locally
    Simulated { id: String },
    /// Nothing was posted
    Failed { reason: String },
}

impl PublishOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            PublishOutcome::Published { id } | PublishOutcome::Simulated { id } => Some(id),
            PublishOutcome::Failed { .. } => None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, PublishOutcome::Simulated { .. })
    }
}

/// A post that went out (or was simulated), later enriched with metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EngagementMetrics>,
}

impl PublishedPost {
    pub fn likes(&self) -> u64 {
        self.metrics.as_ref().map(|m| m.likes).unwrap_or(0)
    }

    pub fn retweets(&self) -> u64 {
        self.metrics.as_ref().map(|m| m.retweets).unwrap_or(0)
    }

    pub fn engagement_rate(&self) -> f64 {
        self.metrics
            .as_ref()
            .map(|m| m.engagement_rate)
            .unwrap_or(0.0)
    }
}

/// Raw public counters as reported by the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementCounters {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
    pub bookmarks: u64,
    pub impressions: u64,
}

impl EngagementCounters {
    /// Percentage of impressions that produced a like, retweet, reply or quote.
    /// Zero when there are no impressions.
    pub fn engagement_rate(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        let interactions = self.likes + self.retweets + self.replies + self.quotes;
        round2(interactions as f64 / self.impressions as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub post_id: String,
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
    pub bookmarks: u64,
    pub impressions: u64,
    pub engagement_rate: f64,
    pub created_at: Option<String>,
}

impl EngagementMetrics {
    pub fn from_counters(
        post_id: impl Into<String>,
        counters: EngagementCounters,
        created_at: Option<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            likes: counters.likes,
            retweets: counters.retweets,
            replies: counters.replies,
            quotes: counters.quotes,
            bookmarks: counters.bookmarks,
            impressions: counters.impressions,
            engagement_rate: counters.engagement_rate(),
            created_at,
        }
    }
}

/// Metrics for a batch of tracked posts, keyed by post identifier
#[derive(Debug, Clone, Default)]
pub struct MetricsBatch {
    pub metrics: HashMap<String, EngagementMetrics>,
    /// Identifiers whose lookup failed or returned nothing
    pub missing: Vec<String>,
}

impl MetricsBatch {
    pub fn get(&self, post_id: &str) -> Option<&EngagementMetrics> {
        self.metrics.get(post_id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Trend labels sampled for one run cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub patterns: Vec<String>,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInsight {
    pub best_post: PublishedPost,
    pub avg_likes: f64,
    pub avg_engagement_rate: f64,
    pub best_performing_category: Category,
    pub total_posts_analyzed: usize,
    #[serde(default)]
    pub posts_meeting_threshold: usize,
    #[serde(default)]
    pub top_keywords: Vec<String>,
}

/// Condensed prior performance fed back into the next generation prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDigest {
    pub best_category: Option<Category>,
    pub avg_likes: f64,
    pub avg_engagement_rate: f64,
    pub top_keywords: Vec<String>,
}

impl From<&StrategyInsight> for PerformanceDigest {
    fn from(insight: &StrategyInsight) -> Self {
        Self {
            best_category: Some(insight.best_performing_category),
            avg_likes: insight.avg_likes,
            avg_engagement_rate: insight.avg_engagement_rate,
            top_keywords: insight.top_keywords.clone(),
        }
    }
}

/// Terminal artifact of one run cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub trends_used: Vec<String>,
    pub hashtags_used: Vec<String>,
    #[serde(default)]
    pub drafts_generated: Vec<PostDraft>,
    pub posts_published: Vec<PublishedPost>,
    pub insights: Option<StrategyInsight>,
    pub hypothesis: String,
    #[serde(default)]
    pub dry_run: bool,
}

impl RunSummary {
    pub fn digest(&self) -> Option<PerformanceDigest> {
        self.insights.as_ref().map(PerformanceDigest::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_rate() {
        let counters = EngagementCounters {
            likes: 10,
            retweets: 5,
            replies: 2,
            quotes: 1,
            bookmarks: 7,
            impressions: 200,
        };
        assert_eq!(counters.engagement_rate(), 9.0);
    }

    #[test]
    fn test_engagement_rate_without_impressions() {
        let counters = EngagementCounters {
            likes: 10,
            retweets: 5,
            ..Default::default()
        };
        assert_eq!(counters.engagement_rate(), 0.0);
    }

    #[test]
    fn test_engagement_rate_is_rounded() {
        let counters = EngagementCounters {
            likes: 1,
            impressions: 3,
            ..Default::default()
        };
        assert_eq!(counters.engagement_rate(), 33.33);
    }

    #[test]
    fn test_draft_is_truncated_to_limit() {
        let draft = PostDraft::new(Category::Hook, "x".repeat(400));
        assert_eq!(draft.char_len(), MAX_POST_CHARS);
        assert!(draft.is_publishable());
    }

    #[test]
    fn test_draft_truncation_counts_characters() {
        let draft = PostDraft::new(Category::List, "é".repeat(300));
        assert_eq!(draft.char_len(), MAX_POST_CHARS);
        assert_eq!(draft.text.len(), MAX_POST_CHARS * 2);
    }

    #[test]
    fn test_short_draft_is_not_publishable() {
        let draft = PostDraft::new(Category::Question, "Too short?");
        assert!(!draft.is_publishable());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("hook".parse::<Category>().unwrap(), Category::Hook);
        assert_eq!(" List ".parse::<Category>().unwrap(), Category::List);
        assert!("thread".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Question).unwrap();
        assert_eq!(json, "\"question\"");
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(
            recommendation_for(Some(Category::List)),
            "Numbered lists and actionable tips"
        );
        assert_eq!(
            recommendation_for(None),
            "Authentic, conversational content"
        );
    }

    #[test]
    fn test_publish_outcome_ids() {
        let published = PublishOutcome::Published {
            id: "1".to_string(),
        };
        let simulated = PublishOutcome::Simulated {
            id: "sim_1".to_string(),
        };
        let failed = PublishOutcome::Failed {
            reason: "down".to_string(),
        };

        assert_eq!(published.id(), Some("1"));
        assert!(!published.is_simulated());
        assert_eq!(simulated.id(), Some("sim_1"));
        assert!(simulated.is_simulated());
        assert_eq!(failed.id(), None);
    }

    #[test]
    fn test_published_post_without_metrics_counts_zero() {
        let post = PublishedPost {
            id: "1".to_string(),
            text: "hello".to_string(),
            category: Category::Hook,
            published_at: Utc::now(),
            simulated: false,
            metrics: None,
        };
        assert_eq!(post.likes(), 0);
        assert_eq!(post.retweets(), 0);
        assert_eq!(post.engagement_rate(), 0.0);
    }
}
