use tracing::info;
use trendcaster_core::{recommendation_for, round2, Category, PublishedPost, StrategyInsight};

pub const NO_DATA_HYPOTHESIS: &str = "No data available for optimization";

/// Keywords reported per insight
const TOP_KEYWORDS: usize = 3;

/// Derives performance insights from published posts with merged metrics
#[derive(Debug, Clone)]
pub struct StrategyOptimizer {
    engagement_threshold: u64,
}

impl StrategyOptimizer {
    pub fn new(engagement_threshold: u64) -> Self {
        Self {
            engagement_threshold,
        }
    }

    pub fn optimize(&self, records: &[PublishedPost]) -> (Option<StrategyInsight>, String) {
        let Some(best_post) = best_post(records) else {
            info!("No posts to analyse");
            return (None, NO_DATA_HYPOTHESIS.to_string());
        };

        let count = records.len() as f64;
        let avg_likes = records.iter().map(|p| p.likes() as f64).sum::<f64>() / count;
        let avg_engagement_rate = records.iter().map(|p| p.engagement_rate()).sum::<f64>() / count;

        let best_category = best_category(records).unwrap_or(best_post.category);
        let posts_meeting_threshold = records
            .iter()
            .filter(|p| p.likes() >= self.engagement_threshold)
            .count();

        let insight = StrategyInsight {
            best_post: best_post.clone(),
            avg_likes: round2(avg_likes),
            avg_engagement_rate: round2(avg_engagement_rate),
            best_performing_category: best_category,
            total_posts_analyzed: records.len(),
            posts_meeting_threshold,
            top_keywords: top_keywords(records),
        };

        let hypothesis = format!(
            "Optimization Insights:\n\
             - Best performing post type: {}\n\
             - Average engagement rate: {:.2}%\n\
             - Focus on: {}",
            best_category,
            avg_engagement_rate,
            recommendation_for(Some(best_category))
        );

        info!(
            "Strategy optimized. Best post got {} likes, {} of {} posts met the threshold of {}",
            best_post.likes(),
            posts_meeting_threshold,
            records.len(),
            self.engagement_threshold
        );
        (Some(insight), hypothesis)
    }
}

/// Highest likes + 2 x retweets; the first post wins a tie
fn best_post(records: &[PublishedPost]) -> Option<&PublishedPost> {
    let score = |p: &PublishedPost| p.likes() + 2 * p.retweets();

    let mut best: Option<&PublishedPost> = None;
    for post in records {
        if best.map_or(true, |current| score(post) > score(current)) {
            best = Some(post);
        }
    }
    best
}

/// Category with the highest mean likes. No minimum sample size: a single
/// post can carry its category. Ties keep the category seen first.
fn best_category(records: &[PublishedPost]) -> Option<Category> {
    let mut groups: Vec<(Category, u64, u64)> = Vec::new();
    for post in records {
        match groups.iter_mut().find(|(c, _, _)| *c == post.category) {
            Some((_, likes, count)) => {
                *likes += post.likes();
                *count += 1;
            }
            None => groups.push((post.category, post.likes(), 1)),
        }
    }

    let mut best: Option<(Category, f64)> = None;
    for (category, likes, count) in groups {
        let mean = likes as f64 / count as f64;
        if best.map_or(true, |(_, top)| mean > top) {
            best = Some((category, mean));
        }
    }
    best.map(|(category, _)| category)
}

/// Hashtags in `text`, without trailing punctuation
pub fn extract_hashtags(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.starts_with('#'))
        .map(|word| word.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|tag| tag.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Hashtags ranked by the likes of the posts that used them
fn top_keywords(records: &[PublishedPost]) -> Vec<String> {
    let mut totals: Vec<(String, u64)> = Vec::new();
    for post in records {
        let mut seen_in_post: Vec<String> = Vec::new();
        for tag in extract_hashtags(&post.text) {
            if seen_in_post.contains(&tag) {
                continue;
            }
            match totals.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, likes)) => *likes += post.likes(),
                None => totals.push((tag.clone(), post.likes())),
            }
            seen_in_post.push(tag);
        }
    }

    // Stable sort keeps first appearance on equal likes
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(tag, _)| tag)
        .collect()
}
