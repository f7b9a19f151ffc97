use trendcaster_core::{recommendation_for, PerformanceDigest};

/// Compose the single generation instruction from trend labels and, when a
/// previous cycle produced insights, a digest of how it performed.
pub fn build_prompt(trend_patterns: &[String], previous: Option<&PerformanceDigest>) -> String {
    let mut prompt = String::new();

    prompt.push_str("You write short social media posts that people want to share.\n");
    prompt.push_str(&format!(
        "Trending content patterns right now: {}\n",
        trend_patterns.join(", ")
    ));

    if let Some(digest) = previous {
        let category = digest
            .best_category
            .map(|c| c.as_str())
            .unwrap_or("unknown");
        let keywords = if digest.top_keywords.is_empty() {
            "none yet".to_string()
        } else {
            digest.top_keywords.join(", ")
        };

        prompt.push_str("\nHow the last batch performed:\n");
        prompt.push_str(&format!("- Best performing style: {}\n", category));
        prompt.push_str(&format!("- Average likes: {:.2}\n", digest.avg_likes));
        prompt.push_str(&format!(
            "- Average engagement rate: {:.2}%\n",
            digest.avg_engagement_rate
        ));
        prompt.push_str(&format!("- Top keywords: {}\n", keywords));
        prompt.push_str(&format!(
            "- Lean into: {}\n",
            recommendation_for(digest.best_category)
        ));
    }

    prompt.push_str(
        "\nWrite exactly 3 posts, each under 280 characters:\n\
         1. A hook that grabs attention in the first few words\n\
         2. A list with numbered tips or points\n\
         3. A question that invites replies\n\
         \n\
         Rules:\n\
         - Conversational, modern tone\n\
         - One relevant hashtag per post\n\
         - Every post must be complete and ready to publish\n\
         - No markdown, no code blocks, no JSON, no labels such as \"Tweet 1:\"\n\
         - Put each post on its own single line\n\
         \n\
         Reply with the 3 posts only, one per line.\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendcaster_core::Category;

    fn patterns() -> Vec<String> {
        vec![
            "Quick tips and hacks".to_string(),
            "Behind-the-scenes content".to_string(),
        ]
    }

    #[test]
    fn test_prompt_lists_patterns() {
        let prompt = build_prompt(&patterns(), None);
        assert!(prompt.contains("Quick tips and hacks, Behind-the-scenes content"));
        assert!(prompt.contains("exactly 3 posts"));
        assert!(!prompt.contains("How the last batch performed"));
    }

    #[test]
    fn test_prompt_includes_digest() {
        let digest = PerformanceDigest {
            best_category: Some(Category::List),
            avg_likes: 12.5,
            avg_engagement_rate: 3.456,
            top_keywords: vec!["#TechTips".to_string(), "#RemoteWork".to_string()],
        };
        let prompt = build_prompt(&patterns(), Some(&digest));

        assert!(prompt.contains("Best performing style: list"));
        assert!(prompt.contains("Average engagement rate: 3.46%"));
        assert!(prompt.contains("#TechTips, #RemoteWork"));
        assert!(prompt.contains("Numbered lists and actionable tips"));
    }

    #[test]
    fn test_unknown_category_uses_generic_advice() {
        let digest = PerformanceDigest {
            best_category: None,
            avg_likes: 0.0,
            avg_engagement_rate: 0.0,
            top_keywords: Vec::new(),
        };
        let prompt = build_prompt(&patterns(), Some(&digest));
        assert!(prompt.contains("Best performing style: unknown"));
        assert!(prompt.contains("Authentic, conversational content"));
        assert!(prompt.contains("Top keywords: none yet"));
    }
}
