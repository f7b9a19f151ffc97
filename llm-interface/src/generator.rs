use crate::parser::parse_drafts;
use crate::prompt::build_prompt;
use crate::LlmProvider;
use tracing::{info, warn};
use trendcaster_core::{
    determine_strategy, Category, CoreError, ErrorExt, PerformanceDigest, PostDraft,
    RecoveryStrategy, Stage,
};

/// Number of drafts produced per generation call
pub const DRAFTS_PER_BATCH: usize = 3;

/// Which canned content, if any, went into a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    /// Every draft came from the model
    None,
    /// Missing categories were filled with canned drafts
    Padded,
    /// The batch failed validation and was replaced wholesale
    Replaced,
    /// The model could not be reached
    ServiceError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub drafts: Vec<PostDraft>,
    pub tier: FallbackTier,
}

// Indexed by category position: hook, list, question
const PADDING: [&str; DRAFTS_PER_BATCH] = [
    "Most people overestimate what they can do in a week and underestimate what they can do in a year. Play the long game. #Success",
    "3 habits that quietly changed everything for me:\n1. Plan tomorrow tonight\n2. Protect the first hour\n3. Finish before you polish #Growth",
    "Which piece of advice did you ignore for years before realising it was right all along? #PersonalGrowth",
];

const REPLACEMENT: [&str; DRAFTS_PER_BATCH] = [
    "Busy is not the same as productive. The calendar that looks full is often the one going nowhere. #WorkLife",
    "5 tiny habits that compound:\n1. Write down one win a day\n2. Walk without your phone\n3. Read before you scroll\n4. Batch your email\n5. Sleep on big decisions #Habits",
    "If you could get a decade of experience in one skill overnight, which skill would you pick? #Skills",
];

const SERVICE_ERROR: [&str; DRAFTS_PER_BATCH] = [
    "Waiting for the perfect moment is the most expensive habit there is. Start rough, improve in public. #Motivation",
    "4 questions before any big decision:\n1. Will this matter in a year?\n2. What is the cost of doing nothing?\n3. Who has done it before?\n4. What would I regret skipping? #DecisionMaking",
    "What is one small change you made this year that paid off far more than you expected? #LifeHacks",
];

fn canned(texts: &[&str; DRAFTS_PER_BATCH]) -> Vec<PostDraft> {
    Category::ALL
        .iter()
        .zip(texts.iter())
        .map(|(category, text)| PostDraft::new(*category, *text))
        .collect()
}

/// Turns trend patterns into exactly three publishable drafts
#[derive(Debug)]
pub struct ContentGenerator<L> {
    provider: L,
}

impl<L: LlmProvider> ContentGenerator<L> {
    pub fn new(provider: L) -> Self {
        Self { provider }
    }

    /// Generate one batch of drafts. Collaborator and parse failures are
    /// absorbed into a fallback tier; only errors that need user
    /// intervention (configuration) are returned.
    pub async fn generate(
        &self,
        trend_patterns: &[String],
        previous: Option<&PerformanceDigest>,
    ) -> Result<Generation, CoreError> {
        let prompt = build_prompt(trend_patterns, previous);

        let raw = match self.provider.generate(&prompt).await {
            Ok(raw) => {
                info!("Generated content with {}", self.provider.name());
                raw
            }
            Err(e) => match determine_strategy(Stage::Generate, &e) {
                RecoveryStrategy::Fail => {
                    e.log_error();
                    return Err(e);
                }
                _ => {
                    warn!(
                        "Generation with {} failed, using canned drafts: {}",
                        self.provider.name(),
                        e
                    );
                    return Ok(Generation {
                        drafts: canned(&SERVICE_ERROR),
                        tier: FallbackTier::ServiceError,
                    });
                }
            },
        };

        Ok(drafts_from_output(&raw))
    }
}

/// Map raw model output onto the three categories, padding and
/// validating as needed
pub fn drafts_from_output(raw: &str) -> Generation {
    let report = parse_drafts(raw);
    if !report.rejected.is_empty() {
        info!("Discarded {} non-draft lines", report.rejected.len());
    }

    let mut drafts: Vec<PostDraft> = Category::ALL
        .iter()
        .zip(report.drafts.iter())
        .map(|(category, line)| PostDraft::new(*category, line.as_str()))
        .collect();

    let mut tier = FallbackTier::None;
    if drafts.len() < DRAFTS_PER_BATCH {
        warn!(
            "Only {} drafts parsed, padding with canned content",
            drafts.len()
        );
        for position in drafts.len()..DRAFTS_PER_BATCH {
            drafts.push(PostDraft::new(Category::ALL[position], PADDING[position]));
        }
        tier = FallbackTier::Padded;
    }

    let valid = drafts.iter().filter(|d| d.is_publishable()).count();
    if valid < DRAFTS_PER_BATCH {
        warn!(
            "{} of {} drafts failed length validation, replacing batch",
            DRAFTS_PER_BATCH - valid,
            DRAFTS_PER_BATCH
        );
        return Generation {
            drafts: canned(&REPLACEMENT),
            tier: FallbackTier::Replaced,
        };
    }

    Generation { drafts, tier }
}
