pub mod gemini;
pub mod generator;
pub mod parser;
pub mod prompt;

pub use gemini::GeminiProvider;
pub use generator::{drafts_from_output, ContentGenerator, FallbackTier, Generation};
pub use parser::{classify_line, parse_drafts, LineKind, ParseReport};
pub use prompt::build_prompt;

use std::sync::Arc;
use trendcaster_core::CoreError;

/// A generative-text service: one free-text prompt in, free text out
pub trait LlmProvider {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

impl<T: LlmProvider> LlmProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        (**self).generate(prompt).await
    }
}
