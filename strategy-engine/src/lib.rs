pub mod optimizer;
pub mod trends;

pub use optimizer::{extract_hashtags, StrategyOptimizer, NO_DATA_HYPOTHESIS};
pub use trends::{TrendSource, HASHTAG_POOL, PATTERN_POOL};
