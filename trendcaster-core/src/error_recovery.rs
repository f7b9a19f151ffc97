//! Failure policy for the posting pipeline.
//!
//! Every collaborator failure is mapped to a one-shot local substitution.
//! There are no retries: a failed call is either replaced by a fallback
//! value, replaced by a simulated result, skipped, or it ends the run.

use crate::{CoreError, PlatformApiError, Stage};

/// What a pipeline stage should do with a failed collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Substitute canned content
    Fallback,
    /// Pretend the call succeeded with a locally synthesized result
    Simulate,
    /// Drop the item and continue with the rest
    Skip,
    /// Give up on the item, the caller decides whether the run survives
    Fail,
}

/// Determine the recovery strategy for an error raised in `stage`
pub fn determine_strategy(stage: Stage, error: &CoreError) -> RecoveryStrategy {
    // Configuration problems need user intervention wherever they surface
    if matches!(error, CoreError::Config(_)) {
        return RecoveryStrategy::Fail;
    }

    match stage {
        Stage::Generate => RecoveryStrategy::Fallback,
        Stage::Publish => {
            if client_unusable(error) {
                RecoveryStrategy::Fail
            } else {
                RecoveryStrategy::Simulate
            }
        }
        Stage::Track | Stage::Persist => RecoveryStrategy::Skip,
        Stage::Discover | Stage::Optimize => RecoveryStrategy::Fail,
    }
}

/// Errors meaning the platform client cannot act on our behalf at all
fn client_unusable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::PlatformApi(PlatformApiError::InvalidToken)
            | CoreError::PlatformApi(PlatformApiError::AuthenticationFailed { .. })
            | CoreError::Cancelled
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, LlmError};

    #[test]
    fn test_generation_failures_fall_back() {
        let error = CoreError::Llm(LlmError::ServiceUnavailable {
            provider: "gemini".to_string(),
        });
        assert_eq!(
            determine_strategy(Stage::Generate, &error),
            RecoveryStrategy::Fallback
        );
    }

    #[test]
    fn test_publish_failures_are_simulated() {
        let forbidden = CoreError::PlatformApi(PlatformApiError::Forbidden {
            resource: "/2/tweets".to_string(),
        });
        assert_eq!(
            determine_strategy(Stage::Publish, &forbidden),
            RecoveryStrategy::Simulate
        );

        let server = CoreError::PlatformApi(PlatformApiError::ServerError { status_code: 503 });
        assert_eq!(
            determine_strategy(Stage::Publish, &server),
            RecoveryStrategy::Simulate
        );
    }

    #[test]
    fn test_publish_with_unusable_client_fails() {
        let invalid = CoreError::PlatformApi(PlatformApiError::InvalidToken);
        assert_eq!(
            determine_strategy(Stage::Publish, &invalid),
            RecoveryStrategy::Fail
        );
    }

    #[test]
    fn test_tracking_gaps_are_skipped() {
        let missing = CoreError::PlatformApi(PlatformApiError::PostNotFound {
            post_id: "123".to_string(),
        });
        assert_eq!(
            determine_strategy(Stage::Track, &missing),
            RecoveryStrategy::Skip
        );
    }

    #[test]
    fn test_config_errors_always_fail() {
        let error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
            var_name: "GEMINI_KEY".to_string(),
        });
        assert_eq!(
            determine_strategy(Stage::Generate, &error),
            RecoveryStrategy::Fail
        );
        assert_eq!(
            determine_strategy(Stage::Track, &error),
            RecoveryStrategy::Fail
        );
    }
}
