use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use trendcaster_core::CoreError;

/// Cancellable sleep shared by every wait in the pipeline
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration`, or return `CoreError::Cancelled` as soon as the
    /// token fires. A zero duration still observes cancellation.
    pub async fn wait(&self, duration: Duration) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }

        debug!("Waiting {:?}", duration);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
