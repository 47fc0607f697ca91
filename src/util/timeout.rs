//! Timeout and cancellation helpers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::StepwiseError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, StepwiseError>>,
) -> Result<T, StepwiseError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StepwiseError::Timeout(duration.as_millis() as u64)),
    }
}

/// Race a future against an optional cancellation token.
///
/// Without a token this is a plain await.
pub async fn with_cancellation<T>(
    cancel: Option<&CancellationToken>,
    future: impl Future<Output = Result<T, StepwiseError>>,
) -> Result<T, StepwiseError> {
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(StepwiseError::Cancelled),
                result = future => result,
            }
        }
        None => future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out_with_millis() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StepwiseError::Timeout(50))));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.ok(), Some(7));
    }

    #[tokio::test]
    async fn cancelled_token_wins_the_race() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), _> = with_cancellation(Some(&token), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StepwiseError::Cancelled)));
    }
}
