//! Timeout helpers for external calls
//!
//! Every backend call, document fetch and sheet download runs under an
//! explicit deadline so a stalled dependency surfaces as
//! [`SiftError::Timeout`] instead of hanging a job.

use std::future::Future;
use std::time::Duration;

use crate::types::{Result, SiftError};

/// Execute a fallible async operation with a timeout
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SiftError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, SiftError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, SiftError>(42)
            },
            "slow operation",
        )
        .await;
        match result.unwrap_err() {
            SiftError::Timeout { operation, .. } => assert_eq!(operation, "slow operation"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(SiftError::Config("bad".to_string())) },
            "op",
        )
        .await;
        assert!(matches!(result, Err(SiftError::Config(_))));
    }
}
