use crate::domain::organization::Organization;
use crate::domain::ports::{DirectoryRef, OrganizationDirectory};
use crate::error::{FareError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Bounded retry with exponential backoff for directory lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (starting at 1).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

/// Wraps a directory so failed or timed-out lookups are retried.
///
/// A successful lookup that finds nothing is returned as is. When every
/// attempt fails the last error is returned; callers degrade from there.
pub struct RetryingDirectory {
    inner: DirectoryRef,
    policy: RetryPolicy,
}

impl RetryingDirectory {
    pub fn new(inner: DirectoryRef, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(&self, organization_id: &str) -> Result<Option<Organization>> {
        match tokio::time::timeout(
            self.policy.attempt_timeout,
            self.inner.organization_by_id(organization_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FareError::EnrichmentError(format!(
                "lookup timed out after {:?}",
                self.policy.attempt_timeout
            ))),
        }
    }
}

#[async_trait]
impl OrganizationDirectory for RetryingDirectory {
    async fn organization_by_id(&self, organization_id: &str) -> Result<Option<Organization>> {
        let mut retry = 0;
        loop {
            match self.attempt(organization_id).await {
                Ok(found) => return Ok(found),
                Err(e) if retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.backoff(retry);
                    tracing::debug!(
                        organization_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying organization lookup"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(organization_id, error = %e, "Error getting organization");
                    return Err(e);
                }
            }
        }
    }
}
