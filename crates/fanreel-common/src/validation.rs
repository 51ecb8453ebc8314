//! Input preconditions and bounded retry
//!
//! Shared precondition checks used by every service entry point, plus
//! `with_retry` for transient failures of read-only external calls.
//! Financial writes are never routed through the retry helper.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{MarketError, MarketResult};

/// Fail with a `Validation` error when the value is empty or whitespace
pub fn require_non_empty(value: &str, field: &str) -> MarketResult<()> {
    if value.trim().is_empty() {
        return Err(MarketError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Fail with a `Validation` error when the amount is not strictly positive
pub fn require_positive_amount(amount: i64, field: &str) -> MarketResult<()> {
    if amount <= 0 {
        return Err(MarketError::validation(field, "must be a positive amount"));
    }
    Ok(())
}

/// Parse a UUID, failing with a `Validation` error naming the field
pub fn require_uuid(value: &str, field: &str) -> MarketResult<Uuid> {
    require_non_empty(value, field)?;
    Uuid::parse_str(value.trim())
        .map_err(|_| MarketError::validation(field, "must be a valid UUID"))
}

/// Check the rough shape of an email address
///
/// Deliverability is the mail system's problem; this only rejects values
/// that cannot possibly be an address.
pub fn require_email(value: &str) -> MarketResult<()> {
    require_non_empty(value, "email")?;
    let v = value.trim();
    let Some((local, domain)) = v.split_once('@') else {
        return Err(MarketError::validation("email", "must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.ends_with('.') {
        return Err(MarketError::validation("email", "malformed address"));
    }
    Ok(())
}

/// Retry configuration for transient external-call failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay grows linearly: attempt number times this base
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Run a fallible async operation with linearly increasing backoff
///
/// Re-raises the last error after exhausting `policy.max_attempts`.
/// Only suitable for idempotent operations.
pub async fn with_retry<F, Fut, T, E>(mut op: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.base_delay * attempt;
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(attempts, error = %e, "operation failed after final attempt");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_non_empty() {
        assert!(require_non_empty("abc", "name").is_ok());
        assert!(require_non_empty("   ", "name").is_err());
        assert!(require_non_empty("", "name").is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(require_positive_amount(1, "amount").is_ok());
        assert!(require_positive_amount(0, "amount").is_err());
        assert!(require_positive_amount(-500, "amount").is_err());
    }

    #[test]
    fn test_uuid_shape() {
        let id = Uuid::new_v4();
        assert_eq!(require_uuid(&id.to_string(), "order_id").unwrap(), id);

        let err = require_uuid("not-a-uuid", "order_id").unwrap_err();
        match err {
            MarketError::Validation { field, .. } => assert_eq!(field, "order_id"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(require_email("fan@example.com").is_ok());
        assert!(require_email("no-at-sign").is_err());
        assert!(require_email("@example.com").is_err());
        assert!(require_email("fan@").is_err());
        assert!(require_email("fan@nodot").is_err());
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };

        let result: Result<u32, String> = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err("cold start".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            &policy,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausts_and_reraises_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };

        let result: Result<(), String> = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {n}")) }
            },
            &policy,
        )
        .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
