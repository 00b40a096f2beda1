// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry with exponential backoff + jitter for server exchanges.
//
// Only transient errors (network failures, timeouts, overloaded server) are
// retried. Everything else surfaces on the first attempt.

use std::time::Duration;

use metasync_core::config::RetrySettings;
use metasync_core::error::{ErrorClass, MetaError};
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(s: RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// No retries at all, used by tests and the dry-run path.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// Do not retry: the error is permanent or needs the operator.
    GiveUp(ErrorClass),
    Exhausted,
}

/// Map a non-success HTTP status to an error. A 404 stays an HTTP error
/// here; only a record fetch reads it as "not found".
pub fn status_error(status: u16, detail: String) -> MetaError {
    match status {
        408 | 429 | 500..=599 => MetaError::Transient(format!("HTTP {status}: {detail}")),
        _ => MetaError::Http { status, detail },
    }
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &MetaError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match err.class() {
        ErrorClass::Transient if attempt >= config.max_retries => {
            warn!(attempt, max = config.max_retries, "retry limit exhausted");
            RetryDecision::Exhausted
        }
        ErrorClass::Transient => {
            let delay = compute_delay(attempt, config);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
            RetryDecision::RetryAfter(delay)
        }
        class => RetryDecision::GiveUp(class),
    }
}

/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    Duration::from_millis(total_ms.min(config.max_delay.as_millis() as u64))
}

fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(404, String::new()),
            MetaError::Http { status: 404, .. }
        ));
        assert!(matches!(status_error(502, String::new()), MetaError::Transient(_)));
        assert!(matches!(status_error(429, String::new()), MetaError::Transient(_)));
        assert!(matches!(
            status_error(400, "bad".into()),
            MetaError::Http { status: 400, .. }
        ));
    }

    #[test]
    fn retry_respects_max() {
        let config = RetryConfig {
            max_retries: 3,
            ..Default::default()
        };
        let err = MetaError::Transient("connection reset".into());
        assert!(matches!(should_retry(&err, 0, &config), RetryDecision::RetryAfter(_)));
        assert!(matches!(should_retry(&err, 3, &config), RetryDecision::Exhausted));
    }

    #[test]
    fn malformed_never_retries() {
        let err = MetaError::Malformed("not json".into());
        assert!(matches!(
            should_retry(&err, 0, &RetryConfig::default()),
            RetryDecision::GiveUp(ErrorClass::Permanent)
        ));
    }

    #[test]
    fn delay_increases_and_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };
        let d0 = compute_delay(0, &config);
        let d1 = compute_delay(1, &config);
        let d2 = compute_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert!(compute_delay(20, &config) <= Duration::from_secs(2));
    }
}
