//! Bounded retry-with-backoff for storage calls.

use crate::store::StoreResult;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy applied to every ledger storage call.
///
/// Only transient failures ([`crate::store::StoreError::is_transient`]) are
/// retried. Backoff doubles after each failed attempt and is capped at
/// `max_backoff_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `0` behaves like `1`.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Runs `op`, retrying transient failures.
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> StoreResult<T>,
    ) -> StoreResult<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff_ms = self.initial_backoff_ms;
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "event=store_retry module=ledger status=recovered operation={operation} attempt={attempt}"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay_ms = backoff_ms.min(self.max_backoff_ms);
                    warn!(
                        "event=store_retry module=ledger status=retrying operation={operation} attempt={attempt} backoff_ms={delay_ms} error={err}"
                    );
                    std::thread::sleep(Duration::from_millis(delay_ms));
                    backoff_ms = backoff_ms.saturating_mul(2).min(self.max_backoff_ms);
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "event=store_retry module=ledger status=error operation={} attempt={} transient={} error={}",
                        operation,
                        attempt,
                        err.is_transient(),
                        err
                    );
                    return Err(err);
                }
            }
        }
    }
}
