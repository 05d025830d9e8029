//! Retry delay policy.

use std::time::Duration;

/// Delay before retry number `retry` (0 for the first retry):
/// `base · 2^retry`, capped at `max`.
pub fn calculate_backoff(base: Duration, max: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.min(31));
    base.saturating_mul(factor).min(max)
}
