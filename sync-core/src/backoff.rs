//! Retry backoff with jitter.

use std::time::Duration;

/// Delay before retry number `retry` (1-based).
///
/// Formula: min(max, base * 2^(retry-1)) + random(0..=max_jitter)
///
/// Jitter keeps many clients from retrying in lockstep after a shared
/// outage. If the OS random source is unavailable the jitter is zero.
pub fn retry_delay(retry: u32, base: Duration, max: Duration, max_jitter: Duration) -> Duration {
    let exponent = retry.saturating_sub(1).min(16);
    let backoff = base.saturating_mul(1u32 << exponent).min(max);
    backoff + random_jitter(max_jitter)
}

fn random_jitter(max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }

    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}
