//! Reconnection backoff schedule.

use std::time::Duration;

/// Delay before reconnection attempt number `attempt` (zero-based).
///
/// Doubles on every consecutive failure: 1s, 2s, 4s, 8s, 16s. The
/// attempt counter resets whenever a connection opens successfully, so
/// a flaky link that keeps recovering pays the short delays, not the
/// long ones.
pub fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(63))
}
