//! Retry backoff for failed deliveries.

use chrono::Duration;

/// Fixed backoff schedule in minutes, clamped at the last tier.
const RETRY_SCHEDULE_MINUTES: [i64; 3] = [1, 5, 15];

/// Delay before the next attempt, given how many attempts have completed.
///
/// First failure waits 1 minute, second 5, everything after 15.
pub fn retry_delay(completed_attempts: i32) -> Duration {
    let idx = (completed_attempts.max(1) as usize - 1).min(RETRY_SCHEDULE_MINUTES.len() - 1);
    Duration::minutes(RETRY_SCHEDULE_MINUTES[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_tiers() {
        assert_eq!(retry_delay(1), Duration::minutes(1));
        assert_eq!(retry_delay(2), Duration::minutes(5));
        assert_eq!(retry_delay(3), Duration::minutes(15));
    }

    #[test]
    fn test_clamped_at_last_tier() {
        assert_eq!(retry_delay(4), Duration::minutes(15));
        assert_eq!(retry_delay(50), Duration::minutes(15));
    }

    #[test]
    fn test_degenerate_input_uses_first_tier() {
        assert_eq!(retry_delay(0), Duration::minutes(1));
    }
}
