//! Time helpers shared by schedule computations.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for schedule fire times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Time left from `from` until `to`, zero if `to` is already past.
#[must_use]
pub fn until(from: Timestamp, to: Timestamp) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_compute_remaining_time_until_future_instant() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        assert_eq!(until(from, to), Duration::from_secs(45 * 60));
    }

    #[test]
    fn should_saturate_to_zero_when_instant_is_past() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 1).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        assert_eq!(until(from, to), Duration::ZERO);
    }
}
