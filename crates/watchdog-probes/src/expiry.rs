//! Whole-day expiry arithmetic shared by the certificate and scheme
//! manager probes.

/// Targets expiring within this many days are reported.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

const SECS_PER_DAY: i64 = 86_400;

/// Outcome of comparing an expiry instant with the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expired this many whole days ago.
    Expired { days: i64 },
    /// Expires in this many whole days (fewer than the warning window).
    ExpiresSoon { days: i64 },
}

/// Classify `not_after` (unix seconds) against `now` (unix seconds).
///
/// Days are whole days truncated toward zero, so something that expired
/// a few hours ago still counts as expiring "in 0 days".
pub fn classify_expiry(not_after: i64, now: i64) -> Option<Expiry> {
    let days_expired = (now - not_after) / SECS_PER_DAY;
    if days_expired > 0 {
        Some(Expiry::Expired { days: days_expired })
    } else if days_expired > -EXPIRY_WARNING_DAYS {
        Some(Expiry::ExpiresSoon {
            days: -days_expired,
        })
    } else {
        None
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn days(n: i64) -> i64 {
        n * SECS_PER_DAY
    }

    #[test]
    fn ten_days_ahead_expires_soon() {
        assert_eq!(
            classify_expiry(NOW + days(10), NOW),
            Some(Expiry::ExpiresSoon { days: 10 })
        );
    }

    #[test]
    fn ten_days_ago_expired() {
        assert_eq!(
            classify_expiry(NOW - days(10), NOW),
            Some(Expiry::Expired { days: 10 })
        );
    }

    #[test]
    fn forty_five_days_ahead_is_fine() {
        assert_eq!(classify_expiry(NOW + days(45), NOW), None);
    }

    #[test]
    fn window_edge() {
        assert_eq!(classify_expiry(NOW + days(30), NOW), None);
        assert_eq!(
            classify_expiry(NOW + days(30) - 1, NOW),
            Some(Expiry::ExpiresSoon { days: 29 })
        );
    }

    #[test]
    fn partial_days_truncate() {
        assert_eq!(
            classify_expiry(NOW - 3600, NOW),
            Some(Expiry::ExpiresSoon { days: 0 })
        );
    }
}
