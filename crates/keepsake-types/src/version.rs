use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optimistic version marker of a persistent object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Version {
    /// Monotonic counter incremented on every update.
    Counter(i64),
    /// Timestamp of the last update.
    Timestamp(DateTime<Utc>),
}

impl Version {
    /// The version that follows this one for an update at `now`.
    pub fn next(&self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Counter(n) => Self::Counter(n.saturating_add(1)),
            Self::Timestamp(_) => Self::Timestamp(now),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(n) => write!(f, "v{n}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn counter_increments() {
        let now = Utc::now();
        assert_eq!(Version::Counter(4).next(now), Version::Counter(5));
        assert_eq!(Version::Counter(i64::MAX).next(now), Version::Counter(i64::MAX));
    }

    #[test]
    fn timestamp_moves_to_now() {
        let then = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(Version::Timestamp(then).next(now), Version::Timestamp(now));
    }

    #[test]
    fn display() {
        assert_eq!(Version::Counter(3).to_string(), "v3");
    }
}
