use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset, Offset, Utc};

/// Timing and thresholds for the background sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often the late reservation sweep runs.
    pub auto_cancel_interval: StdDuration,
    /// How long after its start a confirmed reservation may stay unseated.
    pub grace: Duration,
    /// Cancelled or no-show reservations in a month that get a customer banned.
    pub ban_threshold: u64,
    /// Zone that decides where a calendar month and midnight fall.
    pub timezone: FixedOffset,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            auto_cancel_interval: StdDuration::from_secs(5 * 60),
            grace: Duration::minutes(30),
            ban_threshold: 5,
            timezone: restaurant_zone(),
        }
    }
}

/// GMT+7, the zone the restaurant and its payment gateway run in.
fn restaurant_zone() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap_or(Utc.fix())
}

impl SweepConfig {
    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.auto_cancel_interval = interval;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_ban_threshold(mut self, threshold: u64) -> Self {
        self.ban_threshold = threshold;
        self
    }
}
