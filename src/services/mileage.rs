// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Watch time to mileage conversion.

use std::time::Duration;

/// One mile per ten minutes watched.
pub const DEFAULT_MINUTES_PER_MILE: f64 = 10.0;

/// Subscribers earn 5% on top of their session miles.
pub const DEFAULT_SUBSCRIBER_MULTIPLIER: f64 = 1.05;

/// Converts elapsed watch time into miles.
///
/// Pure: the caller supplies the elapsed time, nothing here reads a clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MileageCalculator {
    minutes_per_mile: f64,
    subscriber_multiplier: f64,
}

impl Default for MileageCalculator {
    fn default() -> Self {
        Self {
            minutes_per_mile: DEFAULT_MINUTES_PER_MILE,
            subscriber_multiplier: DEFAULT_SUBSCRIBER_MULTIPLIER,
        }
    }
}

impl MileageCalculator {
    /// Both values are validated by the config loader.
    pub fn new(minutes_per_mile: f64, subscriber_multiplier: f64) -> Self {
        Self {
            minutes_per_mile,
            subscriber_multiplier,
        }
    }

    pub fn minutes_per_mile(&self) -> f64 {
        self.minutes_per_mile
    }

    pub fn subscriber_multiplier(&self) -> f64 {
        self.subscriber_multiplier
    }

    /// Miles for a stretch of watch time.
    pub fn duration_to_miles(&self, elapsed: Duration) -> f64 {
        let minutes = elapsed.as_secs_f64() / 60.0;
        minutes / self.minutes_per_mile
    }

    /// Miles for a session, with the subscriber bonus applied if it is due.
    pub fn session_miles(&self, elapsed: Duration, is_subscriber: bool) -> f64 {
        let base = self.duration_to_miles(elapsed);
        if is_subscriber {
            apply_bonus_multiplier(base, self.subscriber_multiplier)
        } else {
            base
        }
    }
}

/// Scale `base` by `multiplier`.
pub fn apply_bonus_multiplier(base: f64, multiplier: f64) -> f64 {
    base * multiplier
}
