use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A span of absolute time shared by availability slots and sweep windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> Self {
        Self { start, end: start + length }
    }

    /// True when the window covers no instant at all.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn width(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }

    /// Half-open membership, `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Closed membership, `[start, end]`.
    pub fn contains_inclusive(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Half-open overlap test.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

/// A closed window expressed as minute offsets around a reference instant.
///
/// `SweepWindow { from_minutes: 55, to_minutes: 65 }` resolved at `now`
/// covers `[now + 55min, now + 65min]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepWindow {
    pub from_minutes: i64,
    pub to_minutes: i64,
}

impl SweepWindow {
    pub const fn minutes(from_minutes: i64, to_minutes: i64) -> Self {
        Self { from_minutes, to_minutes }
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(
            now + Duration::minutes(self.from_minutes),
            now + Duration::minutes(self.to_minutes),
        )
    }

    pub fn width(&self) -> Duration {
        Duration::minutes(self.to_minutes - self.from_minutes)
    }

    pub fn is_inverted(&self) -> bool {
        self.to_minutes < self.from_minutes
    }
}
