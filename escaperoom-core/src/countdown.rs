//! Client-owned countdowns anchored to a wall-clock deadline.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline_ms: i64,
}

impl Countdown {
    /// Deadline `seconds` from now. Out-of-range values saturate instead of
    /// wrapping, since they come straight from pushed payloads.
    #[must_use]
    pub const fn from_duration(now_ms: i64, seconds: i64) -> Self {
        Self {
            deadline_ms: now_ms.saturating_add(seconds.saturating_mul(1000)),
        }
    }

    /// Start from a server-stated epoch so delivery delay is not counted twice.
    #[must_use]
    pub fn from_server_epoch(now_ms: i64, start_ts_secs: i64, duration_secs: i64) -> Self {
        let elapsed = now_ms.div_euclid(1000).saturating_sub(start_ts_secs).max(0);
        Self::from_duration(now_ms, duration_secs.saturating_sub(elapsed))
    }

    #[must_use]
    pub const fn deadline_ms(&self) -> i64 {
        self.deadline_ms
    }

    /// Whole seconds left, rounded to the nearest second and never negative.
    #[must_use]
    pub fn remaining_secs(&self, now_ms: i64) -> i64 {
        let left = self.deadline_ms.saturating_sub(now_ms);
        if left <= 0 {
            return 0;
        }
        left.saturating_add(500).div_euclid(1000)
    }

    /// Seconds left rounded up, for "Ns" style waits that must not show 0 early.
    #[must_use]
    pub fn remaining_secs_ceil(&self, now_ms: i64) -> i64 {
        let left = self.deadline_ms.saturating_sub(now_ms);
        if left <= 0 {
            return 0;
        }
        left.saturating_add(999).div_euclid(1000)
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_secs(now_ms) <= 0
    }
}

/// `MM:SS`, clamped at zero.
#[must_use]
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// `N segundo` / `N segundos`.
#[must_use]
pub fn format_seconds_es(seconds: i64) -> String {
    if seconds == 1 {
        format!("{seconds} segundo")
    } else {
        format!("{seconds} segundos")
    }
}
