use chrono::{DateTime, TimeDelta, Utc};

/// Solar surplus hysteresis.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SolarDebounceState {
    /// When the sufficient surplus was first observed in the current streak.
    pub surplus_since: Option<DateTime<Utc>>,

    /// Solar charging has been committed and continues without waiting.
    pub is_active: bool,
}

impl SolarDebounceState {
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Register a sufficient surplus at `now`.
    ///
    /// The streak start never moves forward while the surplus stays sufficient,
    /// and the state becomes active once the streak has lasted for `delay`.
    pub fn observe_surplus(self, now: DateTime<Utc>, delay: TimeDelta) -> Self {
        if self.is_active {
            return self;
        }
        let since = self.surplus_since.unwrap_or(now);
        Self { surplus_since: Some(since), is_active: now - since >= delay }
    }

    /// Time left until the surplus is considered stable.
    pub fn remaining(&self, now: DateTime<Utc>, delay: TimeDelta) -> TimeDelta {
        self.surplus_since.map_or(delay, |since| (delay - (now - since)).max(TimeDelta::zero()))
    }
}
