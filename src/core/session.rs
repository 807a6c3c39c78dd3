use chrono::{DateTime, Utc};

use crate::{
    core::mode::ControlMode,
    quantity::{cost::Cost, energy::KilowattHours},
};

/// Period during which a smart mode is commanding the charger.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub started_at: Option<DateTime<Utc>>,

    /// Mode which started the session.
    pub mode: ControlMode,

    /// Best-effort energy estimate since the session start.
    pub energy: KilowattHours,

    /// Best-effort cost estimate, only accumulated under the price/time mode.
    pub cost: Cost,
}

impl SessionState {
    pub fn cleared() -> Self {
        Self::default()
    }

    pub const fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Keep the running session if it belongs to the same mode, otherwise start a fresh one.
    pub fn continue_or_start(self, mode: ControlMode, now: DateTime<Utc>) -> Self {
        if self.is_active() && self.mode == mode {
            self
        } else {
            Self { started_at: Some(now), mode, ..Self::default() }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn continue_same_mode() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let session = SessionState::cleared().continue_or_start(ControlMode::PriceTime, start);
        assert_eq!(session.started_at, Some(start));

        let session = SessionState { energy: KilowattHours(1.0), ..session }
            .continue_or_start(ControlMode::PriceTime, start + TimeDelta::hours(1));
        assert_eq!(session.started_at, Some(start));
        assert_eq!(session.energy, KilowattHours(1.0));
    }

    #[test]
    fn restart_on_mode_change() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let later = start + TimeDelta::hours(1);
        let session = SessionState::cleared()
            .continue_or_start(ControlMode::PriceTime, start)
            .continue_or_start(ControlMode::SolarSurplus, later);
        assert_eq!(session.started_at, Some(later));
        assert_eq!(session.mode, ControlMode::SolarSurplus);
    }
}
