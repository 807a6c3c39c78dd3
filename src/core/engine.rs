//! Charging decision engine.
//!
//! Pure function of the snapshot and the previous control state. The rules are evaluated
//! in strict priority order and the first match wins:
//!
//! 1. Disconnected or offline charger.
//! 2. Main switch off.
//! 3. State-of-charge target reached.
//! 4. Price/time.
//! 5. Solar surplus.
//! 6. Nothing qualifies.

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    core::{
        debounce::SolarDebounceState,
        mode::ControlMode,
        session::SessionState,
        snapshot::Snapshot,
    },
    quantity::{current::Amperes, rate::KilowattHourRate},
};

pub const PHASES: u8 = 3;
pub const VOLTAGE_PHASE_NEUTRAL: f64 = 230.0;

/// Lowest current the charger accepts.
pub const MIN_CHARGE_CURRENT: Amperes = Amperes(6.0);

#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub mode: ControlMode,
    pub should_charge: bool,

    /// Target current, zero when not charging.
    pub target_current: Amperes,

    pub reason: String,
}

impl Decision {
    fn idle(reason: impl Into<String>) -> Self {
        Self {
            mode: ControlMode::Manual,
            should_charge: false,
            target_current: Amperes::ZERO,
            reason: reason.into(),
        }
    }

    fn charge(mode: ControlMode, target_current: Amperes, reason: String) -> Self {
        Self { mode, should_charge: true, target_current, reason }
    }
}

/// Control state threaded from one tick to the next.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ControlState {
    pub session: SessionState,
    pub debounce: SolarDebounceState,
}

impl ControlState {
    pub fn cleared() -> Self {
        Self::default()
    }
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Engine {
    /// How long a sufficient surplus must last before the solar mode is committed.
    pub solar_surplus_delay: TimeDelta,
}

impl Engine {
    pub fn decide(
        &self,
        snapshot: &Snapshot,
        state: ControlState,
        now: DateTime<Utc>,
    ) -> (Decision, ControlState) {
        if snapshot.charger_status.is_unreachable() {
            let reason = format!("charger is {}", snapshot.charger_status);
            return (Decision::idle(reason), ControlState::cleared());
        }

        if !snapshot.main_switch_on {
            return (Decision::idle("charger main switch is off"), ControlState::cleared());
        }

        if let (Some(soc), Some(target_soc)) = (snapshot.ev_soc, snapshot.target_soc)
            && soc >= target_soc
        {
            let reason = format!("state of charge {soc} reached the target {target_soc}");
            return (Decision::idle(reason), ControlState::cleared());
        }

        let price_verdict = Self::check_price(snapshot);
        if let PriceVerdict::Allowed(reason) = price_verdict {
            let session = state.session.continue_or_start(ControlMode::PriceTime, now);
            let decision = Decision::charge(
                ControlMode::PriceTime,
                Self::clamp(snapshot.max_current, snapshot.max_current),
                reason,
            );
            return (decision, ControlState { session, debounce: SolarDebounceState::cleared() });
        }

        if snapshot.controls.solar_enabled && snapshot.solar_schedule_active {
            return self.decide_solar(snapshot, state, now);
        }

        let reason = match price_verdict {
            PriceVerdict::Blocked(reason) => format!("no smart condition met: {reason}"),
            PriceVerdict::Disabled | PriceVerdict::Allowed(_) => {
                "no smart condition met".to_owned()
            }
        };
        (Decision::idle(reason), ControlState::cleared())
    }

    fn check_price(snapshot: &Snapshot) -> PriceVerdict {
        if !snapshot.controls.smart_enabled {
            return PriceVerdict::Disabled;
        }
        if !snapshot.time_schedule_active {
            return PriceVerdict::Blocked("outside of the time schedule".to_owned());
        }
        let Some(price) = snapshot.price else {
            return PriceVerdict::Blocked("price is not available".to_owned());
        };
        let total: KilowattHourRate = price + snapshot.surcharge;
        let max_price = snapshot.controls.max_price;
        if total <= max_price {
            PriceVerdict::Allowed(format!(
                "price {total} ({price} + {}) is at or below the maximum {max_price}",
                snapshot.surcharge,
            ))
        } else {
            PriceVerdict::Blocked(format!(
                "price {total} ({price} + {}) is above the maximum {max_price}",
                snapshot.surcharge,
            ))
        }
    }

    fn decide_solar(
        &self,
        snapshot: &Snapshot,
        state: ControlState,
        now: DateTime<Utc>,
    ) -> (Decision, ControlState) {
        let surplus = snapshot.solar_surplus();
        let candidate = Amperes::from_three_phase_power(surplus, PHASES, VOLTAGE_PHASE_NEUTRAL);
        let min_solar_current = snapshot.controls.min_solar_current;

        if candidate < min_solar_current {
            let reason = format!(
                "solar surplus {surplus} sustains {candidate}, below the minimum {min_solar_current}"
            );
            return (Decision::idle(reason), ControlState::cleared());
        }

        let debounce = state.debounce.observe_surplus(now, self.solar_surplus_delay);
        if !debounce.is_active {
            let remaining = debounce.remaining(now, self.solar_surplus_delay);
            let reason = format!(
                "waiting for surplus to stabilize: {surplus} for another {}s",
                remaining.num_seconds(),
            );
            let state = ControlState { session: SessionState::cleared(), debounce };
            return (Decision::idle(reason), state);
        }

        let session = state.session.continue_or_start(ControlMode::SolarSurplus, now);
        let target_current = Self::clamp(candidate, snapshot.max_current);
        let reason = format!("solar surplus {surplus} sustains {candidate}");
        (
            Decision::charge(ControlMode::SolarSurplus, target_current, reason),
            ControlState { session, debounce },
        )
    }

    /// Clamp the target into the range the charger accepts.
    fn clamp(current: Amperes, max_current: Amperes) -> Amperes {
        current.max(MIN_CHARGE_CURRENT).min(max_current)
    }
}

enum PriceVerdict {
    /// Smart charging is off, the price is irrelevant.
    Disabled,

    Allowed(String),
    Blocked(String),
}
