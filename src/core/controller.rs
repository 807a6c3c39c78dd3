//! Tick-to-tick orchestration: snapshot, decision, actuation, and the session bookkeeping.

use chrono::{DateTime, TimeDelta, Utc};
use enumset::EnumSet;

use crate::{
    api::home_assistant::EntityStates,
    config::Configuration,
    core::{
        actuator::{Actuator, ChargerControl, SessionEffect},
        engine::{ControlState, Decision, Engine},
        mode::ControlMode,
        reader::{Availability, EntityInputs, unresolved_controls},
        report::Report,
        session::SessionState,
        snapshot::{Controls, Snapshot},
        status::ChargerStatus,
    },
    prelude::*,
    quantity::current::Amperes,
};

/// Owns the control state between ticks.
#[must_use]
#[derive(Default)]
pub struct Controller {
    state: ControlState,
    previous_mode: ControlMode,

    /// Last dynamic limit accepted by the charger, used when there is no read-back.
    last_commanded_current: Option<Amperes>,

    last_tick_at: Option<DateTime<Utc>>,
    availability: Availability,

    /// Controls as of the latest snapshot.
    controls: Controls,
    report: Report,
}

impl Controller {
    pub const fn report(&self) -> &Report {
        &self.report
    }

    #[cfg(test)]
    pub const fn session(&self) -> &SessionState {
        &self.state.session
    }

    pub const fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Run a full tick over the freshly fetched states.
    ///
    /// Returns the previous report unchanged when the configured controls cannot be resolved.
    #[instrument(skip_all)]
    pub async fn tick(
        &mut self,
        configuration: &Configuration,
        states: &EntityStates,
        control: &dyn ChargerControl,
        actuator: &Actuator,
        now: DateTime<Utc>,
    ) -> &Report {
        let unresolved = unresolved_controls(&configuration.controls.entities, states);
        if !unresolved.is_empty() {
            error!(?unresolved, "control entities are missing, skipping the tick");
            return &self.report;
        }

        let snapshot = self.read(configuration, states);
        let decision = self.decide(configuration, &snapshot, now);

        let execution = actuator
            .actuate(control, &decision, &snapshot, self.previous_mode, self.last_commanded_current)
            .await;
        execution.log();
        debug!(status = %execution.status, session = ?execution.plan.session, "actuated");
        self.last_commanded_current = if decision.should_charge {
            execution.commanded_current().or(self.last_commanded_current)
        } else {
            None
        };
        self.apply_session_effect(execution.plan.session, decision.mode, now);
        self.conclude(&decision)
    }

    /// Read the snapshot through the Home Assistant inputs.
    pub fn read(&mut self, configuration: &Configuration, states: &EntityStates) -> Snapshot {
        let mut inputs = EntityInputs::new(
            states,
            &configuration.entities,
            &configuration.controls.entities,
            configuration.target_soc,
            &mut self.availability,
        );
        let snapshot = Snapshot::read(&mut inputs, &configuration.controls.defaults);
        self.controls = snapshot.controls;
        snapshot
    }

    /// Make the decision and advance the control state, without actuating.
    pub fn decide(
        &mut self,
        configuration: &Configuration,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Decision {
        self.reset_on_interruption(snapshot.charger_status, configuration.unexpected_statuses());
        self.accumulate_session(snapshot, now);

        let engine = Engine {
            solar_surplus_delay: TimeDelta::from_std(configuration.solar_surplus_delay)
                .unwrap_or(TimeDelta::MAX),
        };
        let (decision, state) = engine.decide(snapshot, self.state, now);
        info!(
            mode = %decision.mode,
            should_charge = decision.should_charge,
            target_current = ?decision.target_current,
            reason = %decision.reason,
            "decided",
        );
        self.state = state;
        self.last_tick_at = Some(now);
        decision
    }

    /// Somebody else took over the charger while a smart mode was in charge.
    fn reset_on_interruption(&mut self, status: ChargerStatus, unexpected: EnumSet<ChargerStatus>) {
        if self.previous_mode.is_smart()
            && self.state.session.is_active()
            && unexpected.contains(status)
        {
            warn!(
                %status,
                previous_mode = %self.previous_mode,
                "unexpected charger status during a smart session, resetting the control state",
            );
            self.state = ControlState::cleared();
            self.previous_mode = ControlMode::Manual;
        }
    }

    /// Add the energy charged since the previous tick to the session.
    fn accumulate_session(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        let session = &mut self.state.session;
        if !session.is_active() || snapshot.charger_status != ChargerStatus::Charging {
            return;
        }
        let (Some(ev_power), Some(last_tick_at)) = (snapshot.ev_power, self.last_tick_at) else {
            return;
        };
        let energy = ev_power * (now - last_tick_at);
        session.energy += energy;
        if session.mode == ControlMode::PriceTime
            && let Some(price) = snapshot.total_price()
        {
            session.cost += energy * price;
        }
        debug!(?energy, total = ?session.energy, cost = ?session.cost, "session updated");
    }

    fn apply_session_effect(&mut self, effect: SessionEffect, mode: ControlMode, now: DateTime<Utc>) {
        let session = &mut self.state.session;
        match effect {
            SessionEffect::Keep => {}
            SessionEffect::Start => {
                if !session.is_active() && mode.is_smart() {
                    *session = SessionState::cleared().continue_or_start(mode, now);
                }
            }
            SessionEffect::Clear => {
                if session.is_active() {
                    info!(mode = %session.mode, energy = ?session.energy, "session ended");
                }
                *session = SessionState::cleared();
            }
        }
    }

    fn conclude(&mut self, decision: &Decision) -> &Report {
        self.previous_mode = decision.mode;
        self.report = Report::new(decision, &self.state.session);
        &self.report
    }
}
