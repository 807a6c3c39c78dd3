//! Translation of a decision into charger commands.
//!
//! Planning is pure. Execution issues the planned commands in order and never fails:
//! each command outcome is collected for the caller to log.

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    core::{engine::Decision, mode::ControlMode, snapshot::Snapshot, status::ChargerStatus},
    prelude::*,
    quantity::current::Amperes,
};

/// Charger-control service.
#[async_trait]
pub trait ChargerControl: Sync {
    async fn start(&self) -> Result;

    async fn pause(&self) -> Result;

    async fn set_dynamic_current_limit(&self, current: Amperes) -> Result;

    /// Read the status back from the charger.
    async fn status(&self) -> Result<ChargerStatus>;

    async fn turn_on_main_switch(&self) -> Result;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SetDynamicCurrentLimit(Amperes),
    Start,
    Pause,
    TurnOnMainSwitch,
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetDynamicCurrentLimit(current) => write!(f, "set dynamic limit to {current}"),
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::TurnOnMainSwitch => write!(f, "turn on the main switch"),
        }
    }
}

/// What happens to the session after the commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionEffect {
    Keep,

    /// Mark the session start unless a session is already running.
    Start,

    Clear,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub commands: Vec<Command>,
    pub session: SessionEffect,
}

impl Plan {
    const fn idle(session: SessionEffect) -> Self {
        Self { commands: Vec::new(), session }
    }

    /// Plan the commands for the decision.
    ///
    /// `current_limit` is the active dynamic limit as known to the caller: either read back
    /// from the charger or the last successfully commanded one.
    pub fn new(
        decision: &Decision,
        status: ChargerStatus,
        current_limit: Option<Amperes>,
        previous_mode: ControlMode,
        is_smart_feature_enabled: bool,
    ) -> Self {
        if decision.should_charge {
            Self::charging(decision.target_current, status, current_limit)
        } else {
            Self::not_charging(status, previous_mode, is_smart_feature_enabled)
        }
    }

    fn charging(target: Amperes, status: ChargerStatus, current_limit: Option<Amperes>) -> Self {
        let update_current = (current_limit.map(Amperes::round_to_tenths)
            != Some(target.round_to_tenths()))
        .then_some(Command::SetDynamicCurrentLimit(target));

        if ChargerStatus::STARTABLE.contains(status) {
            let commands = update_current.into_iter().chain([Command::Start]).collect();
            return Self { commands, session: SessionEffect::Start };
        }
        match status {
            ChargerStatus::Charging => {
                Self { commands: update_current.into_iter().collect(), session: SessionEffect::Start }
            }
            ChargerStatus::Disconnected | ChargerStatus::Offline => {
                info!(%status, "charger is not reachable, nothing to send");
                Self::idle(SessionEffect::Clear)
            }
            _ => {
                info!(%status, "waiting for suitable status");
                Self::idle(SessionEffect::Keep)
            }
        }
    }

    fn not_charging(
        status: ChargerStatus,
        previous_mode: ControlMode,
        is_smart_feature_enabled: bool,
    ) -> Self {
        let should_pause = match status {
            ChargerStatus::Charging => previous_mode.is_smart() || is_smart_feature_enabled,
            ChargerStatus::Paused => previous_mode.is_smart(),
            _ => false,
        };
        if should_pause {
            Self { commands: vec![Command::Pause], session: SessionEffect::Clear }
        } else if ChargerStatus::IDLE_CONNECTED.contains(status) {
            Self::idle(SessionEffect::Keep)
        } else {
            Self::idle(SessionEffect::Clear)
        }
    }
}

/// Outcome of the actuation in a tick.
#[must_use]
pub struct Execution {
    pub plan: Plan,

    /// Charger status after the main switch handling.
    pub status: ChargerStatus,

    pub outcomes: Vec<(Command, Result)>,
}

impl Execution {
    /// Log every command outcome.
    pub fn log(&self) {
        for (command, outcome) in &self.outcomes {
            match outcome {
                Ok(()) => info!(%command, "sent"),
                Err(error) => error!(%command, "failed: {error:#}"),
            }
        }
    }

    /// Current limit which has been accepted by the charger in this execution.
    pub fn commanded_current(&self) -> Option<Amperes> {
        self.outcomes.iter().rev().find_map(|(command, outcome)| match (command, outcome) {
            (Command::SetDynamicCurrentLimit(current), Ok(())) => Some(*current),
            _ => None,
        })
    }
}

#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Actuator {
    /// Wait after turning the main switch on before reading the status back.
    pub settle_delay: Duration,
}

impl Actuator {
    const MAX_MAIN_SWITCH_ATTEMPTS: usize = 2;

    #[instrument(skip_all, fields(mode = ?decision.mode, should_charge = decision.should_charge))]
    pub async fn actuate(
        &self,
        control: &dyn ChargerControl,
        decision: &Decision,
        snapshot: &Snapshot,
        previous_mode: ControlMode,
        last_commanded_current: Option<Amperes>,
    ) -> Execution {
        let mut outcomes = Vec::new();
        let mut status = snapshot.charger_status;

        if decision.should_charge && !snapshot.main_switch_on {
            status = self.turn_on_main_switch(control, status, &mut outcomes).await;
        }

        let controls = &snapshot.controls;
        let plan = Plan::new(
            decision,
            status,
            snapshot.dynamic_limit.or(last_commanded_current),
            previous_mode,
            controls.smart_enabled || controls.solar_enabled,
        );
        for command in &plan.commands {
            let outcome = match *command {
                Command::SetDynamicCurrentLimit(current) => {
                    control.set_dynamic_current_limit(current).await
                }
                Command::Start => control.start().await,
                Command::Pause => control.pause().await,
                Command::TurnOnMainSwitch => control.turn_on_main_switch().await,
            };
            outcomes.push((*command, outcome));
        }

        Execution { plan, status, outcomes }
    }

    /// Turn the main switch on and read the status back, retrying once.
    async fn turn_on_main_switch(
        &self,
        control: &dyn ChargerControl,
        mut status: ChargerStatus,
        outcomes: &mut Vec<(Command, Result)>,
    ) -> ChargerStatus {
        for attempt in 1..=Self::MAX_MAIN_SWITCH_ATTEMPTS {
            info!(attempt, "turning the main switch on…");
            outcomes.push((Command::TurnOnMainSwitch, control.turn_on_main_switch().await));
            sleep(self.settle_delay).await;
            match control.status().await {
                Ok(new_status) => {
                    status = new_status;
                    if status == ChargerStatus::Charging || ChargerStatus::STARTABLE.contains(status)
                    {
                        break;
                    }
                    warn!(attempt, %status, "charger is not ready after turning the main switch on");
                }
                Err(error) => {
                    warn!(attempt, "failed to read the status back: {error:#}");
                }
            }
        }
        status
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::snapshot::Controls;

    /// Records the commands and replies with the configured status.
    pub struct RecordingCharger {
        commands: Mutex<Vec<Command>>,
        pub status: ChargerStatus,
        pub fail_current_limit: bool,
    }

    impl RecordingCharger {
        pub fn new(status: ChargerStatus) -> Self {
            Self { commands: Mutex::new(Vec::new()), status, fail_current_limit: false }
        }

        pub fn commands(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }

        fn record(&self, command: Command) {
            self.commands.lock().unwrap().push(command);
        }
    }

    #[async_trait]
    impl ChargerControl for RecordingCharger {
        async fn start(&self) -> Result {
            self.record(Command::Start);
            Ok(())
        }

        async fn pause(&self) -> Result {
            self.record(Command::Pause);
            Ok(())
        }

        async fn set_dynamic_current_limit(&self, current: Amperes) -> Result {
            self.record(Command::SetDynamicCurrentLimit(current));
            if self.fail_current_limit {
                bail!("service call failed");
            }
            Ok(())
        }

        async fn status(&self) -> Result<ChargerStatus> {
            Ok(self.status)
        }

        async fn turn_on_main_switch(&self) -> Result {
            self.record(Command::TurnOnMainSwitch);
            Ok(())
        }
    }

    const ACTUATOR: Actuator = Actuator { settle_delay: Duration::ZERO };

    fn charge_at(current: f64) -> Decision {
        Decision {
            mode: ControlMode::PriceTime,
            should_charge: true,
            target_current: Amperes(current),
            reason: "cheap".to_owned(),
        }
    }

    fn idle() -> Decision {
        Decision {
            mode: ControlMode::Manual,
            should_charge: false,
            target_current: Amperes::ZERO,
            reason: "no smart condition met".to_owned(),
        }
    }

    #[test]
    fn plan_start_from_ready() {
        let plan = Plan::new(
            &charge_at(16.0),
            ChargerStatus::ReadyToCharge,
            Some(Amperes(10.0)),
            ControlMode::Manual,
            true,
        );
        assert_eq!(plan.commands, [Command::SetDynamicCurrentLimit(Amperes(16.0)), Command::Start]);
        assert_eq!(plan.session, SessionEffect::Start);
    }

    #[test]
    fn plan_is_idempotent_while_charging() {
        let plan = Plan::new(
            &charge_at(16.0),
            ChargerStatus::Charging,
            Some(Amperes(15.98)),
            ControlMode::PriceTime,
            true,
        );
        assert!(plan.commands.is_empty());
    }

    #[test]
    fn plan_updates_current_while_charging() {
        let plan = Plan::new(
            &charge_at(8.0),
            ChargerStatus::Charging,
            Some(Amperes(16.0)),
            ControlMode::SolarSurplus,
            true,
        );
        assert_eq!(plan.commands, [Command::SetDynamicCurrentLimit(Amperes(8.0))]);
    }

    #[test]
    fn plan_waits_for_suitable_status() {
        let plan = Plan::new(&charge_at(16.0), ChargerStatus::Error, None, ControlMode::Manual, true);
        assert_eq!(plan, Plan::idle(SessionEffect::Keep));

        let plan =
            Plan::new(&charge_at(16.0), ChargerStatus::Offline, None, ControlMode::Manual, true);
        assert_eq!(plan, Plan::idle(SessionEffect::Clear));
    }

    #[test]
    fn plan_pauses_smart_charging() {
        let plan =
            Plan::new(&idle(), ChargerStatus::Charging, None, ControlMode::SolarSurplus, false);
        assert_eq!(plan.commands, [Command::Pause]);
        assert_eq!(plan.session, SessionEffect::Clear);

        let plan = Plan::new(&idle(), ChargerStatus::Paused, None, ControlMode::PriceTime, false);
        assert_eq!(plan.commands, [Command::Pause]);
    }

    #[test]
    fn plan_leaves_manual_charging_alone() {
        let plan = Plan::new(&idle(), ChargerStatus::Charging, None, ControlMode::Manual, false);
        assert!(plan.commands.is_empty());
        assert_eq!(plan.session, SessionEffect::Clear);

        let plan = Plan::new(&idle(), ChargerStatus::Paused, None, ControlMode::Manual, true);
        assert_eq!(plan, Plan::idle(SessionEffect::Keep));
    }

    #[tokio::test]
    async fn actuate_twice_sends_once() {
        let charger = RecordingCharger::new(ChargerStatus::Charging);
        let snapshot = Snapshot::builder().charger_status(ChargerStatus::Charging).build();
        let decision = charge_at(10.0);

        let execution =
            ACTUATOR.actuate(&charger, &decision, &snapshot, ControlMode::PriceTime, None).await;
        assert_eq!(execution.commanded_current(), Some(Amperes(10.0)));

        let execution = ACTUATOR
            .actuate(
                &charger,
                &decision,
                &snapshot,
                ControlMode::PriceTime,
                execution.commanded_current(),
            )
            .await;
        assert!(execution.outcomes.is_empty());
        assert_eq!(charger.commands(), [Command::SetDynamicCurrentLimit(Amperes(10.0))]);
    }

    #[tokio::test]
    async fn actuate_read_back_wins_over_last_commanded() {
        let charger = RecordingCharger::new(ChargerStatus::Charging);
        let snapshot = Snapshot::builder()
            .charger_status(ChargerStatus::Charging)
            .dynamic_limit(Amperes(6.0))
            .build();
        let _ = ACTUATOR
            .actuate(&charger, &charge_at(10.0), &snapshot, ControlMode::PriceTime, Some(Amperes(10.0)))
            .await;
        assert_eq!(charger.commands(), [Command::SetDynamicCurrentLimit(Amperes(10.0))]);
    }

    #[tokio::test]
    async fn actuate_collects_failures() {
        let charger = RecordingCharger {
            fail_current_limit: true,
            ..RecordingCharger::new(ChargerStatus::ReadyToCharge)
        };
        let snapshot = Snapshot::builder().charger_status(ChargerStatus::ReadyToCharge).build();
        let execution =
            ACTUATOR.actuate(&charger, &charge_at(16.0), &snapshot, ControlMode::Manual, None).await;
        assert_eq!(execution.outcomes.len(), 2);
        assert!(execution.outcomes[0].1.is_err());
        assert!(execution.outcomes[1].1.is_ok());
        assert_eq!(execution.commanded_current(), None);
        assert_eq!(charger.commands(), [Command::SetDynamicCurrentLimit(Amperes(16.0)), Command::Start]);
    }

    #[tokio::test]
    async fn actuate_turns_main_switch_on() {
        let charger = RecordingCharger::new(ChargerStatus::ReadyToCharge);
        let snapshot = Snapshot::builder()
            .charger_status(ChargerStatus::Unknown)
            .main_switch_on(false)
            .controls(Controls::builder().smart_enabled(true).build())
            .build();
        let execution =
            ACTUATOR.actuate(&charger, &charge_at(16.0), &snapshot, ControlMode::Manual, None).await;
        assert_eq!(execution.status, ChargerStatus::ReadyToCharge);
        assert_eq!(
            charger.commands(),
            [
                Command::TurnOnMainSwitch,
                Command::SetDynamicCurrentLimit(Amperes(16.0)),
                Command::Start,
            ],
        );
    }

    #[tokio::test]
    async fn actuate_retries_main_switch_once() {
        let charger = RecordingCharger::new(ChargerStatus::Error);
        let snapshot = Snapshot::builder()
            .charger_status(ChargerStatus::Unknown)
            .main_switch_on(false)
            .build();
        let execution =
            ACTUATOR.actuate(&charger, &charge_at(16.0), &snapshot, ControlMode::Manual, None).await;
        assert_eq!(charger.commands(), [Command::TurnOnMainSwitch, Command::TurnOnMainSwitch]);
        assert_eq!(execution.plan, Plan::idle(SessionEffect::Keep));
    }
}
