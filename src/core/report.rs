use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    api::home_assistant::NewState,
    config::PublishConfig,
    core::{engine::Decision, mode::ControlMode, session::SessionState},
    quantity::{cost::Cost, energy::KilowattHours},
};

/// Externally visible outcome of a tick.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub mode: ControlMode,
    pub reason: String,
    pub session_started_at: Option<DateTime<Utc>>,
    pub session_energy: KilowattHours,
    pub session_cost: Cost,
}

impl Report {
    pub fn new(decision: &Decision, session: &SessionState) -> Self {
        Self {
            mode: decision.mode,
            reason: decision.reason.clone(),
            session_started_at: session.started_at,
            session_energy: session.energy,
            session_cost: session.cost.round_to_mills(),
        }
    }

    /// Sensor states to publish to Home Assistant.
    pub fn to_states(&self, publish: &PublishConfig) -> [(String, NewState); 3] {
        [
            (
                publish.entity_id("control_mode"),
                NewState {
                    state: self.mode.as_state().to_owned(),
                    attributes: json!({
                        "friendly_name": "EV charging control mode",
                        "icon": "mdi:ev-station",
                        "reason": self.reason,
                        "session_started_at": self.session_started_at.map(|at| at.to_rfc3339()),
                    }),
                },
            ),
            (
                publish.entity_id("session_energy"),
                NewState {
                    state: format!("{:.3}", self.session_energy.0),
                    attributes: json!({
                        "friendly_name": "EV charging session energy",
                        "unit_of_measurement": "kWh",
                        "device_class": "energy",
                        "state_class": "total",
                    }),
                },
            ),
            (
                publish.entity_id("session_cost"),
                NewState {
                    state: format!("{:.2}", self.session_cost.0),
                    attributes: json!({
                        "friendly_name": "EV charging session cost",
                        "state_class": "total",
                    }),
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::current::Amperes;

    #[test]
    fn published_states() {
        let started_at = DateTime::<Utc>::UNIX_EPOCH;
        let decision = Decision {
            mode: ControlMode::PriceTime,
            should_charge: true,
            target_current: Amperes(16.0),
            reason: "cheap".to_owned(),
        };
        let session = SessionState {
            started_at: Some(started_at),
            mode: ControlMode::PriceTime,
            energy: KilowattHours(1.5),
            cost: Cost(0.4567),
        };
        let [mode, energy, cost] = Report::new(&decision, &session).to_states(&PublishConfig::default());

        assert_eq!(mode.0, "sensor.smart_ev_charging_control_mode");
        assert_eq!(mode.1.state, "price_time");
        assert_eq!(mode.1.attributes["reason"], "cheap");
        assert_eq!(mode.1.attributes["session_started_at"], "1970-01-01T00:00:00+00:00");
        assert_eq!(energy.1.state, "1.500");
        assert_eq!(cost.1.state, "0.46");
    }

    #[test]
    fn idle_report_has_no_session() {
        let [mode, ..] = Report::default().to_states(&PublishConfig::default());
        assert_eq!(mode.1.state, "off");
        assert!(mode.1.attributes["session_started_at"].is_null());
    }
}
