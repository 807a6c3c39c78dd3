//! Typed access to the external inputs.

use std::collections::HashSet;

use crate::{
    api::home_assistant::{EntityState, EntityStates},
    config::{ControlEntities, Entities},
    core::status::ChargerStatus,
    prelude::*,
    quantity::{
        current::Amperes,
        percent::Percent,
        power::Watts,
        rate::KilowattHourRate,
        unit::{normalize_power, normalize_price, normalize_surcharge, parse_number},
    },
};

/// Read-only port over the external inputs.
///
/// Every method returns [`None`] when the input is not configured, not available, or not parsable.
/// Fallbacks are up to the caller.
pub trait Inputs {
    fn charger_status(&mut self) -> Option<ChargerStatus>;
    fn main_switch_on(&mut self) -> Option<bool>;
    fn price(&mut self) -> Option<KilowattHourRate>;
    fn surcharge(&mut self) -> Option<KilowattHourRate>;
    fn time_schedule_active(&mut self) -> Option<bool>;
    fn solar_schedule_active(&mut self) -> Option<bool>;
    fn house_power(&mut self) -> Option<Watts>;
    fn solar_power(&mut self) -> Option<Watts>;
    fn max_current(&mut self) -> Option<Amperes>;
    fn dynamic_limit(&mut self) -> Option<Amperes>;
    fn ev_soc(&mut self) -> Option<Percent>;
    fn target_soc(&mut self) -> Option<Percent>;
    fn ev_power(&mut self) -> Option<Watts>;

    fn smart_enabled(&mut self) -> Option<bool>;
    fn max_price(&mut self) -> Option<KilowattHourRate>;
    fn solar_enabled(&mut self) -> Option<bool>;
    fn solar_buffer(&mut self) -> Option<Watts>;
    fn min_solar_current(&mut self) -> Option<Amperes>;
}

/// Remembers which entities are unavailable, so that the transitions are logged only once.
#[must_use]
#[derive(Default)]
pub struct Availability {
    unavailable: HashSet<String>,
}

impl Availability {
    /// Pass the state through if it is available, logging the availability transitions.
    pub fn observe<'s>(
        &mut self,
        entity_id: &str,
        state: Option<&'s EntityState>,
    ) -> Option<&'s EntityState> {
        if let Some(state) = state.filter(|state| state.is_available()) {
            if self.unavailable.remove(entity_id) {
                info!(entity_id, state = %state.state, "available again");
            }
            Some(state)
        } else {
            if self.unavailable.insert(entity_id.to_owned()) {
                warn!(
                    entity_id,
                    state = state.map(|state| state.state.as_str()),
                    "unavailable, falling back",
                );
            }
            None
        }
    }

    #[cfg(test)]
    pub fn is_unavailable(&self, entity_id: &str) -> bool {
        self.unavailable.contains(entity_id)
    }
}

/// Home Assistant implementation of the [`Inputs`] port over the states fetched in a tick.
pub struct EntityInputs<'a> {
    states: &'a EntityStates,
    entities: &'a Entities,
    control_entities: &'a ControlEntities,
    target_soc: Option<Percent>,
    availability: &'a mut Availability,
}

impl<'a> EntityInputs<'a> {
    pub const fn new(
        states: &'a EntityStates,
        entities: &'a Entities,
        control_entities: &'a ControlEntities,
        target_soc: Option<Percent>,
        availability: &'a mut Availability,
    ) -> Self {
        Self { states, entities, control_entities, target_soc, availability }
    }

    fn lookup(&mut self, entity_id: Option<&str>) -> Option<&'a EntityState> {
        let entity_id = entity_id?;
        let states = self.states;
        self.availability.observe(entity_id, states.get(entity_id))
    }

    fn flag(&mut self, entity_id: Option<&str>) -> Option<bool> {
        self.lookup(entity_id).map(|state| state.state == "on")
    }

    /// A configured schedule is active only while it is `on`, unavailable included.
    fn schedule(&mut self, entity_id: Option<&str>) -> Option<bool> {
        let entity_id = entity_id?;
        Some(self.flag(Some(entity_id)).unwrap_or(false))
    }

    fn number(&mut self, entity_id: Option<&str>) -> Option<f64> {
        self.lookup(entity_id).and_then(|state| parse_number(&state.state))
    }

    fn power(&mut self, entity_id: Option<&str>) -> Option<Watts> {
        self.lookup(entity_id).and_then(|state| normalize_power(&state.state, state.unit()))
    }
}

impl Inputs for EntityInputs<'_> {
    fn charger_status(&mut self) -> Option<ChargerStatus> {
        let entities = self.entities;
        self.lookup(Some(entities.status.as_str()))
            .map(|state| ChargerStatus::from_state(&state.state))
    }

    fn main_switch_on(&mut self) -> Option<bool> {
        let entities = self.entities;
        self.flag(entities.main_switch.as_deref())
    }

    fn price(&mut self) -> Option<KilowattHourRate> {
        let entities = self.entities;
        self.lookup(Some(entities.price.as_str()))
            .and_then(|state| normalize_price(&state.state, state.unit()))
    }

    fn surcharge(&mut self) -> Option<KilowattHourRate> {
        let entities = self.entities;
        self.lookup(entities.surcharge.as_deref())
            .and_then(|state| normalize_surcharge(&state.state, state.unit()))
    }

    fn time_schedule_active(&mut self) -> Option<bool> {
        let entities = self.entities;
        self.schedule(entities.time_schedule.as_deref())
    }

    fn solar_schedule_active(&mut self) -> Option<bool> {
        let entities = self.entities;
        self.schedule(entities.solar_schedule.as_deref())
    }

    fn house_power(&mut self) -> Option<Watts> {
        let entities = self.entities;
        self.power(entities.house_power.as_deref())
    }

    fn solar_power(&mut self) -> Option<Watts> {
        let entities = self.entities;
        self.power(entities.solar_power.as_deref())
    }

    fn max_current(&mut self) -> Option<Amperes> {
        let entities = self.entities;
        self.number(entities.max_current.as_deref()).map(Amperes)
    }

    fn dynamic_limit(&mut self) -> Option<Amperes> {
        let entities = self.entities;
        self.number(entities.dynamic_current.as_deref()).map(Amperes)
    }

    fn ev_soc(&mut self) -> Option<Percent> {
        let entities = self.entities;
        self.number(entities.ev_soc.as_deref()).map(Percent)
    }

    fn target_soc(&mut self) -> Option<Percent> {
        self.target_soc
    }

    fn ev_power(&mut self) -> Option<Watts> {
        let entities = self.entities;
        self.power(entities.ev_power.as_deref())
    }

    fn smart_enabled(&mut self) -> Option<bool> {
        let control_entities = self.control_entities;
        self.flag(control_entities.smart_enabled.as_deref())
    }

    fn max_price(&mut self) -> Option<KilowattHourRate> {
        let control_entities = self.control_entities;
        self.number(control_entities.max_price.as_deref()).map(KilowattHourRate)
    }

    fn solar_enabled(&mut self) -> Option<bool> {
        let control_entities = self.control_entities;
        self.flag(control_entities.solar_enabled.as_deref())
    }

    fn solar_buffer(&mut self) -> Option<Watts> {
        let control_entities = self.control_entities;
        self.number(control_entities.solar_buffer.as_deref()).map(Watts)
    }

    fn min_solar_current(&mut self) -> Option<Amperes> {
        let control_entities = self.control_entities;
        self.number(control_entities.min_solar_current.as_deref()).map(Amperes)
    }
}

/// Configured control helpers which are missing from the fetched states altogether.
///
/// Unlike an unavailable sensor, a missing helper means the configuration does not match the host.
pub fn unresolved_controls<'c>(
    control_entities: &'c ControlEntities,
    states: &EntityStates,
) -> Vec<&'c str> {
    control_entities.ids().filter(|entity_id| !states.contains(entity_id)).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        config::Configuration,
        core::snapshot::{Controls, Snapshot},
    };

    // language=TOML
    const CONFIGURATION: &str = r#"
        charger_device_id = "0123456789abcdef"
        target_soc = 80

        [entities]
        status = "sensor.easee_status"
        main_switch = "switch.easee_is_enabled"
        price = "sensor.nordpool"
        surcharge = "input_number.surcharge"
        time_schedule = "schedule.cheap_hours"
        house_power = "sensor.house_power"
        solar_power = "sensor.pv_power"
        max_current = "sensor.easee_max_charger_limit"
        dynamic_current = "sensor.easee_dynamic_charger_limit"
        ev_soc = "sensor.car_battery"

        [controls.entities]
        smart_enabled = "input_boolean.ev_smart"
        max_price = "input_number.ev_max_price"
    "#;

    fn state(entity_id: &str, state: &str, unit: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "entity_id": entity_id,
            "state": state,
            "attributes": { "unit_of_measurement": unit },
            "last_changed": "2025-06-01T10:00:00+00:00",
            "last_updated": "2025-06-01T10:00:00+00:00",
        })
    }

    fn states(values: Vec<serde_json::Value>) -> Result<EntityStates> {
        Ok(serde_json::from_value(serde_json::Value::Array(values))?)
    }

    #[test]
    fn read_all_available() -> Result {
        let configuration = Configuration::from_toml(CONFIGURATION)?;
        let states = states(vec![
            state("sensor.easee_status", "charging", None),
            state("switch.easee_is_enabled", "on", None),
            state("sensor.nordpool", "85.5", Some("öre/kWh")),
            state("input_number.surcharge", "0.25", None),
            state("schedule.cheap_hours", "off", None),
            state("sensor.house_power", "0.8", Some("kW")),
            state("sensor.pv_power", "5200", Some("W")),
            state("sensor.easee_max_charger_limit", "32", Some("A")),
            state("sensor.easee_dynamic_charger_limit", "10.0", Some("A")),
            state("sensor.car_battery", "55", Some("%")),
            state("input_boolean.ev_smart", "on", None),
            state("input_number.ev_max_price", "1.2", None),
        ])?;
        let mut availability = Availability::default();
        let mut inputs = EntityInputs::new(
            &states,
            &configuration.entities,
            &configuration.controls.entities,
            configuration.target_soc,
            &mut availability,
        );
        let snapshot = Snapshot::read(&mut inputs, &configuration.controls.defaults);

        assert_eq!(snapshot.charger_status, ChargerStatus::Charging);
        assert!(snapshot.main_switch_on);
        assert_abs_diff_eq!(snapshot.price.unwrap().0, 0.855, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshot.surcharge.0, 0.25);
        assert!(!snapshot.time_schedule_active);
        assert!(snapshot.solar_schedule_active);
        assert_eq!(snapshot.house_power, Some(Watts(800.0)));
        assert_eq!(snapshot.solar_power, Some(Watts(5200.0)));
        assert_eq!(snapshot.max_current, Amperes(32.0));
        assert_eq!(snapshot.dynamic_limit, Some(Amperes(10.0)));
        assert_eq!(snapshot.ev_soc, Some(Percent(55.0)));
        assert_eq!(snapshot.target_soc, Some(Percent(80.0)));
        assert_eq!(snapshot.ev_power, None);
        assert!(snapshot.controls.smart_enabled);
        assert_eq!(snapshot.controls.max_price, KilowattHourRate(1.2));
        assert!(!snapshot.controls.solar_enabled);
        assert_eq!(snapshot.controls.solar_buffer, Controls::DEFAULT_SOLAR_BUFFER);
        Ok(())
    }

    #[test]
    fn unavailable_inputs_fall_back() -> Result {
        let configuration = Configuration::from_toml(CONFIGURATION)?;
        let states = states(vec![
            state("sensor.easee_status", "unavailable", None),
            state("switch.easee_is_enabled", "unknown", None),
            state("sensor.nordpool", "not a number", Some("SEK/kWh")),
            state("schedule.cheap_hours", "unavailable", None),
            state("sensor.easee_max_charger_limit", "0", Some("A")),
            state("input_boolean.ev_smart", "unavailable", None),
            state("input_number.ev_max_price", "unavailable", None),
        ])?;
        let mut availability = Availability::default();
        let mut inputs = EntityInputs::new(
            &states,
            &configuration.entities,
            &configuration.controls.entities,
            configuration.target_soc,
            &mut availability,
        );
        let snapshot = Snapshot::read(&mut inputs, &configuration.controls.defaults);

        assert_eq!(snapshot.charger_status, ChargerStatus::Unknown);
        assert!(snapshot.main_switch_on);
        assert_eq!(snapshot.price, None);
        assert_eq!(snapshot.surcharge, KilowattHourRate::ZERO);
        assert!(!snapshot.time_schedule_active, "unavailable schedule is inactive");
        assert!(snapshot.solar_schedule_active, "unset schedule is always active");
        assert_eq!(snapshot.max_current, Snapshot::DEFAULT_MAX_CURRENT);
        assert_eq!(snapshot.house_power, None);
        assert_eq!(snapshot.controls, Controls::default());

        assert!(availability.is_unavailable("sensor.easee_status"));
        assert!(availability.is_unavailable("sensor.house_power"));
        assert!(!availability.is_unavailable("sensor.nordpool"));
        Ok(())
    }

    #[test]
    fn unavailable_schedules_are_inactive() -> Result {
        // language=TOML
        let contents = r#"
            charger_device_id = "0123456789abcdef"

            [entities]
            status = "sensor.easee_status"
            price = "sensor.nordpool"
            time_schedule = "schedule.cheap_hours"
            solar_schedule = "schedule.solar_hours"
        "#;
        let configuration = Configuration::from_toml(contents)?;
        let states = states(vec![
            state("sensor.easee_status", "ready_to_charge", None),
            state("schedule.cheap_hours", "unavailable", None),
            state("schedule.solar_hours", "unknown", None),
        ])?;
        let mut availability = Availability::default();
        let mut inputs = EntityInputs::new(
            &states,
            &configuration.entities,
            &configuration.controls.entities,
            configuration.target_soc,
            &mut availability,
        );
        assert_eq!(inputs.time_schedule_active(), Some(false));
        assert_eq!(inputs.solar_schedule_active(), Some(false));

        let snapshot = Snapshot::read(&mut inputs, &configuration.controls.defaults);
        assert!(!snapshot.time_schedule_active);
        assert!(!snapshot.solar_schedule_active);
        Ok(())
    }

    #[test]
    fn availability_recovers() -> Result {
        let unavailable = states(vec![state("sensor.pv_power", "unavailable", None)])?;
        let available = states(vec![state("sensor.pv_power", "1200", Some("W"))])?;
        let mut availability = Availability::default();

        assert!(availability.observe("sensor.pv_power", unavailable.get("sensor.pv_power")).is_none());
        assert!(availability.is_unavailable("sensor.pv_power"));
        assert!(availability.observe("sensor.pv_power", available.get("sensor.pv_power")).is_some());
        assert!(!availability.is_unavailable("sensor.pv_power"));
        Ok(())
    }

    #[test]
    fn unresolved_control_helpers() -> Result {
        let configuration = Configuration::from_toml(CONFIGURATION)?;
        let states = states(vec![state("input_boolean.ev_smart", "unavailable", None)])?;
        assert_eq!(
            unresolved_controls(&configuration.controls.entities, &states),
            ["input_number.ev_max_price"],
        );
        Ok(())
    }
}
