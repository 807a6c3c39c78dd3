use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{api::home_assistant::EntityStates, config::Configuration, prelude::*};

/// Detects changes of the watched entities between two state fetches.
#[must_use]
#[derive(Default)]
pub struct Watcher {
    observed: HashMap<String, Observation>,
}

#[derive(Clone, PartialEq, Eq)]
struct Observation {
    state: String,
    last_updated: DateTime<Utc>,
}

impl Watcher {
    /// Remember the current states and tell whether any watched entity has changed.
    ///
    /// The status entity triggers on any update, including attribute-only ones. Other entities
    /// trigger only when the state value changes. The solar production is only watched while
    /// solar charging is enabled. The first observation of an entity is never a change.
    pub fn has_changed(
        &mut self,
        configuration: &Configuration,
        states: &EntityStates,
        is_solar_enabled: bool,
    ) -> bool {
        let mut has_changed = false;
        for entity_id in configuration.watched_entity_ids() {
            if !is_solar_enabled && Some(entity_id) == configuration.entities.solar_power.as_deref()
            {
                self.observed.remove(entity_id);
                continue;
            }
            let Some(state) = states.get(entity_id) else {
                continue;
            };
            let observation =
                Observation { state: state.state.clone(), last_updated: state.last_updated };
            let Some(previous) = self.observed.insert(entity_id.to_owned(), observation.clone())
            else {
                continue;
            };
            let is_status = entity_id == configuration.entities.status;
            if previous.state != observation.state
                || (is_status && previous.last_updated != observation.last_updated)
            {
                debug!(entity_id, from = %previous.state, to = %observation.state, "changed");
                has_changed = true;
            }
        }
        has_changed
    }
}
