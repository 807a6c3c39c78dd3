use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{VecSkipError, serde_as};

#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct EntityState {
    pub entity_id: String,

    /// Raw state, `unavailable` and `unknown` included.
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,

    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    pub fn is_available(&self) -> bool {
        !matches!(self.state.as_str(), "unavailable" | "unknown")
    }

    /// Unit of measurement, empty when not set.
    pub fn unit(&self) -> &str {
        self.attributes.unit_of_measurement.as_deref().unwrap_or_default()
    }
}

#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
}

/// All entity states by entity ID.
#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(from = "StateList")]
pub struct EntityStates(HashMap<String, EntityState>);

impl EntityStates {
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.0.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.0.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Response of `GET /api/states`, malformed entries are skipped.
#[serde_as]
#[derive(Deserialize)]
#[serde(transparent)]
struct StateList(#[serde_as(as = "VecSkipError<_>")] Vec<EntityState>);

impl From<StateList> for EntityStates {
    fn from(list: StateList) -> Self {
        Self(list.0.into_iter().map(|state| (state.entity_id.clone(), state)).collect())
    }
}

/// Body of `POST /api/states/<entity_id>`.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct NewState {
    pub state: String,
    pub attributes: Value,
}
