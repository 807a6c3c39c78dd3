//! Configuration file.
//!
//! The file is read at startup and re-read as a whole on `SIGHUP`. Nothing is updated incrementally.

use std::{fs, path::Path, time::Duration};

use enumset::EnumSet;
use itertools::Itertools;
use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};

use crate::{
    core::{snapshot::Controls, status::ChargerStatus},
    prelude::*,
    quantity::percent::Percent,
};

#[must_use]
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Home Assistant device ID of the charger, used in the charger service calls.
    pub charger_device_id: String,

    pub entities: Entities,

    /// Stop charging once the car reaches this state of charge.
    #[serde(default)]
    pub target_soc: Option<Percent>,

    #[serde(default = "Configuration::default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Raise the log level to `DEBUG`.
    #[serde(default)]
    pub debug_logging: bool,

    /// How long a sufficient solar surplus has to last before charging starts.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(
        rename = "solar_surplus_delay_secs",
        default = "Configuration::default_solar_surplus_delay"
    )]
    pub solar_surplus_delay: Duration,

    /// Statuses which mean that somebody else took over while a smart mode was charging.
    #[serde(default = "Configuration::default_unexpected_statuses")]
    pub unexpected_statuses: Vec<ChargerStatus>,

    #[serde(default)]
    pub controls: ControlsConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

impl Configuration {
    pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
    pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

    const fn default_poll_interval_secs() -> u64 {
        30
    }

    const fn default_solar_surplus_delay() -> Duration {
        Duration::from_secs(300)
    }

    fn default_unexpected_statuses() -> Vec<ChargerStatus> {
        vec![ChargerStatus::Error, ChargerStatus::Unknown]
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let configuration = Self::from_toml(&contents)
            .with_context(|| format!("invalid configuration in `{}`", path.display()))?;
        info!(
            charger_device_id = %configuration.charger_device_id,
            poll_interval = ?configuration.poll_interval(),
            debug_logging = configuration.debug_logging,
            "loaded",
        );
        Ok(configuration)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let configuration: Self = toml::from_str(contents)?;
        if let Some(target_soc) = configuration.target_soc {
            ensure!(
                (0.0..=100.0).contains(&target_soc.0),
                "target state of charge must be within 0–100%, got {target_soc}",
            );
        }
        Ok(configuration)
    }

    /// Polling interval clamped to the allowed range.
    pub fn poll_interval(&self) -> Duration {
        let secs = self
            .poll_interval_secs
            .clamp(Self::MIN_POLL_INTERVAL_SECS, Self::MAX_POLL_INTERVAL_SECS);
        if secs != self.poll_interval_secs {
            warn!(requested = self.poll_interval_secs, secs, "poll interval clamped");
        }
        Duration::from_secs(secs)
    }

    pub fn unexpected_statuses(&self) -> EnumSet<ChargerStatus> {
        self.unexpected_statuses.iter().copied().collect()
    }

    /// Entities whose changes trigger an immediate evaluation.
    pub fn watched_entity_ids(&self) -> impl Iterator<Item = &str> {
        [
            Some(&self.entities.status),
            self.entities.main_switch.as_ref(),
            Some(&self.entities.price),
            self.entities.solar_power.as_ref(),
            self.target_soc.and(self.entities.ev_soc.as_ref()),
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }
}

/// References to the external entities.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entities {
    /// Charger status sensor.
    pub status: String,

    /// Charger enable switch. Considered on when not configured.
    #[serde(default)]
    pub main_switch: Option<String>,

    /// Spot price sensor.
    pub price: String,

    /// Price surcharge (grid fees, taxes) added to the spot price.
    #[serde(default)]
    pub surcharge: Option<String>,

    /// Schedule which allows the price/time charging. Always active when not configured.
    #[serde(default)]
    pub time_schedule: Option<String>,

    /// Total house consumption.
    #[serde(default)]
    pub house_power: Option<String>,

    /// Solar production.
    #[serde(default)]
    pub solar_power: Option<String>,

    /// Schedule which allows the solar charging. Always active when not configured.
    #[serde(default)]
    pub solar_schedule: Option<String>,

    /// Hardware current ceiling of the charger.
    #[serde(default)]
    pub max_current: Option<String>,

    /// Read-back of the dynamic current limit.
    #[serde(default)]
    pub dynamic_current: Option<String>,

    /// Car state of charge.
    #[serde(default)]
    pub ev_soc: Option<String>,

    /// Charging power, used to estimate the session energy.
    #[serde(default)]
    pub ev_power: Option<String>,
}

#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlsConfig {
    #[serde(default)]
    pub entities: ControlEntities,

    /// Values used while a control is not configured or not available.
    #[serde(default)]
    pub defaults: Controls,
}

/// Helper entities holding the user-adjustable controls.
#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlEntities {
    #[serde(default)]
    pub smart_enabled: Option<String>,

    #[serde(default)]
    pub max_price: Option<String>,

    #[serde(default)]
    pub solar_enabled: Option<String>,

    #[serde(default)]
    pub solar_buffer: Option<String>,

    #[serde(default)]
    pub min_solar_current: Option<String>,
}

impl ControlEntities {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        [
            &self.smart_enabled,
            &self.max_price,
            &self.solar_enabled,
            &self.solar_buffer,
            &self.min_solar_current,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }
}

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Publish the decision as Home Assistant sensor states.
    #[serde(default = "PublishConfig::default_enabled")]
    pub enabled: bool,

    /// Object ID prefix of the published sensors.
    #[serde(default = "PublishConfig::default_prefix")]
    pub prefix: String,
}

impl PublishConfig {
    const fn default_enabled() -> bool {
        true
    }

    fn default_prefix() -> String {
        "smart_ev_charging".to_owned()
    }

    pub fn entity_id(&self, suffix: &str) -> String {
        format!("sensor.{}_{suffix}", self.prefix)
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { enabled: Self::default_enabled(), prefix: Self::default_prefix() }
    }
}

/// Log the entities that are referenced but unused, which is usually a typo.
pub fn log_unused_entities(configuration: &Configuration) {
    if configuration.target_soc.is_none() && configuration.entities.ev_soc.is_some() {
        warn!("`entities.ev_soc` is set but `target_soc` is not, the SoC limit is disabled");
    }
    if configuration.entities.solar_power.is_none()
        && configuration.controls.entities.solar_enabled.is_some()
    {
        warn!("solar charging is controllable but `entities.solar_power` is not set");
    }
    debug!(
        watched = configuration.watched_entity_ids().join(", "),
        unexpected_statuses = configuration.unexpected_statuses.iter().join(", "),
        "configuration",
    );
}
