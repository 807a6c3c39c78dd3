use std::fmt::{Display, Formatter};

use enumset::{EnumSet, enum_set};
use serde::Deserialize;

/// Charger status as reported by the status sensor.
#[derive(Debug, Hash, Deserialize, enumset::EnumSetType)]
#[serde(rename_all = "snake_case")]
pub enum ChargerStatus {
    Disconnected,
    AwaitingStart,
    ReadyToCharge,
    Charging,
    Paused,
    Completed,
    Error,
    Offline,
    Unknown,
}

impl ChargerStatus {
    /// Statuses from which a start or resume command makes sense.
    pub const STARTABLE: EnumSet<Self> = enum_set!(
        ChargerStatus::ReadyToCharge
            | ChargerStatus::AwaitingStart
            | ChargerStatus::Paused
            | ChargerStatus::Completed
    );

    /// Statuses in which the car cannot be charged at all.
    pub const UNREACHABLE: EnumSet<Self> =
        enum_set!(ChargerStatus::Disconnected | ChargerStatus::Offline);

    /// Statuses in which a session may stay open while nothing is being sent.
    pub const IDLE_CONNECTED: EnumSet<Self> = enum_set!(
        ChargerStatus::AwaitingStart | ChargerStatus::ReadyToCharge | ChargerStatus::Paused
    );

    /// Parse the raw sensor state. Anything unrecognized is [`ChargerStatus::Unknown`].
    pub fn from_state(state: &str) -> Self {
        match state.trim() {
            "disconnected" => Self::Disconnected,
            "awaiting_start" => Self::AwaitingStart,
            "ready_to_charge" => Self::ReadyToCharge,
            "charging" => Self::Charging,
            "paused" | "charging_paused_by_smartcharging" => Self::Paused,
            "completed" => Self::Completed,
            "error" => Self::Error,
            "offline" => Self::Offline,
            _ => Self::Unknown,
        }
    }

    pub fn is_unreachable(self) -> bool {
        Self::UNREACHABLE.contains(self)
    }
}

impl Display for ChargerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::AwaitingStart => write!(f, "awaiting start"),
            Self::ReadyToCharge => write!(f, "ready to charge"),
            Self::Charging => write!(f, "charging"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_state() {
        assert_eq!(ChargerStatus::from_state("ready_to_charge"), ChargerStatus::ReadyToCharge);
        assert_eq!(
            ChargerStatus::from_state("charging_paused_by_smartcharging"),
            ChargerStatus::Paused,
        );
        assert_eq!(ChargerStatus::from_state("unavailable"), ChargerStatus::Unknown);
        assert_eq!(ChargerStatus::from_state("Charging"), ChargerStatus::Unknown);
    }

    #[test]
    fn startable_statuses() {
        assert!(ChargerStatus::STARTABLE.contains(ChargerStatus::Completed));
        assert!(!ChargerStatus::STARTABLE.contains(ChargerStatus::Charging));
        assert!(!ChargerStatus::STARTABLE.contains(ChargerStatus::Error));
    }

    #[test]
    fn deserialize_from_config() -> crate::prelude::Result {
        #[derive(Deserialize)]
        struct Statuses {
            statuses: Vec<ChargerStatus>,
        }
        let statuses: Statuses = toml::from_str(r#"statuses = ["error", "awaiting_start"]"#)?;
        assert_eq!(statuses.statuses, [ChargerStatus::Error, ChargerStatus::AwaitingStart]);
        Ok(())
    }
}
