use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Control strategy commanding the charger in a tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// No smart control is active, or it is blocked.
    #[default]
    #[serde(rename = "off")]
    Manual,

    /// Charge at full current while the price is low enough within the time schedule.
    PriceTime,

    /// Charge with the current that the solar surplus sustains.
    SolarSurplus,
}

impl ControlMode {
    pub const fn is_smart(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Token published as the entity state.
    pub const fn as_state(self) -> &'static str {
        match self {
            Self::Manual => "off",
            Self::PriceTime => "price_time",
            Self::SolarSurplus => "solar_surplus",
        }
    }
}

impl Display for ControlMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::PriceTime => write!(f, "Price/time"),
            Self::SolarSurplus => write!(f, "Solar surplus"),
        }
    }
}
