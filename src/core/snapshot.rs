use bon::Builder;
use serde::Deserialize;

use crate::{
    core::{reader::Inputs, status::ChargerStatus},
    quantity::{
        current::Amperes,
        percent::Percent,
        power::Watts,
        rate::KilowattHourRate,
    },
};

/// User-adjustable set-points.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Builder)]
#[serde(default, deny_unknown_fields)]
pub struct Controls {
    #[builder(default)]
    pub smart_enabled: bool,

    /// Highest total price (spot plus surcharge) at which the price/time mode charges.
    #[builder(default = Controls::DEFAULT_MAX_PRICE)]
    pub max_price: KilowattHourRate,

    #[builder(default)]
    pub solar_enabled: bool,

    /// Power kept aside for the house before the surplus is counted.
    #[builder(default = Controls::DEFAULT_SOLAR_BUFFER)]
    pub solar_buffer: Watts,

    /// Lowest current the solar surplus must sustain.
    #[builder(default = Controls::DEFAULT_MIN_SOLAR_CURRENT)]
    pub min_solar_current: Amperes,
}

impl Controls {
    pub const DEFAULT_MAX_PRICE: KilowattHourRate = KilowattHourRate(1.5);
    pub const DEFAULT_SOLAR_BUFFER: Watts = Watts(50.0);
    pub const DEFAULT_MIN_SOLAR_CURRENT: Amperes = Amperes(6.0);
}

impl Default for Controls {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Every external input of a single tick, with the fallbacks already applied.
#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct Snapshot {
    pub charger_status: ChargerStatus,

    #[builder(default = true)]
    pub main_switch_on: bool,

    /// Spot price, absent while the price sensor is unavailable.
    pub price: Option<KilowattHourRate>,

    #[builder(default)]
    pub surcharge: KilowattHourRate,

    #[builder(default = true)]
    pub time_schedule_active: bool,

    #[builder(default = true)]
    pub solar_schedule_active: bool,

    pub house_power: Option<Watts>,
    pub solar_power: Option<Watts>,

    #[builder(default = Snapshot::DEFAULT_MAX_CURRENT)]
    pub max_current: Amperes,

    /// Active dynamic current limit as read back from the charger.
    pub dynamic_limit: Option<Amperes>,

    pub ev_soc: Option<Percent>,
    pub target_soc: Option<Percent>,

    /// Charging power, only used for the session energy estimate.
    pub ev_power: Option<Watts>,

    #[builder(default)]
    pub controls: Controls,
}

impl Snapshot {
    /// Hardware ceiling used when the charger does not report its own.
    pub const DEFAULT_MAX_CURRENT: Amperes = Amperes(16.0);

    /// Read every input through the port, falling back to the safe defaults.
    pub fn read(inputs: &mut impl Inputs, defaults: &Controls) -> Self {
        let controls = Controls {
            smart_enabled: inputs.smart_enabled().unwrap_or(defaults.smart_enabled),
            max_price: inputs.max_price().unwrap_or(defaults.max_price),
            solar_enabled: inputs.solar_enabled().unwrap_or(defaults.solar_enabled),
            solar_buffer: inputs.solar_buffer().unwrap_or(defaults.solar_buffer),
            min_solar_current: inputs.min_solar_current().unwrap_or(defaults.min_solar_current),
        };
        Self {
            charger_status: inputs.charger_status().unwrap_or(ChargerStatus::Unknown),
            main_switch_on: inputs.main_switch_on().unwrap_or(true),
            price: inputs.price(),
            surcharge: inputs.surcharge().unwrap_or_default(),
            time_schedule_active: inputs.time_schedule_active().unwrap_or(true),
            solar_schedule_active: inputs.solar_schedule_active().unwrap_or(true),
            house_power: inputs.house_power(),
            solar_power: inputs.solar_power(),
            max_current: inputs
                .max_current()
                .filter(|max_current| *max_current > Amperes::ZERO)
                .unwrap_or(Self::DEFAULT_MAX_CURRENT),
            dynamic_limit: inputs.dynamic_limit(),
            ev_soc: inputs.ev_soc(),
            target_soc: inputs.target_soc(),
            ev_power: inputs.ev_power(),
            controls,
        }
    }

    /// Spot price plus surcharge.
    pub fn total_price(&self) -> Option<KilowattHourRate> {
        self.price.map(|price| price + self.surcharge)
    }

    /// Solar production minus the house consumption and the buffer.
    pub fn solar_surplus(&self) -> Watts {
        self.solar_power.unwrap_or_default()
            - self.house_power.unwrap_or_default()
            - self.controls.solar_buffer
    }
}
