//! Conversion of raw sensor readings into canonical units.
//!
//! All functions are total: unparsable numbers yield [`None`], and unknown units fall back
//! to a documented interpretation with a warning.

use crate::{
    prelude::*,
    quantity::{
        power::{Kilowatts, Watts},
        rate::KilowattHourRate,
    },
};

/// Major currency units which are sometimes used without the `/kWh` part.
const BARE_CURRENCIES: [&str; 5] = ["kr", "sek", "nok", "dkk", "eur"];

/// Minor currency unit markers.
const MINOR_CURRENCIES: [&str; 5] = ["öre", "øre", "ore", "cent", "ct"];

/// Parse the raw state as a finite number.
pub fn parse_number(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!(raw, "not a number");
            None
        }
    }
}

/// Normalize a power reading to watts.
pub fn normalize_power(raw: &str, unit: &str) -> Option<Watts> {
    let value = parse_number(raw)?;
    let unit = unit.trim().to_lowercase();
    match unit.as_str() {
        "kw" => Some(Kilowatts(value).into()),
        "w" => Some(Watts(value)),
        _ => {
            warn!(%unit, value, "unknown power unit, assuming watts");
            Some(Watts(value))
        }
    }
}

/// Normalize a price reading to the major currency per kilowatt-hour.
pub fn normalize_price(raw: &str, unit: &str) -> Option<KilowattHourRate> {
    let value = parse_number(raw)?;
    let unit = unit.trim().to_lowercase();
    let currency = unit.split('/').next().unwrap_or_default();
    let is_minor = MINOR_CURRENCIES.iter().any(|minor| currency.contains(minor));

    if unit.contains("/mwh") {
        let per_kwh = value / 1000.0;
        return Some(KilowattHourRate(if is_minor { per_kwh / 100.0 } else { per_kwh }));
    }
    if unit.ends_with("/kwh") {
        return Some(KilowattHourRate(if is_minor { value / 100.0 } else { value }));
    }
    if BARE_CURRENCIES.contains(&unit.as_str()) {
        warn!(%unit, "price unit without `/kWh`, assuming per kilowatt-hour");
        return Some(KilowattHourRate(value));
    }
    warn!(%unit, value, "unknown price unit, assuming minor currency per kilowatt-hour");
    Some(KilowattHourRate(value / 100.0))
}

/// Normalize a surcharge reading.
///
/// Unlike [`normalize_price`], a missing or unknown unit means the major currency per kilowatt-hour,
/// because the surcharge is usually a plain number typed in by the user.
pub fn normalize_surcharge(raw: &str, unit: &str) -> Option<KilowattHourRate> {
    let value = parse_number(raw)?;
    let unit = unit.trim().to_lowercase();
    if unit.is_empty() {
        debug!(value, "surcharge without unit, assuming per kilowatt-hour");
        return Some(KilowattHourRate(value));
    }
    if unit.ends_with("/kwh") || unit.contains("/mwh") {
        return normalize_price(raw, &unit);
    }
    if !BARE_CURRENCIES.contains(&unit.as_str()) {
        warn!(%unit, value, "unknown surcharge unit, assuming per kilowatt-hour");
    }
    Some(KilowattHourRate(value))
}
