use crate::quantity::power::Watts;

quantity!(Amperes, suffix: " A", precision: 1);

impl Amperes {
    /// Whole amperes a three-phase load may draw from the given power at phase-neutral voltage.
    #[must_use]
    pub fn from_three_phase_power(power: Watts, phases: u8, voltage: f64) -> Self {
        Self((power.0 / (f64::from(phases) * voltage)).floor())
    }

    /// Round to one decimal, the resolution the charger reports its dynamic limit with.
    #[must_use]
    pub fn round_to_tenths(self) -> Self {
        Self((self.0 * 10.0).round() / 10.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn from_three_phase_power_floors() {
        assert_abs_diff_eq!(Amperes::from_three_phase_power(Watts(6000.0), 3, 230.0).0, 8.0);
        assert_abs_diff_eq!(Amperes::from_three_phase_power(Watts(5000.0), 3, 230.0).0, 7.0);
    }

    #[test]
    fn from_negative_power() {
        assert_abs_diff_eq!(Amperes::from_three_phase_power(Watts(-100.0), 3, 230.0).0, -1.0);
    }

    #[test]
    fn round_to_tenths() {
        assert_eq!(Amperes(15.96).round_to_tenths(), Amperes(16.0));
        assert_eq!(Amperes(7.04).round_to_tenths(), Amperes(7.0));
    }
}
