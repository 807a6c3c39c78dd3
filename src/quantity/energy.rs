use std::ops::Mul;

use crate::quantity::{cost::Cost, rate::KilowattHourRate};

quantity!(KilowattHours, suffix: " kWh", precision: 3);

impl Mul<KilowattHourRate> for KilowattHours {
    type Output = Cost;

    fn mul(self, rhs: KilowattHourRate) -> Self::Output {
        Cost(self.0 * rhs.0)
    }
}
