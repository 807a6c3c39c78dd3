#[macro_use]
mod macros;

pub mod cost;
pub mod current;
pub mod energy;
pub mod percent;
pub mod power;
pub mod rate;
pub mod unit;
