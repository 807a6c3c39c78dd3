use std::fmt::Display;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::core::{engine::Decision, mode::ControlMode, snapshot::Snapshot};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn value_cell(value: impl Display) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn optional_cell(value: Option<impl Display>) -> Cell {
    value.map_or_else(|| Cell::new("n/a").add_attribute(Attribute::Dim), value_cell)
}

fn flag_cell(value: bool) -> Cell {
    Cell::new(if value { "on" } else { "off" }).fg(if value { Color::Green } else { Color::Red })
}

#[must_use]
pub fn build_snapshot_table(snapshot: &Snapshot) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Input", "Value"]);
    table.add_row(vec![
        Cell::new("Charger status"),
        Cell::new(snapshot.charger_status).fg(if snapshot.charger_status.is_unreachable() {
            Color::Red
        } else {
            Color::Reset
        }),
    ]);
    table.add_row(vec![Cell::new("Main switch"), flag_cell(snapshot.main_switch_on)]);
    table.add_row(vec![Cell::new("Spot price"), optional_cell(snapshot.price)]);
    table.add_row(vec![Cell::new("Surcharge"), value_cell(snapshot.surcharge)]);
    table.add_row(vec![
        Cell::new("Total price"),
        snapshot.total_price().map_or_else(
            || Cell::new("n/a").add_attribute(Attribute::Dim),
            |price| {
                value_cell(price).fg(if price <= snapshot.controls.max_price {
                    Color::Green
                } else {
                    Color::Red
                })
            },
        ),
    ]);
    table.add_row(vec![Cell::new("Time schedule"), flag_cell(snapshot.time_schedule_active)]);
    table.add_row(vec![Cell::new("Solar schedule"), flag_cell(snapshot.solar_schedule_active)]);
    table.add_row(vec![Cell::new("House power"), optional_cell(snapshot.house_power)]);
    table.add_row(vec![Cell::new("Solar power"), optional_cell(snapshot.solar_power)]);
    table.add_row(vec![Cell::new("Solar surplus"), value_cell(snapshot.solar_surplus())]);
    table.add_row(vec![Cell::new("Max current"), value_cell(snapshot.max_current)]);
    table.add_row(vec![Cell::new("Dynamic limit"), optional_cell(snapshot.dynamic_limit)]);
    table.add_row(vec![Cell::new("EV SoC"), optional_cell(snapshot.ev_soc)]);
    table.add_row(vec![Cell::new("Target SoC"), optional_cell(snapshot.target_soc)]);
    table.add_row(vec![Cell::new("EV power"), optional_cell(snapshot.ev_power)]);
    table.add_row(vec![Cell::new("Smart charging"), flag_cell(snapshot.controls.smart_enabled)]);
    table.add_row(vec![Cell::new("Max price"), value_cell(snapshot.controls.max_price)]);
    table.add_row(vec![Cell::new("Solar charging"), flag_cell(snapshot.controls.solar_enabled)]);
    table.add_row(vec![Cell::new("Solar buffer"), value_cell(snapshot.controls.solar_buffer)]);
    table.add_row(vec![
        Cell::new("Min solar current"),
        value_cell(snapshot.controls.min_solar_current),
    ]);
    table
}

#[must_use]
pub fn build_decision_table(decision: &Decision) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Mode", "Charge", "Current", "Reason"]);
    table.add_row(vec![
        Cell::new(decision.mode).fg(match decision.mode {
            ControlMode::Manual => Color::Reset,
            ControlMode::PriceTime => Color::Cyan,
            ControlMode::SolarSurplus => Color::DarkYellow,
        }),
        flag_cell(decision.should_charge),
        value_cell(decision.target_current),
        Cell::new(&decision.reason).add_attribute(Attribute::Italic),
    ]);
    table
}
