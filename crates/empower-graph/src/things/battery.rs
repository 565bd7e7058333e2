//! Standalone DC meters.

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::{Circuit, Dc, DisplaySettings};
use empower_core::{Channel, Thing, ThingType, Unit};

use super::bind_circuit_enabled;
use crate::alarms::battery_alarms;
use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Dashboard role of a battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryRole {
    Primary,
    Fallback,
}

impl BatteryRole {
    fn as_str(self) -> &'static str {
        match self {
            BatteryRole::Primary => "primary",
            BatteryRole::Fallback => "fallback",
        }
    }
}

/// Roles of the display-selected batteries among the standalone ones. A
/// fallback battery stands in as primary when the primary is not a
/// standalone battery.
pub fn battery_roles(
    display: &DisplaySettings,
    is_standalone: impl Fn(u32) -> bool,
) -> Vec<(u32, BatteryRole)> {
    let primary = display.primary_battery.filter(|id| is_standalone(*id));
    let fallback = display.fallback_battery.filter(|id| is_standalone(*id));

    match (primary, fallback) {
        (Some(p), Some(f)) if p != f => {
            vec![(p, BatteryRole::Primary), (f, BatteryRole::Fallback)]
        }
        (Some(p), _) => vec![(p, BatteryRole::Primary)],
        (None, Some(f)) => vec![(f, BatteryRole::Primary)],
        (None, None) => Vec::new(),
    }
}

pub fn build_battery(
    dc: &Dc,
    battery_switch: Option<&Circuit>,
    role: Option<BatteryRole>,
    sources: &Sources<'_>,
) -> Result<Thing, ConfigBuildError> {
    let id = dc.instance;
    let mut thing = Thing::new(ThingType::Battery, id, dc.name.clone());
    thing.set_metadata("capacity", dc.capacity);
    if let Some(role) = role {
        thing.set_metadata("role", role.as_str());
    }

    if dc.show_voltage {
        thing.bind(
            Channel::number("voltage", "Voltage", Unit::Volts),
            sources.numeric(DeviceType::Dc, id, channels::VOLTAGE, Quantity::Voltage),
        )?;
    }
    if dc.show_current {
        thing.bind(
            Channel::number("current", "Current", Unit::Amps),
            sources.numeric(DeviceType::Dc, id, channels::CURRENT, Quantity::Current),
        )?;
    }
    if dc.show_state_of_charge {
        thing.bind(
            Channel::number("stateOfCharge", "State of Charge", Unit::Percent),
            sources.percent(DeviceType::Dc, id, channels::STATE_OF_CHARGE),
        )?;
    }
    if dc.show_temperature {
        thing.bind(
            Channel::number("temperature", "Temperature", Unit::Celsius),
            sources.numeric(DeviceType::Dc, id, channels::TEMPERATURE, Quantity::Temperature),
        )?;
    }
    if dc.show_time_remaining {
        thing.bind(
            Channel::number("timeRemaining", "Time Remaining", Unit::Seconds),
            sources.discrete(DeviceType::Dc, id, channels::TIME_REMAINING),
        )?;
    }
    if dc.show_capacity_remaining {
        thing.bind(
            Channel::number("capacityRemaining", "Capacity Remaining", Unit::AmpHours),
            sources.numeric(
                DeviceType::Dc,
                id,
                channels::CAPACITY_REMAINING,
                Quantity::CapacityRemaining,
            ),
        )?;
    }

    if let Some(circuit) = battery_switch {
        bind_circuit_enabled(&mut thing, circuit, sources)?;
    }

    for alarm in battery_alarms(dc) {
        thing.add_alarm(alarm);
    }
    Ok(thing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(primary: Option<u32>, fallback: Option<u32>) -> DisplaySettings {
        DisplaySettings {
            primary_battery: primary,
            fallback_battery: fallback,
        }
    }

    #[test]
    fn test_roles_when_both_standalone() {
        let roles = battery_roles(&display(Some(1), Some(2)), |_| true);
        assert_eq!(roles, vec![(1, BatteryRole::Primary), (2, BatteryRole::Fallback)]);
    }

    #[test]
    fn test_fallback_promoted() {
        // battery 1 lives inside a charger
        let roles = battery_roles(&display(Some(1), Some(2)), |id| id != 1);
        assert_eq!(roles, vec![(2, BatteryRole::Primary)]);
    }

    #[test]
    fn test_no_display_selection() {
        assert!(battery_roles(&display(None, None), |_| true).is_empty());
    }
}
