//! Thing builders, one module per device family.
//!
//! Builders are pure: they declare channels and bind streams but subscribe
//! nothing, so a failed build leaves the store untouched.

pub mod ac_meter;
pub mod battery;
pub mod circuit;
pub mod climate;
pub mod engine;
pub mod gnss;
pub mod hub;
pub mod inverter_charger;
pub mod tank;

use serde::Serialize;
use serde_json::Value;

use empower_core::config::Quantity;
use empower_core::keys::{channels, line_channel, DeviceType};
use empower_core::n2k::{AcMeter, Circuit};
use empower_core::{Channel, Thing, Unit};

use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Serialized name of a config enum, e.g. `"FreshWater"`.
pub(crate) fn enum_name<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Bind voltage, current, frequency and power for every line of `meter`.
pub(crate) fn bind_ac_lines(
    thing: &mut Thing,
    meter: &AcMeter,
    sources: &Sources<'_>,
) -> Result<(), ConfigBuildError> {
    let quantities = [
        (channels::VOLTAGE, "Voltage", Unit::Volts, Quantity::Voltage),
        (channels::CURRENT, "Current", Unit::Amps, Quantity::Current),
        (channels::FREQUENCY, "Frequency", Unit::Hertz, Quantity::Frequency),
        (channels::POWER, "Power", Unit::Watts, Quantity::Power),
    ];

    for line in meter.lines.values() {
        if !(1..=3).contains(&line.line) {
            return Err(ConfigBuildError::invalid(
                format!("AC meter {}", meter.instance),
                format!("line number {} outside 1..=3", line.line),
            ));
        }
        for (key, label, unit, quantity) in quantities {
            let stream = sources.numeric(
                DeviceType::Ac,
                meter.instance,
                &line_channel(key, line.line),
                quantity,
            );
            thing.bind(
                Channel::number(
                    format!("line{}{}", line.line, label),
                    format!("Line {} {}", line.line, label),
                    unit,
                ),
                stream,
            )?;
        }
    }
    Ok(())
}

/// Bind a circuit's on/off state as `enabled`. Writable unless the circuit
/// has no switch.
pub(crate) fn bind_circuit_enabled(
    thing: &mut Thing,
    circuit: &Circuit,
    sources: &Sources<'_>,
) -> Result<String, ConfigBuildError> {
    thing.set_metadata("circuitId", circuit.control_id);
    let full_id = thing.bind(
        Channel::boolean("enabled", "Enabled").read_only(!circuit.switch_type.is_controllable()),
        sources.circuit_on(circuit.control_id),
    )?;
    Ok(full_id)
}
