//! Engines, built into the separately reloaded engine list.

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::EngineDevice;
use empower_core::{Channel, Thing, ThingType, Unit};

use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Engine Thing, written to the engine partition.
pub fn build_engine(
    engine: &EngineDevice,
    sources: &Sources<'_>,
) -> Result<Thing, ConfigBuildError> {
    let id = engine.instance;
    let mut thing = Thing::new(ThingType::Engine, id, engine.name.clone());
    thing.set_metadata("engineType", engine.engine_type.clone());
    thing.set_metadata("serialNumber", engine.serial_number.clone());

    thing.bind(
        Channel::number("speed", "Speed", Unit::Rpm),
        sources
            .channel(DeviceType::Engine, id, channels::ENGINE_SPEED)
            .round(0)
            .min_change(10.0),
    )?;
    thing.bind(
        Channel::number("coolantTemperature", "Coolant Temperature", Unit::Celsius),
        sources.numeric(
            DeviceType::Engine,
            id,
            channels::ENGINE_COOLANT_TEMPERATURE,
            Quantity::Temperature,
        ),
    )?;
    thing.bind(
        Channel::number("oilPressure", "Oil Pressure", Unit::Pascal),
        sources.numeric(
            DeviceType::Engine,
            id,
            channels::ENGINE_OIL_PRESSURE,
            Quantity::Pressure,
        ),
    )?;
    thing.bind(
        Channel::number("engineHours", "Engine Hours", Unit::Hours),
        sources
            .channel(DeviceType::Engine, id, channels::ENGINE_HOURS)
            .round(1)
            .distinct_until_changed(),
    )?;
    thing.bind(
        Channel::string("status", "Status"),
        sources.discrete(DeviceType::Engine, id, channels::ENGINE_STATUS),
    )?;
    Ok(thing)
}
