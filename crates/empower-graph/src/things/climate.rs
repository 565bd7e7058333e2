//! HVAC units.

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::HvacDevice;
use empower_core::{Channel, ChannelType, Thing, ThingType, Unit};

use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Climate Thing for one HVAC unit.
pub fn build_climate(hvac: &HvacDevice, sources: &Sources<'_>) -> Result<Thing, ConfigBuildError> {
    let id = hvac.instance;
    let mut thing = Thing::new(ThingType::Climate, id, hvac.name.clone());
    thing.set_metadata("fanSpeedCount", hvac.fan_speed_count);

    thing.bind(
        Channel::string("mode", "Mode").read_only(false),
        sources.discrete(DeviceType::Hvac, id, channels::HVAC_MODE),
    )?;
    thing.bind(
        Channel::string("fanMode", "Fan Mode").read_only(false),
        sources.discrete(DeviceType::Hvac, id, channels::HVAC_FAN_MODE),
    )?;
    if hvac.fan_speed_count > 0 {
        thing.bind(
            Channel::new("fanSpeed", "Fan Speed", ChannelType::Number).read_only(false),
            sources.discrete(DeviceType::Hvac, id, channels::HVAC_FAN_SPEED),
        )?;
    }
    thing.bind(
        Channel::number("setpointTemperature", "Setpoint", Unit::Celsius).read_only(false),
        sources.numeric(DeviceType::Hvac, id, channels::HVAC_SETPOINT, Quantity::Temperature),
    )?;
    thing.bind(
        Channel::number("ambientTemperature", "Ambient Temperature", Unit::Celsius),
        sources.numeric(DeviceType::Hvac, id, channels::HVAC_AMBIENT, Quantity::Temperature),
    )?;
    Ok(thing)
}
