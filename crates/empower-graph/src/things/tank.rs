//! Fluid tanks, their alarms and the pumps that serve them.

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::Tank;
use empower_core::{Channel, Link, Thing, ThingType, Unit};

use super::enum_name;
use crate::alarms::tank_alarms;
use crate::error::ConfigBuildError;
use crate::streams::Sources;

pub const PUMP_TAG: &str = "empower:tank.pump";
pub const TANK_TAG: &str = "empower:pump.tank";

pub fn build_tank(tank: &Tank, sources: &Sources<'_>) -> Result<Thing, ConfigBuildError> {
    if !tank.capacity.is_finite() || tank.capacity < 0.0 {
        return Err(ConfigBuildError::invalid(
            format!("tank {}", tank.instance),
            format!("capacity {}", tank.capacity),
        ));
    }

    let id = tank.instance;
    let mut thing = Thing::new(ThingType::Tank, id, tank.name.clone());
    thing.set_metadata("tankType", enum_name(&tank.tank_type));
    thing.set_metadata("capacity", tank.capacity);

    thing.bind(
        Channel::number("level", "Level", Unit::Percent),
        sources.percent(DeviceType::Tank, id, channels::TANK_LEVEL),
    )?;
    if tank.capacity > 0.0 {
        thing.bind(
            Channel::number("volume", "Volume", Unit::Litres),
            sources.numeric(DeviceType::Tank, id, channels::TANK_VOLUME, Quantity::Volume),
        )?;
    }

    for alarm in tank_alarms(tank) {
        thing.add_alarm(alarm);
    }
    Ok(thing)
}

/// Link a tank and its pump in both directions.
pub fn link_pump(tank: &mut Thing, pump: &mut Thing) {
    tank.add_link(Link::new(pump.id.clone(), &[PUMP_TAG]));
    pump.add_link(Link::new(tank.id.clone(), &[TANK_TAG]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::config::EmpowerSettings;
    use empower_core::{ManualTicker, MemoryChannelStore};

    #[test]
    fn test_volume_only_with_capacity() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let unsized_tank = Tank {
            instance: 1,
            ..Default::default()
        };
        let unsized_tank = build_tank(&unsized_tank, &sources).unwrap();
        assert!(unsized_tank.channel("volume").is_none());

        let sized = Tank {
            instance: 2,
            capacity: 120.0,
            ..Default::default()
        };
        let sized = build_tank(&sized, &sources).unwrap();
        assert!(sized.channel("volume").is_some());
    }

    #[test]
    fn test_negative_capacity_is_invalid() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let leaking = Tank {
            instance: 1,
            capacity: -5.0,
            ..Default::default()
        };
        let err = build_tank(&leaking, &sources).unwrap_err();
        assert!(matches!(err, ConfigBuildError::InvalidRecord { .. }));
    }
}
