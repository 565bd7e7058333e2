//! Hubs: network devices of the hub class.

use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::Device;
use empower_core::{Channel, Thing, ThingType};

use super::enum_name;
use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Hub Thing for a hub-class network device, keyed by source address.
pub fn build_hub(device: &Device, sources: &Sources<'_>) -> Result<Thing, ConfigBuildError> {
    let mut thing = Thing::new(ThingType::Hub, device.source_address, device.name.clone());
    thing.set_metadata("serialNumber", device.serial_number.clone());
    thing.set_metadata("firmwareVersion", device.firmware_version.clone());
    thing.set_metadata("class", enum_name(&device.class));

    thing.bind(
        Channel::string("componentStatus", "Component Status"),
        sources.discrete(DeviceType::Device, device.source_address, channels::COMPONENT_STATUS),
    )?;
    Ok(thing)
}
