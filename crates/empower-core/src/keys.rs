//! Device and channel key conventions.
//!
//! Telemetry is addressed by a `(device_key, channel_key)` pair. Device keys
//! are `"{DeviceType}.{id}"`; AC per-line channels carry the line number as a
//! suffix (`"Voltage.1"`).

use serde::{Deserialize, Serialize};

/// Kind of device a telemetry channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Circuit,
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
    Tank,
    InverterCharger,
    #[serde(rename = "HVAC")]
    Hvac,
    #[serde(rename = "GNSS")]
    Gnss,
    Device,
    Engine,
    BinaryLogicState,
}

impl DeviceType {
    pub fn prefix(self) -> &'static str {
        match self {
            DeviceType::Circuit => "Circuit",
            DeviceType::Ac => "AC",
            DeviceType::Dc => "DC",
            DeviceType::Tank => "Tank",
            DeviceType::InverterCharger => "InverterCharger",
            DeviceType::Hvac => "HVAC",
            DeviceType::Gnss => "GNSS",
            DeviceType::Device => "Device",
            DeviceType::Engine => "Engine",
            DeviceType::BinaryLogicState => "BinaryLogicState",
        }
    }

    /// Engine devices live in their own store partition.
    pub fn is_engine(self) -> bool {
        matches!(self, DeviceType::Engine)
    }

    /// Infer the device type from a device key's prefix.
    pub fn from_device_key(device_key: &str) -> Option<Self> {
        let prefix = device_key.split('.').next()?;
        [
            DeviceType::Circuit,
            DeviceType::Ac,
            DeviceType::Dc,
            DeviceType::Tank,
            DeviceType::InverterCharger,
            DeviceType::Hvac,
            DeviceType::Gnss,
            DeviceType::Device,
            DeviceType::Engine,
            DeviceType::BinaryLogicState,
        ]
        .into_iter()
        .find(|t| t.prefix() == prefix)
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `"{DeviceType}.{id}"`.
pub fn device_key(device_type: DeviceType, id: u32) -> String {
    format!("{}.{}", device_type.prefix(), id)
}

/// Per-line AC channel key, e.g. `"Voltage.2"`.
pub fn line_channel(channel: &str, line: u8) -> String {
    format!("{}.{}", channel, line)
}

/// Channel keys reported by the telemetry feed.
pub mod channels {
    pub const LEVEL: &str = "Level";
    pub const CURRENT: &str = "Current";
    pub const VOLTAGE: &str = "Voltage";
    pub const FREQUENCY: &str = "Frequency";
    pub const POWER: &str = "Power";
    pub const TEMPERATURE: &str = "Temperature";
    pub const STATE_OF_CHARGE: &str = "StateOfCharge";
    pub const CAPACITY_REMAINING: &str = "CapacityRemaining";
    pub const TIME_REMAINING: &str = "TimeRemaining";
    pub const COMPONENT_STATUS: &str = "ComponentStatus";
    pub const STATE: &str = "State";

    pub const INVERTER_ENABLE: &str = "InverterEnable";
    pub const INVERTER_STATE: &str = "InverterState";
    pub const INVERTER_COMPONENT_STATUS: &str = "InverterComponentStatus";
    pub const CHARGER_ENABLE: &str = "ChargerEnable";
    pub const CHARGER_STATE: &str = "ChargerState";
    pub const CHARGER_COMPONENT_STATUS: &str = "ChargerComponentStatus";

    pub const TANK_LEVEL: &str = "Level";
    pub const TANK_VOLUME: &str = "Volume";

    pub const HVAC_MODE: &str = "Mode";
    pub const HVAC_FAN_MODE: &str = "FanMode";
    pub const HVAC_FAN_SPEED: &str = "FanSpeed";
    pub const HVAC_SETPOINT: &str = "SetpointTemperature";
    pub const HVAC_AMBIENT: &str = "AmbientTemperature";

    pub const GNSS_LATITUDE: &str = "Latitude";
    pub const GNSS_LONGITUDE: &str = "Longitude";
    pub const GNSS_SOG: &str = "Sog";
    pub const GNSS_FIX_TYPE: &str = "FixType";

    pub const ENGINE_SPEED: &str = "Speed";
    pub const ENGINE_COOLANT_TEMPERATURE: &str = "CoolantTemperature";
    pub const ENGINE_OIL_PRESSURE: &str = "OilPressure";
    pub const ENGINE_HOURS: &str = "EngineHours";
    pub const ENGINE_STATUS: &str = "Status";
}

/// Component status string reported by a connected device.
pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_DISCONNECTED: &str = "Disconnected";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_key_round_trip() {
        let key = device_key(DeviceType::Ac, 3);
        assert_eq!(key, "AC.3");
        assert_eq!(DeviceType::from_device_key(&key), Some(DeviceType::Ac));
        assert_eq!(DeviceType::from_device_key("Engine.0"), Some(DeviceType::Engine));
        assert_eq!(DeviceType::from_device_key("Bogus.1"), None);
    }

    #[test]
    fn test_line_channel() {
        assert_eq!(line_channel(channels::VOLTAGE, 2), "Voltage.2");
    }
}
