//! Raw N2K configuration records.
//!
//! These mirror what the device-discovery collaborator reports: keyed
//! collections of circuits, AC meters (three lines each), DC meters, tanks,
//! combi inverter/chargers, HVAC units, GNSS receivers, devices and binary
//! logic states, plus the UI relationships that associate them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies the configuration a graph was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigHeader {
    pub id: u32,
    pub name: String,
    pub version: String,
}

/// The full N2K configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct N2kConfiguration {
    pub header: ConfigHeader,
    pub devices: BTreeMap<String, Device>,
    pub circuits: BTreeMap<String, Circuit>,
    pub ac: BTreeMap<String, AcMeter>,
    pub dc: BTreeMap<String, Dc>,
    pub tanks: BTreeMap<String, Tank>,
    pub inverter_chargers: BTreeMap<String, InverterChargerDevice>,
    pub hvacs: BTreeMap<String, HvacDevice>,
    pub gnss: BTreeMap<String, GnssDevice>,
    pub binary_logic_states: BTreeMap<String, BinaryLogicState>,
    pub ui_relationships: Vec<UiRelationship>,
    pub display: DisplaySettings,
}

impl N2kConfiguration {
    /// Find a circuit by its circuit id.
    pub fn circuit_by_id(&self, id: u32) -> Option<&Circuit> {
        self.circuits.values().find(|c| c.id == id)
    }

    /// Find a DC meter by instance.
    pub fn dc_by_instance(&self, instance: u32) -> Option<&Dc> {
        self.dc.values().find(|dc| dc.instance == instance)
    }

    /// Find the AC meter and line carrying line id `line_id`.
    pub fn ac_line_by_id(&self, line_id: u32) -> Option<(&AcMeter, &AcLine)> {
        self.ac.values().find_map(|meter| {
            meter
                .lines
                .values()
                .find(|line| line.id == line_id)
                .map(|line| (meter, line))
        })
    }

    pub fn binary_logic_state_by_id(&self, id: u32) -> Option<&BinaryLogicState> {
        self.binary_logic_states.values().find(|bls| bls.id == id)
    }

    /// Ids of every item associated with `(item_type, id)` that is of
    /// `other_type`, in either relationship direction.
    pub fn associated(
        &self,
        item_type: ItemType,
        id: u32,
        other_type: ItemType,
        relationship: RelationshipType,
    ) -> Vec<u32> {
        self.ui_relationships
            .iter()
            .filter(|r| r.relationship_type == relationship)
            .filter_map(|r| {
                if r.primary.item_type == item_type
                    && r.primary.id == id
                    && r.secondary.item_type == other_type
                {
                    Some(r.secondary.id)
                } else if r.secondary.item_type == item_type
                    && r.secondary.id == id
                    && r.primary.item_type == other_type
                {
                    Some(r.primary.id)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Ids of the `child_type` items that `(item_type, id)` is the parent of.
    pub fn children(&self, item_type: ItemType, id: u32, child_type: ItemType) -> Vec<u32> {
        self.ui_relationships
            .iter()
            .filter(|r| {
                r.relationship_type == RelationshipType::Child
                    && r.primary.item_type == item_type
                    && r.primary.id == id
                    && r.secondary.item_type == child_type
            })
            .map(|r| r.secondary.id)
            .collect()
    }
}

/// Engine list document, loaded and replaced independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfiguration {
    pub engines: BTreeMap<String, EngineDevice>,
}

// ============================================================================
// Devices
// ============================================================================

/// Broad class of a network device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceClass {
    Hub,
    Keypad,
    Display,
    OutputInterface,
    Combi,
    #[default]
    Other,
}

impl DeviceClass {
    pub fn is_hub(self) -> bool {
        matches!(self, DeviceClass::Hub)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub name: String,
    pub class: DeviceClass,
    pub source_address: u32,
    pub serial_number: String,
    pub firmware_version: String,
}

// ============================================================================
// Circuits
// ============================================================================

/// How a circuit may be switched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchType {
    /// No switch; the circuit cannot be controlled.
    #[default]
    None,
    Normal,
    LatchOn,
    LatchOff,
    MomentaryOn,
    MomentaryOff,
    Toggle,
    DimUp,
    DimDown,
    DimUpLatched,
    DimDownLatched,
    DimLinked,
    OnOff,
}

impl SwitchType {
    /// Whether a remote caller may switch this circuit at all.
    pub fn is_controllable(self) -> bool {
        !matches!(self, SwitchType::None)
    }

    /// Switch types that can only drive a circuit ON.
    pub fn is_on_only(self) -> bool {
        matches!(
            self,
            SwitchType::LatchOn
                | SwitchType::MomentaryOn
                | SwitchType::DimUp
                | SwitchType::DimUpLatched
        )
    }

    /// Switch types that can only drive a circuit OFF.
    pub fn is_off_only(self) -> bool {
        matches!(
            self,
            SwitchType::LatchOff
                | SwitchType::MomentaryOff
                | SwitchType::DimDown
                | SwitchType::DimDownLatched
        )
    }
}

/// Where a circuit is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteVisibility {
    #[default]
    LocalOnly,
    LocalAndRemote,
    RemoteOnly,
    Hidden,
}

impl RemoteVisibility {
    pub fn is_remote(self) -> bool {
        matches!(self, RemoteVisibility::LocalAndRemote | RemoteVisibility::RemoteOnly)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryItem {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Circuit {
    /// Circuit id used by relationships and combi references.
    pub id: u32,
    /// Id used for control commands and telemetry.
    pub control_id: u32,
    pub name: String,
    pub switch_type: SwitchType,
    pub categories: Vec<CategoryItem>,
    pub remote_visibility: RemoteVisibility,
    pub has_complement: bool,
    pub dimmable: bool,
}

impl Circuit {
    /// Names of the enabled categories.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.name.as_str())
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.category_names().any(|c| c.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// AC / DC meters
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcType {
    #[default]
    Unknown,
    Generator,
    ShorePower,
    Inverter,
    Charger,
    Outlet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcLine {
    /// Line configuration id referenced by combi devices.
    pub id: u32,
    /// Line number, 1 to 3.
    pub line: u8,
    pub ac_type: AcType,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcMeter {
    pub instance: u32,
    pub name: String,
    /// Lines keyed by line number.
    pub lines: BTreeMap<u8, AcLine>,
}

impl AcMeter {
    /// The lowest-numbered line, which determines the meter's role.
    pub fn first_line(&self) -> Option<&AcLine> {
        self.lines.values().next()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlarmLimit {
    pub enabled: bool,
    pub limit: f64,
}

impl AlarmLimit {
    pub fn active(&self) -> Option<f64> {
        self.enabled.then_some(self.limit)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dc {
    pub instance: u32,
    pub name: String,
    /// Capacity in amp-hours.
    pub capacity: f64,
    pub show_voltage: bool,
    pub show_current: bool,
    pub show_state_of_charge: bool,
    pub show_temperature: bool,
    pub show_time_remaining: bool,
    pub show_capacity_remaining: bool,
    pub very_low_limit: AlarmLimit,
    pub low_limit: AlarmLimit,
    pub high_limit: AlarmLimit,
    pub very_high_limit: AlarmLimit,
    pub very_low_voltage: AlarmLimit,
    pub low_voltage: AlarmLimit,
    pub high_voltage: AlarmLimit,
    pub very_high_voltage: AlarmLimit,
}

/// Which batteries the dashboard treats as the main bank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub primary_battery: Option<u32>,
    pub fallback_battery: Option<u32>,
}

// ============================================================================
// Tanks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankType {
    #[default]
    Fuel,
    FreshWater,
    WasteWater,
    LiveWell,
    Oil,
    BlackWater,
}

impl TankType {
    /// Water tanks may have an associated pump.
    pub fn is_water(self) -> bool {
        matches!(
            self,
            TankType::FreshWater | TankType::WasteWater | TankType::BlackWater
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tank {
    pub instance: u32,
    pub name: String,
    pub tank_type: TankType,
    /// Capacity in litres.
    pub capacity: f64,
    pub very_low_limit: AlarmLimit,
    pub low_limit: AlarmLimit,
    pub high_limit: AlarmLimit,
    pub very_high_limit: AlarmLimit,
}

// ============================================================================
// Combi, HVAC, GNSS, BLS, engines
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InverterChargerDevice {
    pub instance: u32,
    pub inverter_instance: u32,
    pub charger_instance: u32,
    pub name: String,
    pub model: String,
    /// Hidden circuit ids; each resolves to a control circuit.
    pub inverter_circuit_id: Option<u32>,
    pub charger_circuit_id: Option<u32>,
    /// AC line ids.
    pub inverter_ac_id: Option<u32>,
    pub charger_ac_id: Option<u32>,
    /// DC meter instances.
    pub battery_bank_1_id: Option<u32>,
    pub battery_bank_2_id: Option<u32>,
    pub battery_bank_3_id: Option<u32>,
}

impl InverterChargerDevice {
    pub fn battery_banks(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        [
            self.battery_bank_1_id,
            self.battery_bank_2_id,
            self.battery_bank_3_id,
        ]
        .into_iter()
        .enumerate()
        .filter_map(|(i, id)| id.map(|id| (i as u8 + 1, id)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HvacDevice {
    pub instance: u32,
    pub name: String,
    pub fan_speed_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GnssDevice {
    pub instance: u32,
    pub name: String,
    pub is_external: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinaryLogicState {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineDevice {
    pub instance: u32,
    pub name: String,
    pub engine_type: String,
    pub serial_number: String,
}

// ============================================================================
// Relationships
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    #[default]
    Circuit,
    AcLine,
    Dc,
    Tank,
    BinaryLogicState,
    InverterCharger,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipType {
    /// Plain association (tank ↔ pump, AC line ↔ breaker, ...).
    #[default]
    Normal,
    /// Primary item is a parent of the secondary (light groups).
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemRef {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiRelationship {
    pub primary: ItemRef,
    pub secondary: ItemRef,
    pub relationship_type: RelationshipType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_deserialize() {
        let json = r#"{
            "header": {"id": 7, "name": "Demo", "version": "1.2"},
            "circuits": {
                "1": {"id": 1, "controlId": 11, "name": "Cabin Light",
                      "switchType": "DimUp", "remoteVisibility": "LocalAndRemote",
                      "categories": [{"name": "Lighting", "enabled": true}]}
            },
            "ac": {
                "0": {"instance": 0, "name": "Shore",
                      "lines": {"1": {"id": 100, "line": 1, "acType": "ShorePower"}}}
            },
            "uiRelationships": [
                {"primary": {"type": "Tank", "id": 2},
                 "secondary": {"type": "Circuit", "id": 1}}
            ]
        }"#;

        let config: N2kConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.header.id, 7);

        let circuit = config.circuit_by_id(1).unwrap();
        assert_eq!(circuit.control_id, 11);
        assert_eq!(circuit.switch_type, SwitchType::DimUp);
        assert!(circuit.has_category("lighting"));
        assert!(circuit.remote_visibility.is_remote());

        let (meter, line) = config.ac_line_by_id(100).unwrap();
        assert_eq!(meter.name, "Shore");
        assert_eq!(line.ac_type, AcType::ShorePower);

        assert_eq!(
            config.associated(ItemType::Circuit, 1, ItemType::Tank, RelationshipType::Normal),
            vec![2]
        );
    }

    #[test]
    fn test_switch_type_directions() {
        assert!(SwitchType::LatchOn.is_on_only());
        assert!(SwitchType::DimUp.is_on_only());
        assert!(SwitchType::MomentaryOff.is_off_only());
        assert!(!SwitchType::Normal.is_on_only());
        assert!(!SwitchType::Normal.is_off_only());
        assert!(!SwitchType::None.is_controllable());
    }

    #[test]
    fn test_battery_banks() {
        let combi = InverterChargerDevice {
            battery_bank_1_id: Some(4),
            battery_bank_3_id: Some(6),
            ..Default::default()
        };
        assert_eq!(combi.battery_banks().collect::<Vec<_>>(), vec![(1, 4), (3, 6)]);
    }
}
