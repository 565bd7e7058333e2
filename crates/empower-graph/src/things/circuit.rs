//! Switched circuits: lights, pumps and generic power switches.

use tracing::{debug, warn};

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::{Circuit, ItemType, N2kConfiguration};
use empower_core::{Channel, Link, Thing, ThingType, Unit};

use super::enum_name;
use crate::context::BuildContext;
use crate::error::ConfigBuildError;
use crate::streams::Sources;

/// Thing variant a circuit becomes, chosen by its categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitKind {
    Light,
    BilgePump,
    WaterPump,
    GenericPowerSwitch,
}

impl CircuitKind {
    pub fn of(circuit: &Circuit) -> Self {
        if circuit.has_category("Lighting") {
            CircuitKind::Light
        } else if circuit.has_category("Bilge Pumps") {
            CircuitKind::BilgePump
        } else if circuit.has_category("Water Pumps") {
            CircuitKind::WaterPump
        } else {
            CircuitKind::GenericPowerSwitch
        }
    }

    pub fn thing_type(self) -> ThingType {
        match self {
            CircuitKind::Light => ThingType::Light,
            CircuitKind::BilgePump => ThingType::BilgePump,
            CircuitKind::WaterPump => ThingType::WaterPump,
            CircuitKind::GenericPowerSwitch => ThingType::GenericPowerSwitch,
        }
    }
}

/// Id of the Thing a circuit is built into by the circuit phase.
pub fn circuit_thing_id(circuit: &Circuit) -> String {
    CircuitKind::of(circuit).thing_type().thing_id(circuit.id)
}

pub fn build_circuit(
    circuit: &Circuit,
    kind: CircuitKind,
    sources: &Sources<'_>,
) -> Result<Thing, ConfigBuildError> {
    let mut thing = Thing::new(kind.thing_type(), circuit.id, circuit.name.clone());
    thing.set_metadata("circuitId", circuit.control_id);
    thing.set_metadata("switchType", enum_name(&circuit.switch_type));
    thing.set_metadata("hasComplement", circuit.has_complement);
    for category in circuit.category_names() {
        thing.add_category(category);
    }

    let read_only = !circuit.switch_type.is_controllable();
    let id = circuit.control_id;

    thing.bind(
        Channel::boolean("power", "Power").read_only(read_only),
        sources.circuit_on(id),
    )?;
    if circuit.dimmable {
        thing.bind(
            Channel::number("level", "Level", Unit::Percent).read_only(read_only),
            sources.percent(DeviceType::Circuit, id, channels::LEVEL),
        )?;
    }
    thing.bind(
        Channel::number("current", "Current", Unit::Amps),
        sources.numeric(DeviceType::Circuit, id, channels::CURRENT, Quantity::Current),
    )?;
    thing.bind(
        Channel::string("componentStatus", "Component Status"),
        sources.discrete(DeviceType::Circuit, id, channels::COMPONENT_STATUS),
    )?;

    Ok(thing)
}

/// Whether the circuit phase builds `circuit` into a Thing of its own.
pub fn is_emitted(circuit: &Circuit, ctx: &BuildContext) -> bool {
    circuit.remote_visibility.is_remote() && !ctx.is_circuit_claimed(circuit.id)
}

/// Links from a light to the circuits grouped under it. Children that do
/// not become Things of their own are skipped.
pub fn child_links(config: &N2kConfiguration, light: &Circuit, ctx: &BuildContext) -> Vec<Link> {
    config
        .children(ItemType::Circuit, light.id, ItemType::Circuit)
        .into_iter()
        .filter_map(|child_id| match config.circuit_by_id(child_id) {
            Some(child) if is_emitted(child, ctx) => {
                Some(Link::new(circuit_thing_id(child), &["empower:light.child"]))
            }
            Some(_) => {
                debug!("Light {} child circuit {} has no Thing", light.id, child_id);
                None
            }
            None => {
                warn!("Light {} lists missing child circuit {}", light.id, child_id);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::n2k::{
        CategoryItem, ItemRef, RelationshipType, RemoteVisibility, SwitchType, UiRelationship,
    };
    use empower_core::{ChannelStore, ManualTicker, MemoryChannelStore};
    use empower_core::config::EmpowerSettings;

    fn circuit(id: u32, category: &str) -> Circuit {
        Circuit {
            id,
            control_id: id + 100,
            name: format!("Circuit {}", id),
            switch_type: SwitchType::Normal,
            categories: vec![CategoryItem {
                name: category.to_string(),
                enabled: true,
            }],
            remote_visibility: RemoteVisibility::LocalAndRemote,
            ..Default::default()
        }
    }

    #[test]
    fn test_category_dispatch() {
        assert_eq!(CircuitKind::of(&circuit(1, "Lighting")), CircuitKind::Light);
        assert_eq!(CircuitKind::of(&circuit(1, "Bilge Pumps")), CircuitKind::BilgePump);
        assert_eq!(CircuitKind::of(&circuit(1, "Water Pumps")), CircuitKind::WaterPump);
        assert_eq!(CircuitKind::of(&circuit(1, "Galley")), CircuitKind::GenericPowerSwitch);

        let mut disabled = circuit(1, "Lighting");
        disabled.categories[0].enabled = false;
        assert_eq!(CircuitKind::of(&disabled), CircuitKind::GenericPowerSwitch);
    }

    #[test]
    fn test_build_uses_control_id() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let mut lamp = circuit(4, "Lighting");
        lamp.dimmable = true;
        let mut thing = build_circuit(&lamp, CircuitKind::Light, &sources).unwrap();
        assert_eq!(thing.id, "light.4");
        assert!(!thing.channel("power").unwrap().read_only);
        assert!(thing.channel("level").is_some());

        thing.activate(&store);
        store.update_channel("Circuit.104", "Level", serde_json::json!(80));
        assert_eq!(store.mobile_value("light.4.power"), Some(serde_json::json!(true)));
        assert_eq!(store.mobile_value("light.4.level"), Some(serde_json::json!(80.0)));
    }

    #[test]
    fn test_switchless_circuit_is_read_only() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let mut fixed = circuit(5, "Galley");
        fixed.switch_type = SwitchType::None;
        let thing = build_circuit(&fixed, CircuitKind::GenericPowerSwitch, &sources).unwrap();
        assert!(thing.channel("power").unwrap().read_only);
    }

    fn light_with_children(children: &[u32], config: &mut N2kConfiguration) {
        config.circuits.insert("1".into(), circuit(1, "Lighting"));
        for child in children {
            config.ui_relationships.push(UiRelationship {
                primary: ItemRef { item_type: ItemType::Circuit, id: 1 },
                secondary: ItemRef { item_type: ItemType::Circuit, id: *child },
                relationship_type: RelationshipType::Child,
            });
        }
    }

    #[test]
    fn test_child_links() {
        let mut config = N2kConfiguration::default();
        config.circuits.insert("2".into(), circuit(2, "Lighting"));
        light_with_children(&[2, 3], &mut config);

        let light = config.circuit_by_id(1).unwrap();
        assert_eq!(
            child_links(&config, light, &BuildContext::new()),
            vec![Link::new("light.2", &["empower:light.child"])]
        );
    }

    #[test]
    fn test_child_links_skip_circuits_without_things() {
        let mut config = N2kConfiguration::default();
        let mut local = circuit(2, "Lighting");
        local.remote_visibility = RemoteVisibility::LocalOnly;
        config.circuits.insert("2".into(), local);
        config.circuits.insert("3".into(), circuit(3, "Lighting"));
        config.circuits.insert("4".into(), circuit(4, "Lighting"));
        light_with_children(&[2, 3, 4], &mut config);

        let mut ctx = BuildContext::new();
        ctx.claim_circuit(3);

        let light = config.circuit_by_id(1).unwrap();
        assert_eq!(
            child_links(&config, light, &ctx),
            vec![Link::new("light.4", &["empower:light.child"])]
        );
    }
}
