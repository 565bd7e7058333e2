//! AC meters: shore power and the AC side of inverters and chargers.
//!
//! A meter's role comes from the AC type of its first line. Every role is
//! built through [`build_ac_meter`], which matches exhaustively on
//! [`AcMeterRole`].

use serde_json::Value;

use empower_core::keys::{
    channels, line_channel, DeviceType, STATUS_CONNECTED, STATUS_DISCONNECTED,
};
use empower_core::n2k::{AcMeter, AcType, BinaryLogicState, Circuit};
use empower_core::transform::{combine_latest_all, merge};
use empower_core::{Channel, Stream, Thing, ThingType};

use super::{bind_ac_lines, bind_circuit_enabled};
use crate::error::ConfigBuildError;
use crate::streams::{timestamped, Sources};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcMeterRole {
    ShorePower,
    Inverter,
    Charger,
}

impl AcMeterRole {
    /// Role of a meter by its first line; other AC types are not modelled.
    pub fn classify(meter: &AcMeter) -> Option<Self> {
        match meter.first_line()?.ac_type {
            AcType::ShorePower => Some(AcMeterRole::ShorePower),
            AcType::Inverter => Some(AcMeterRole::Inverter),
            AcType::Charger => Some(AcMeterRole::Charger),
            AcType::Unknown | AcType::Generator | AcType::Outlet => None,
        }
    }

    pub fn thing_type(self) -> ThingType {
        match self {
            AcMeterRole::ShorePower => ThingType::ShorePower,
            AcMeterRole::Inverter => ThingType::AcMeterInverter,
            AcMeterRole::Charger => ThingType::AcMeterCharger,
        }
    }
}

/// Records associated with a meter, resolved by the processor.
#[derive(Default)]
pub struct AcMeterLinks<'c> {
    pub circuit: Option<&'c Circuit>,
    pub binary_logic_state: Option<&'c BinaryLogicState>,
    /// Component status of the combi charger fed by this meter.
    pub combi_status: Option<Stream<Value>>,
}

fn line_numbers(meter: &AcMeter) -> Vec<u8> {
    meter.lines.values().map(|l| l.line).collect()
}

fn is_connected(value: &Value) -> bool {
    value.as_str() == Some(STATUS_CONNECTED)
}

/// OR over the lines that have reported so far. Silent until one has.
fn any_line(lines: Vec<Stream<bool>>) -> Stream<bool> {
    let seeded = lines
        .into_iter()
        .map(|line| merge(vec![Stream::just(None), line.map(Some)]))
        .collect();
    combine_latest_all(seeded).filter_map(|flags: Vec<Option<bool>>| {
        let reported: Vec<bool> = flags.into_iter().flatten().collect();
        (!reported.is_empty()).then(|| reported.contains(&true))
    })
}

fn line_status(meter: &AcMeter, line: u8, sources: &Sources<'_>) -> Stream<bool> {
    sources
        .channel(
            DeviceType::Ac,
            meter.instance,
            &line_channel(channels::COMPONENT_STATUS, line),
        )
        .map(|v| is_connected(&v))
}

/// CONNECTED if any line reports connected, else DISCONNECTED, stamped with
/// the time it was observed.
fn meter_component_status(meter: &AcMeter, sources: &Sources<'_>) -> Stream<Value> {
    let lines = line_numbers(meter)
        .into_iter()
        .map(|n| line_status(meter, n, sources))
        .collect();

    let status = any_line(lines)
        .map(|connected| {
            let status = if connected {
                STATUS_CONNECTED
            } else {
                STATUS_DISCONNECTED
            };
            Value::from(status)
        })
        .distinct_until_changed();
    timestamped(&status)
}

/// Shore power is connected if any present line is. Combi-fed meters judge a
/// line by its component status; other meters by voltage above zero. A linked
/// BLS contributes its inverted state as an alternate source.
fn shore_connected(
    meter: &AcMeter,
    links: &AcMeterLinks<'_>,
    sources: &Sources<'_>,
) -> Stream<Value> {
    let combi = links.combi_status.is_some();
    let per_line = line_numbers(meter)
        .into_iter()
        .map(|n| {
            if combi {
                line_status(meter, n, sources)
            } else {
                sources
                    .channel(
                        DeviceType::Ac,
                        meter.instance,
                        &line_channel(channels::VOLTAGE, n),
                    )
                    .filter_map(|v| v.as_f64().map(|volts| volts > 0.0))
            }
        })
        .collect();

    let mut sources_list = vec![any_line(per_line).map(Value::Bool)];
    if let Some(bls) = links.binary_logic_state {
        sources_list.push(
            sources
                .channel(DeviceType::BinaryLogicState, bls.id, channels::STATE)
                .invert_bool(),
        );
    }
    merge(sources_list).distinct_until_changed()
}

pub fn build_ac_meter(
    meter: &AcMeter,
    role: AcMeterRole,
    links: &AcMeterLinks<'_>,
    sources: &Sources<'_>,
) -> Result<Thing, ConfigBuildError> {
    let mut thing = Thing::new(role.thing_type(), meter.instance, meter.name.clone());
    thing.set_metadata("lineCount", meter.lines.len() as u64);
    bind_ac_lines(&mut thing, meter, sources)?;

    let status = Channel::string("componentStatus", "Component Status");
    match role {
        AcMeterRole::ShorePower => {
            thing.bind(
                Channel::boolean("connected", "Connected"),
                shore_connected(meter, links, sources),
            )?;
            match &links.combi_status {
                Some(charger_status) => thing.bind(status, charger_status.clone())?,
                None => thing.bind(status, meter_component_status(meter, sources))?,
            };
        }
        AcMeterRole::Inverter | AcMeterRole::Charger => {
            thing.bind(status, meter_component_status(meter, sources))?;
        }
    }

    if let Some(circuit) = links.circuit {
        bind_circuit_enabled(&mut thing, circuit, sources)?;
    }
    if let Some(bls) = links.binary_logic_state {
        thing.set_metadata("binaryLogicStateId", bls.id);
    }
    Ok(thing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::config::EmpowerSettings;
    use empower_core::n2k::AcLine;
    use empower_core::{ChannelStore, ManualTicker, MemoryChannelStore};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn meter(ac_type: AcType) -> AcMeter {
        let lines: BTreeMap<u8, AcLine> = (1..=3)
            .map(|n| {
                (
                    n,
                    AcLine {
                        id: 200 + n as u32,
                        line: n,
                        ac_type,
                        name: format!("L{}", n),
                    },
                )
            })
            .collect();
        AcMeter {
            instance: 4,
            name: "Shore".into(),
            lines,
        }
    }

    #[test]
    fn test_classify_by_first_line() {
        assert_eq!(
            AcMeterRole::classify(&meter(AcType::ShorePower)),
            Some(AcMeterRole::ShorePower)
        );
        assert_eq!(
            AcMeterRole::classify(&meter(AcType::Charger)),
            Some(AcMeterRole::Charger)
        );
        assert_eq!(AcMeterRole::classify(&meter(AcType::Generator)), None);
        assert_eq!(AcMeterRole::classify(&AcMeter::default()), None);
    }

    #[test]
    fn test_non_combi_component_status() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let mut thing = build_ac_meter(
            &meter(AcType::Inverter),
            AcMeterRole::Inverter,
            &AcMeterLinks::default(),
            &sources,
        )
        .unwrap();
        thing.activate(&store);

        store.update_channel("AC.4", "ComponentStatus.1", json!("Disconnected"));
        store.update_channel("AC.4", "ComponentStatus.2", json!("Connected"));
        store.update_channel("AC.4", "ComponentStatus.3", json!("Disconnected"));

        let status = store.mobile_value("acMeterInverter.4.componentStatus").unwrap();
        assert_eq!(status["value"], json!("Connected"));
    }

    #[test]
    fn test_bls_inverted_and_merged() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);
        let bls = BinaryLogicState { id: 9, name: "Shore Lock".into() };
        let links = AcMeterLinks {
            binary_logic_state: Some(&bls),
            ..Default::default()
        };

        let mut thing = build_ac_meter(
            &meter(AcType::ShorePower),
            AcMeterRole::ShorePower,
            &links,
            &sources,
        )
        .unwrap();
        thing.activate(&store);

        for n in 1..=3 {
            store.update_channel("AC.4", &format!("Voltage.{}", n), json!(0.0));
        }
        assert_eq!(store.mobile_value("shorePower.4.connected"), Some(json!(false)));

        store.update_channel("BinaryLogicState.9", "State", json!(false));
        assert_eq!(store.mobile_value("shorePower.4.connected"), Some(json!(true)));
    }

    #[test]
    fn test_partial_lines_decide_connected() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let mut thing = build_ac_meter(
            &meter(AcType::ShorePower),
            AcMeterRole::ShorePower,
            &AcMeterLinks::default(),
            &sources,
        )
        .unwrap();
        thing.activate(&store);
        assert_eq!(store.mobile_value("shorePower.4.connected"), None);

        store.update_channel("AC.4", "Voltage.1", json!(230.0));
        assert_eq!(store.mobile_value("shorePower.4.connected"), Some(json!(true)));

        store.update_channel("AC.4", "Voltage.1", json!(0.0));
        assert_eq!(store.mobile_value("shorePower.4.connected"), Some(json!(false)));
    }

    #[test]
    fn test_partial_lines_decide_component_status() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let mut thing = build_ac_meter(
            &meter(AcType::Charger),
            AcMeterRole::Charger,
            &AcMeterLinks::default(),
            &sources,
        )
        .unwrap();
        thing.activate(&store);

        store.update_channel("AC.4", "ComponentStatus.2", json!("Connected"));
        let status = store.mobile_value("acMeterCharger.4.componentStatus").unwrap();
        assert_eq!(status["value"], json!("Connected"));
    }
}
