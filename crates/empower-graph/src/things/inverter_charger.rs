//! Combi inverter/chargers.
//!
//! One physical combi becomes an Inverter Thing and a Charger Thing linked to
//! each other. The inverter carries its AC output lines, the charger carries
//! up to three battery banks. Everything referenced is claimed so the later
//! DC, AC and circuit phases skip it.

use serde_json::Value;
use tracing::debug;

use empower_core::config::Quantity;
use empower_core::keys::{channels, DeviceType};
use empower_core::n2k::{AcType, Circuit, InverterChargerDevice, N2kConfiguration};
use empower_core::transform::merge;
use empower_core::{Channel, Link, Stream, Thing, ThingType, Unit};

use super::bind_ac_lines;
use crate::context::{resolve_control_circuit, BuildContext};
use crate::error::ConfigBuildError;
use crate::streams::Sources;

pub struct CombiThings {
    pub inverter: Thing,
    pub charger: Thing,
}

fn record_name(combi: &InverterChargerDevice) -> String {
    format!("inverter/charger {}", combi.instance)
}

/// Resolve a hidden circuit reference and claim both circuits.
fn claim_control_circuit<'c>(
    config: &'c N2kConfiguration,
    combi: &InverterChargerDevice,
    hidden_id: Option<u32>,
    ctx: &mut BuildContext,
) -> Result<Option<&'c Circuit>, ConfigBuildError> {
    let Some(hidden_id) = hidden_id else {
        return Ok(None);
    };
    let (hidden, control) = resolve_control_circuit(config, hidden_id).ok_or_else(|| {
        ConfigBuildError::unresolved(record_name(combi), format!("circuit {}", hidden_id))
    })?;
    ctx.claim_circuit(hidden.id);
    ctx.claim_circuit(control.id);
    Ok(Some(control))
}

/// `enabled`: the control circuit's level and the device-reported enable
/// flag, merged last-value-wins.
fn bind_enabled(
    thing: &mut Thing,
    control: Option<&Circuit>,
    combi: &InverterChargerDevice,
    enable_key: &str,
    sources: &Sources<'_>,
) -> Result<(), ConfigBuildError> {
    let mut streams = vec![sources
        .channel(DeviceType::InverterCharger, combi.instance, enable_key)
        .as_bool()];
    if let Some(circuit) = control {
        thing.set_metadata("circuitId", circuit.control_id);
        streams.insert(0, sources.circuit_level(circuit.control_id).level_on());
    }
    let writable = control.is_some_and(|c| c.switch_type.is_controllable());

    thing.bind(
        Channel::boolean("enabled", "Enabled").read_only(!writable),
        merge(streams).distinct_until_changed(),
    )?;
    Ok(())
}

pub fn build_inverter_charger(
    combi: &InverterChargerDevice,
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &mut BuildContext,
) -> Result<CombiThings, ConfigBuildError> {
    let id = combi.instance;
    let mut inverter = Thing::new(ThingType::Inverter, combi.inverter_instance, combi.name.clone());
    let mut charger = Thing::new(ThingType::Charger, combi.charger_instance, combi.name.clone());
    for thing in [&mut inverter, &mut charger] {
        thing.set_metadata("combiInstance", id);
        thing.set_metadata("model", combi.model.clone());
    }

    // Inverter
    let inverter_circuit = claim_control_circuit(config, combi, combi.inverter_circuit_id, ctx)?;
    bind_enabled(&mut inverter, inverter_circuit, combi, channels::INVERTER_ENABLE, sources)?;
    inverter.bind(
        Channel::string("state", "State"),
        sources.discrete(DeviceType::InverterCharger, id, channels::INVERTER_STATE),
    )?;
    inverter.bind(
        Channel::string("componentStatus", "Component Status"),
        sources.discrete(DeviceType::InverterCharger, id, channels::INVERTER_COMPONENT_STATUS),
    )?;

    if let Some(line_id) = combi.inverter_ac_id {
        let (meter, _) = config.ac_line_by_id(line_id).ok_or_else(|| {
            ConfigBuildError::unresolved(record_name(combi), format!("AC line {}", line_id))
        })?;
        bind_ac_lines(&mut inverter, meter, sources)?;
        inverter.set_metadata("acInstance", meter.instance);
        ctx.claim_ac(meter.instance);
        debug!("Inverter {} claims AC meter {}", inverter.id, meter.instance);
    }

    // Charger
    let charger_circuit = claim_control_circuit(config, combi, combi.charger_circuit_id, ctx)?;
    bind_enabled(&mut charger, charger_circuit, combi, channels::CHARGER_ENABLE, sources)?;
    charger.bind(
        Channel::string("state", "State"),
        sources.discrete(DeviceType::InverterCharger, id, channels::CHARGER_STATE),
    )?;
    let charger_status: Stream<Value> =
        sources.discrete(DeviceType::InverterCharger, id, channels::CHARGER_COMPONENT_STATUS);
    charger.bind(
        Channel::string("componentStatus", "Component Status"),
        charger_status.clone(),
    )?;

    for (bank, instance) in combi.battery_banks() {
        let dc = config.dc_by_instance(instance).ok_or_else(|| {
            ConfigBuildError::unresolved(record_name(combi), format!("DC meter {}", instance))
        })?;
        charger.set_metadata(format!("battery{}Name", bank), dc.name.clone());
        charger.set_metadata(format!("battery{}Instance", bank), instance);
        charger.bind(
            Channel::number(
                format!("battery{}Voltage", bank),
                format!("Battery {} Voltage", bank),
                Unit::Volts,
            ),
            sources.numeric(DeviceType::Dc, instance, channels::VOLTAGE, Quantity::Voltage),
        )?;
        charger.bind(
            Channel::number(
                format!("battery{}Current", bank),
                format!("Battery {} Current", bank),
                Unit::Amps,
            ),
            sources.numeric(DeviceType::Dc, instance, channels::CURRENT, Quantity::Current),
        )?;
        charger.bind(
            Channel::number(
                format!("battery{}StateOfCharge", bank),
                format!("Battery {} State of Charge", bank),
                Unit::Percent,
            ),
            sources.percent(DeviceType::Dc, instance, channels::STATE_OF_CHARGE),
        )?;
        ctx.claim_dc(instance);
        debug!("Charger {} claims DC meter {}", charger.id, instance);
    }

    if let Some(line_id) = combi.charger_ac_id {
        let (meter, line) = config.ac_line_by_id(line_id).ok_or_else(|| {
            ConfigBuildError::unresolved(record_name(combi), format!("AC line {}", line_id))
        })?;
        charger.set_metadata("acInstance", meter.instance);
        if line.ac_type == AcType::ShorePower {
            ctx.record_charger_status(meter.instance, charger_status);
        }
    }

    inverter.add_link(Link::new(charger.id.clone(), &["empower:combi.charger"]));
    charger.add_link(Link::new(inverter.id.clone(), &["empower:combi.inverter"]));

    Ok(CombiThings { inverter, charger })
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::config::EmpowerSettings;
    use empower_core::n2k::{AcLine, AcMeter};
    use empower_core::{ManualTicker, MemoryChannelStore};

    /// Meter 0: line 1 is a charger line (id 10), line 2 shore power (id 11).
    fn mixed_config(charger_ac_id: u32) -> N2kConfiguration {
        let mut config = N2kConfiguration::default();
        let lines = [(1, 10, AcType::Charger), (2, 11, AcType::ShorePower)]
            .into_iter()
            .map(|(line, id, ac_type)| {
                let ac_line = AcLine {
                    id,
                    line,
                    ac_type,
                    name: format!("L{}", line),
                };
                (line, ac_line)
            })
            .collect();
        config.ac.insert(
            "0".into(),
            AcMeter {
                instance: 0,
                name: "Mixed".into(),
                lines,
            },
        );
        config.inverter_chargers.insert(
            "0".into(),
            InverterChargerDevice {
                name: "Combi".into(),
                charger_ac_id: Some(charger_ac_id),
                ..Default::default()
            },
        );
        config
    }

    fn charger_status_recorded(config: &N2kConfiguration) -> bool {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);
        let mut ctx = BuildContext::new();

        let combi = config.inverter_chargers.get("0").unwrap();
        let built = build_inverter_charger(combi, config, &sources, &mut ctx).unwrap();
        assert_eq!(built.charger.metadata.get("acInstance"), Some(&serde_json::json!(0)));
        ctx.charger_status(0).is_some()
    }

    #[test]
    fn test_shore_feed_follows_matched_line() {
        assert!(charger_status_recorded(&mixed_config(11)));
        assert!(!charger_status_recorded(&mixed_config(10)));
    }
}
