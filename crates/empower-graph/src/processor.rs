//! Config processor: resolves an N2K configuration into an [`EmpowerSystem`].
//!
//! Phases run in a fixed order and later phases consult what earlier ones
//! claimed:
//!
//! 1. hubs
//! 2. inverter/chargers (claim AC meter, DC banks, circuits)
//! 3. standalone DC meters
//! 4. GNSS
//! 5. AC meters
//! 6. tanks and their pumps
//! 7. HVAC
//! 8. remaining remote-visible circuits
//! 9. assembly
//!
//! Any error aborts the whole build. Nothing is subscribed until the caller
//! activates the returned system.

use std::sync::Arc;
use tracing::{debug, info, warn};

use empower_core::config::EmpowerSettings;
use empower_core::n2k::{
    Circuit, EngineConfiguration, ItemType, N2kConfiguration, RelationshipType,
};
use empower_core::stream::Ticker;
use empower_core::{ChannelStore, EmpowerSystem, EngineList, Thing};

use crate::context::BuildContext;
use crate::error::ConfigBuildError;
use crate::streams::Sources;
use crate::things::ac_meter::{build_ac_meter, AcMeterLinks, AcMeterRole};
use crate::things::battery::{battery_roles, build_battery};
use crate::things::circuit::{build_circuit, child_links, is_emitted, CircuitKind};
use crate::things::climate::build_climate;
use crate::things::engine::build_engine;
use crate::things::gnss::build_gnss;
use crate::things::hub::build_hub;
use crate::things::inverter_charger::build_inverter_charger;
use crate::things::tank::{build_tank, link_pump};

/// Builds Thing graphs against one channel store.
pub struct ConfigProcessor {
    store: Arc<dyn ChannelStore>,
    ticker: Arc<dyn Ticker>,
    settings: EmpowerSettings,
}

impl ConfigProcessor {
    pub fn new(
        store: Arc<dyn ChannelStore>,
        ticker: Arc<dyn Ticker>,
        settings: EmpowerSettings,
    ) -> Self {
        Self {
            store,
            ticker,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChannelStore> {
        &self.store
    }

    pub fn settings(&self) -> &EmpowerSettings {
        &self.settings
    }

    /// Build the main system. The store is only read.
    pub fn build(&self, config: &N2kConfiguration) -> Result<EmpowerSystem, ConfigBuildError> {
        let sources = Sources::new(self.store.as_ref(), &self.settings, self.ticker.as_ref());
        let mut ctx = BuildContext::new();
        let mut things = Vec::new();

        build_hubs(config, &sources, &mut things)?;
        build_inverter_chargers(config, &sources, &mut ctx, &mut things)?;
        build_batteries(config, &sources, &mut ctx, &mut things)?;
        for device in config.gnss.values() {
            things.push(build_gnss(device, &sources)?);
        }
        build_ac_meters(config, &sources, &mut ctx, &mut things)?;
        build_tanks(config, &sources, &mut ctx, &mut things)?;
        for hvac in config.hvacs.values() {
            things.push(build_climate(hvac, &sources)?);
        }
        build_circuits(config, &sources, &ctx, &mut things)?;

        self.check_populated(&sources)?;

        let mut system = EmpowerSystem::new(config.header.clone());
        for thing in things {
            system.add_thing(thing)?;
        }
        info!(
            "Built system '{}' (config {}) with {} things",
            config.header.name,
            config.header.id,
            system.len()
        );
        Ok(system)
    }

    /// Build the engine list. Independent of the main system.
    pub fn build_engine_list(
        &self,
        config: &EngineConfiguration,
    ) -> Result<EngineList, ConfigBuildError> {
        let sources = Sources::new(self.store.as_ref(), &self.settings, self.ticker.as_ref());
        let mut engines = Vec::new();
        for engine in config.engines.values() {
            engines.push(build_engine(engine, &sources)?);
        }

        self.check_populated(&sources)?;

        let mut list = EngineList::new();
        for engine in engines {
            list.add_thing(engine)?;
        }
        info!("Built engine list with {} engines", list.len());
        Ok(list)
    }

    fn check_populated(&self, sources: &Sources<'_>) -> Result<(), ConfigBuildError> {
        if !self.settings.strict_channels {
            return Ok(());
        }
        let missing = sources.unpopulated();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigBuildError::UnpopulatedChannels(missing))
        }
    }
}

// ============================================================================
// Phases
// ============================================================================

/// First circuit associated with `(item_type, id)`, if it exists.
fn associated_circuit(
    config: &N2kConfiguration,
    item_type: ItemType,
    id: u32,
) -> Option<&Circuit> {
    let circuit_id = *config
        .associated(item_type, id, ItemType::Circuit, RelationshipType::Normal)
        .first()?;
    let circuit = config.circuit_by_id(circuit_id);
    if circuit.is_none() {
        warn!("{:?} {} is associated with missing circuit {}", item_type, id, circuit_id);
    }
    circuit
}

fn build_hubs(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    for device in config.devices.values().filter(|d| d.class.is_hub()) {
        things.push(build_hub(device, sources)?);
    }
    Ok(())
}

fn build_inverter_chargers(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &mut BuildContext,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    for combi in config.inverter_chargers.values() {
        let built = build_inverter_charger(combi, config, sources, ctx)?;
        things.push(built.inverter);
        things.push(built.charger);
    }
    debug!("Built {} inverter/chargers", config.inverter_chargers.len());
    Ok(())
}

fn build_batteries(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &mut BuildContext,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    let standalone: Vec<_> = config
        .dc
        .values()
        .filter(|dc| {
            let claimed = ctx.is_dc_claimed(dc.instance);
            if claimed {
                debug!("Skipping DC meter {}: claimed by a charger", dc.instance);
            }
            !claimed
        })
        .collect();

    let roles = battery_roles(&config.display, |id| {
        standalone.iter().any(|dc| dc.instance == id)
    });

    for dc in standalone {
        let battery_switch = associated_circuit(config, ItemType::Dc, dc.instance);
        if let Some(circuit) = battery_switch {
            ctx.claim_circuit(circuit.id);
        }
        let role = roles
            .iter()
            .find(|(id, _)| *id == dc.instance)
            .map(|(_, role)| *role);
        things.push(build_battery(dc, battery_switch, role, sources)?);
    }
    Ok(())
}

fn build_ac_meters(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &mut BuildContext,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    for meter in config.ac.values() {
        if ctx.is_ac_claimed(meter.instance) {
            debug!("Skipping AC meter {}: claimed by an inverter", meter.instance);
            continue;
        }
        let (Some(role), Some(first)) = (AcMeterRole::classify(meter), meter.first_line()) else {
            debug!("Skipping AC meter {}: unsupported AC type", meter.instance);
            continue;
        };

        let binary_logic_state = config
            .associated(
                ItemType::AcLine,
                first.id,
                ItemType::BinaryLogicState,
                RelationshipType::Normal,
            )
            .first()
            .and_then(|id| {
                let bls = config.binary_logic_state_by_id(*id);
                if bls.is_none() {
                    warn!("AC line {} is associated with missing BLS {}", first.id, id);
                }
                bls
            });
        let links = AcMeterLinks {
            circuit: associated_circuit(config, ItemType::AcLine, first.id),
            binary_logic_state,
            combi_status: ctx.charger_status(meter.instance).cloned(),
        };

        things.push(build_ac_meter(meter, role, &links, sources)?);
        ctx.claim_ac(meter.instance);
        if let Some(circuit) = links.circuit {
            ctx.claim_circuit(circuit.id);
        }
    }
    Ok(())
}

fn build_tanks(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &mut BuildContext,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    for tank in config.tanks.values() {
        let mut tank_thing = build_tank(tank, sources)?;

        let pump = if tank.tank_type.is_water() {
            associated_circuit(config, ItemType::Tank, tank.instance)
                .filter(|circuit| !ctx.is_circuit_claimed(circuit.id))
        } else {
            None
        };

        match pump {
            Some(circuit) => {
                let mut pump_thing = build_circuit(circuit, CircuitKind::WaterPump, sources)?;
                link_pump(&mut tank_thing, &mut pump_thing);
                ctx.claim_circuit(circuit.id);
                things.push(tank_thing);
                things.push(pump_thing);
            }
            None => things.push(tank_thing),
        }
    }
    Ok(())
}

fn build_circuits(
    config: &N2kConfiguration,
    sources: &Sources<'_>,
    ctx: &BuildContext,
    things: &mut Vec<Thing>,
) -> Result<(), ConfigBuildError> {
    for circuit in config.circuits.values() {
        if !is_emitted(circuit, ctx) {
            debug!("Skipping circuit {}: claimed or not remote", circuit.id);
            continue;
        }

        let kind = CircuitKind::of(circuit);
        let mut thing = build_circuit(circuit, kind, sources)?;
        if kind == CircuitKind::Light {
            for link in child_links(config, circuit, ctx) {
                thing.add_link(link);
            }
        }
        things.push(thing);
    }
    Ok(())
}
