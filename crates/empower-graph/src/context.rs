//! Per-build accumulation state.
//!
//! Earlier phases claim physical meter instances and circuits so later phases
//! skip them. A fresh context is created for every build.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use empower_core::n2k::{Circuit, N2kConfiguration};
use empower_core::Stream;

#[derive(Default)]
pub struct BuildContext {
    claimed_ac: BTreeSet<u32>,
    claimed_dc: BTreeSet<u32>,
    claimed_circuits: BTreeSet<u32>,
    /// Charger component-status streams keyed by shore-power AC-meter instance.
    charger_status: BTreeMap<u32, Stream<Value>>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_ac(&mut self, instance: u32) {
        self.claimed_ac.insert(instance);
    }

    pub fn claim_dc(&mut self, instance: u32) {
        self.claimed_dc.insert(instance);
    }

    pub fn claim_circuit(&mut self, id: u32) {
        self.claimed_circuits.insert(id);
    }

    pub fn is_ac_claimed(&self, instance: u32) -> bool {
        self.claimed_ac.contains(&instance)
    }

    pub fn is_dc_claimed(&self, instance: u32) -> bool {
        self.claimed_dc.contains(&instance)
    }

    pub fn is_circuit_claimed(&self, id: u32) -> bool {
        self.claimed_circuits.contains(&id)
    }

    pub fn record_charger_status(&mut self, ac_instance: u32, stream: Stream<Value>) {
        self.charger_status.insert(ac_instance, stream);
    }

    pub fn charger_status(&self, ac_instance: u32) -> Option<&Stream<Value>> {
        self.charger_status.get(&ac_instance)
    }
}

/// Resolve a hidden circuit id to `(hidden, control)`. The control circuit
/// is the one whose id equals the hidden circuit's control id; without one
/// the hidden circuit controls itself.
pub fn resolve_control_circuit(
    config: &N2kConfiguration,
    hidden_id: u32,
) -> Option<(&Circuit, &Circuit)> {
    let hidden = config.circuit_by_id(hidden_id)?;
    let control = config.circuit_by_id(hidden.control_id).unwrap_or(hidden);
    Some((hidden, control))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit(id: u32, control_id: u32) -> Circuit {
        Circuit {
            id,
            control_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_control_circuit() {
        let mut config = N2kConfiguration::default();
        config.circuits.insert("a".into(), circuit(50, 7));
        config.circuits.insert("b".into(), circuit(7, 70));
        config.circuits.insert("c".into(), circuit(60, 99));

        let (hidden, control) = resolve_control_circuit(&config, 50).unwrap();
        assert_eq!((hidden.id, control.id), (50, 7));

        let (hidden, control) = resolve_control_circuit(&config, 60).unwrap();
        assert_eq!((hidden.id, control.id), (60, 60));

        assert!(resolve_control_circuit(&config, 1).is_none());
    }

    #[test]
    fn test_claims() {
        let mut ctx = BuildContext::new();
        ctx.claim_dc(2);
        ctx.claim_circuit(9);
        assert!(ctx.is_dc_claimed(2));
        assert!(!ctx.is_ac_claimed(2));
        assert!(ctx.is_circuit_claimed(9));
    }
}
