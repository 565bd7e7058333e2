//! Graph host: owns the active graph and swaps it atomically on reload.
//!
//! Rebuilds are serialized by one mutex. A new graph is built completely
//! before anything is torn down; only once it succeeds is the previous graph
//! disposed and the new one activated, so a failed reload leaves the old
//! graph feeding the mobile projection.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

use empower_core::n2k::{EngineConfiguration, N2kConfiguration};
use empower_core::{ChannelStore, EmpowerSystem, EngineList};

use crate::error::ConfigBuildError;
use crate::processor::ConfigProcessor;

#[derive(Default)]
struct HostState {
    system: Option<EmpowerSystem>,
    engines: Option<EngineList>,
}

impl Drop for HostState {
    fn drop(&mut self) {
        if let Some(system) = self.system.as_mut() {
            system.dispose();
        }
        if let Some(engines) = self.engines.as_mut() {
            engines.dispose();
        }
    }
}

pub struct GraphHost {
    processor: ConfigProcessor,
    state: Mutex<HostState>,
}

impl GraphHost {
    pub fn new(processor: ConfigProcessor) -> Self {
        Self {
            processor,
            state: Mutex::new(HostState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn store(&self) -> &Arc<dyn ChannelStore> {
        self.processor.store()
    }

    /// Build `config` and make it the active system. Returns the number of
    /// Things now active.
    pub fn load_config(&self, config: &N2kConfiguration) -> Result<usize, ConfigBuildError> {
        let mut state = self.state();

        let mut system = self.processor.build(config).map_err(|e| {
            error!("Failed to build system, keeping previous graph: {}", e);
            e
        })?;

        if let Some(mut previous) = state.system.take() {
            previous.dispose();
        }
        system.activate(self.store().as_ref());
        let count = system.len();
        state.system = Some(system);

        info!("Activated system with {} things", count);
        Ok(count)
    }

    /// Build `config` and replace the engine list. The engine partition of
    /// the store is cleared between the old and the new list; the main
    /// system is not touched.
    pub fn load_engines(&self, config: &EngineConfiguration) -> Result<usize, ConfigBuildError> {
        let mut state = self.state();

        let mut engines = self.processor.build_engine_list(config).map_err(|e| {
            error!("Failed to build engine list, keeping previous engines: {}", e);
            e
        })?;

        if let Some(mut previous) = state.engines.take() {
            previous.dispose();
        }
        self.store().dispose_devices(true);
        engines.activate(self.store().as_ref());
        let count = engines.len();
        state.engines = Some(engines);

        info!("Activated {} engines", count);
        Ok(count)
    }

    /// Run `f` against the active system.
    pub fn with_system<R>(&self, f: impl FnOnce(Option<&EmpowerSystem>) -> R) -> R {
        f(self.state().system.as_ref())
    }

    pub fn with_engines<R>(&self, f: impl FnOnce(Option<&EngineList>) -> R) -> R {
        f(self.state().engines.as_ref())
    }

    pub fn system_json(&self) -> Option<Value> {
        self.with_system(|system| system.and_then(|s| serde_json::to_value(s).ok()))
    }

    pub fn engines_json(&self) -> Option<Value> {
        self.with_engines(|engines| engines.and_then(|e| serde_json::to_value(e).ok()))
    }

    /// Dispose both graphs and clear the store.
    pub fn shutdown(&self) {
        let mut state = self.state();
        if let Some(mut system) = state.system.take() {
            system.dispose();
        }
        if let Some(mut engines) = state.engines.take() {
            engines.dispose();
        }
        self.store().dispose();
        info!("Graph host shut down");
    }
}
