//! Stream sources used while building Things.
//!
//! [`Sources`] wraps the channel store with the build's settings and ticker,
//! and remembers every device channel looked up so strict mode can report the
//! ones that were never populated.

use chrono::Utc;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeSet;

use empower_core::config::{EmpowerSettings, Quantity};
use empower_core::keys::{channels, device_key, DeviceType};
use empower_core::stream::{Stream, Ticker};
use empower_core::ChannelStore;

pub struct Sources<'a> {
    store: &'a dyn ChannelStore,
    settings: &'a EmpowerSettings,
    ticker: &'a dyn Ticker,
    looked_up: RefCell<BTreeSet<(String, String)>>,
}

impl<'a> Sources<'a> {
    pub fn new(
        store: &'a dyn ChannelStore,
        settings: &'a EmpowerSettings,
        ticker: &'a dyn Ticker,
    ) -> Self {
        Self {
            store,
            settings,
            ticker,
            looked_up: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn settings(&self) -> &EmpowerSettings {
        self.settings
    }

    pub fn ticker(&self) -> &dyn Ticker {
        self.ticker
    }

    /// Raw stream of one device channel.
    pub fn channel(&self, device_type: DeviceType, id: u32, channel_key: &str) -> Stream<Value> {
        let key = device_key(device_type, id);
        self.looked_up
            .borrow_mut()
            .insert((key.clone(), channel_key.to_string()));
        self.store.get_channel_subject(&key, channel_key, device_type)
    }

    /// Device channel rounded and thresholded per `quantity`.
    pub fn numeric(
        &self,
        device_type: DeviceType,
        id: u32,
        channel_key: &str,
        quantity: Quantity,
    ) -> Stream<Value> {
        self.channel(device_type, id, channel_key)
            .numeric(self.settings.filters.get(quantity))
    }

    /// Percentages are kept at one decimal and only re-emitted on change.
    pub fn percent(&self, device_type: DeviceType, id: u32, channel_key: &str) -> Stream<Value> {
        self.channel(device_type, id, channel_key)
            .round(1)
            .distinct_until_changed()
    }

    /// Discrete values (states, modes, status strings) re-emitted on change.
    pub fn discrete(&self, device_type: DeviceType, id: u32, channel_key: &str) -> Stream<Value> {
        self.channel(device_type, id, channel_key).distinct_until_changed()
    }

    /// Level of a circuit, addressed by its control id.
    pub fn circuit_level(&self, control_id: u32) -> Stream<Value> {
        self.channel(DeviceType::Circuit, control_id, channels::LEVEL)
    }

    /// `true` while a circuit's level is above zero.
    pub fn circuit_on(&self, control_id: u32) -> Stream<Value> {
        self.circuit_level(control_id)
            .level_on()
            .distinct_until_changed()
    }

    /// Looked-up channels that hold no value, as `"device/channel"`.
    pub fn unpopulated(&self) -> Vec<String> {
        self.looked_up
            .borrow()
            .iter()
            .filter(|(device, channel)| self.store.channel_value(device, channel).is_none())
            .map(|(device, channel)| format!("{}/{}", device, channel))
            .collect()
    }
}

/// Wrap each value with the time it was observed.
pub fn timestamped(stream: &Stream<Value>) -> Stream<Value> {
    stream.map(|value| {
        json!({
            "value": value,
            "timestamp": Utc::now().to_rfc3339(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use empower_core::{ManualTicker, MemoryChannelStore};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_unpopulated_tracks_lookups() {
        let store = MemoryChannelStore::new();
        let settings = EmpowerSettings::default();
        let ticker = ManualTicker::new();
        let sources = Sources::new(&store, &settings, &ticker);

        let _a = sources.channel(DeviceType::Dc, 1, channels::VOLTAGE);
        let _b = sources.channel(DeviceType::Dc, 1, channels::CURRENT);
        store.update_channel("DC.1", channels::VOLTAGE, json!(12.5));

        assert_eq!(sources.unpopulated(), vec!["DC.1/Current".to_string()]);
    }

    #[test]
    fn test_timestamped_wraps_value() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("AC.0", "ComponentStatus.1", DeviceType::Ac);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = timestamped(&stream).subscribe(move |v| sink.lock().unwrap().push(v));

        store.update_channel("AC.0", "ComponentStatus.1", json!("Connected"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["value"], json!("Connected"));
        assert!(seen[0]["timestamp"].as_str().is_some());
    }
}
