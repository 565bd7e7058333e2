//! Device channel store.
//!
//! The store owns one [`Subject`] per `(device_key, channel_key)` pair and the
//! mobile projection, a flat `full_id → latest value` map fed by transformed
//! streams. Both are split into an engine partition and everything else,
//! because the engine list is rebuilt independently of the main graph.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::keys::DeviceType;
use crate::path::PathPattern;
use crate::stream::{lock, Observer, Stream, Subject, Subscription};

/// One telemetry sample from the external feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub device_key: String,
    pub channel_key: String,
    pub device_type: DeviceType,
    pub value: Value,
}

impl Telemetry {
    pub fn new(
        device_type: DeviceType,
        device_key: impl Into<String>,
        channel_key: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            device_key: device_key.into(),
            channel_key: channel_key.into(),
            device_type,
            value,
        }
    }
}

/// Trait for channel store implementations.
pub trait ChannelStore: Send + Sync {
    /// Stream of a device channel: the latest value (if any) on subscribe,
    /// then every later update. Unknown keys yield a value-less stream.
    fn get_channel_subject(
        &self,
        device_key: &str,
        channel_key: &str,
        device_type: DeviceType,
    ) -> Stream<Value>;

    /// Set a channel value and fan it out to subscribers. The partition of
    /// an unseen device is inferred from the key prefix.
    fn update_channel(&self, device_key: &str, channel_key: &str, value: Value);

    /// Apply one telemetry sample with an explicit device type.
    fn push(&self, telemetry: Telemetry);

    /// Feed `stream` into the mobile slot `mobile_key`, disposing whatever
    /// fed that slot before. Disposing the returned handle releases the slot
    /// and removes its value, but only while this binding still owns it.
    fn set_subscription(&self, mobile_key: &str, stream: &Stream<Value>, is_engine: bool)
        -> Subscription;

    fn channel_value(&self, device_key: &str, channel_key: &str) -> Option<Value>;

    fn mobile_value(&self, mobile_key: &str) -> Option<Value>;

    /// Every populated mobile slot in one partition.
    fn mobile_snapshot(&self, is_engine: bool) -> BTreeMap<String, Value>;

    /// Populated mobile slots, across both partitions, matching `pattern`.
    fn mobile_matching(&self, pattern: &PathPattern) -> BTreeMap<String, Value>;

    /// Unsubscribe every binding in one partition and clear its devices and
    /// mobile slots.
    fn dispose_devices(&self, is_engine: bool);

    /// Dispose both partitions.
    fn dispose(&self);
}

// ============================================================================
// In-memory implementation
// ============================================================================

struct Binding {
    generation: u64,
    alive: Arc<AtomicBool>,
    subscription: Subscription,
}

impl Binding {
    fn release(mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.subscription.dispose();
    }
}

#[derive(Default)]
struct Partition {
    devices: HashMap<String, HashMap<String, Subject<Value>>>,
    mobile: BTreeMap<String, Value>,
    bindings: HashMap<String, Binding>,
}

impl Partition {
    fn subject(&mut self, device_key: &str, channel_key: &str) -> Subject<Value> {
        self.devices
            .entry(device_key.to_string())
            .or_default()
            .entry(channel_key.to_string())
            .or_default()
            .clone()
    }

    fn existing(&self, device_key: &str, channel_key: &str) -> Option<&Subject<Value>> {
        self.devices.get(device_key)?.get(channel_key)
    }

    /// Empty the partition, returning the bindings for release outside the lock.
    fn clear(&mut self) -> Vec<Binding> {
        for channels in self.devices.values() {
            for subject in channels.values() {
                subject.clear_observers();
            }
        }
        self.devices.clear();
        self.mobile.clear();
        self.bindings.drain().map(|(_, binding)| binding).collect()
    }
}

#[derive(Default)]
struct StoreState {
    engine: Partition,
    other: Partition,
    next_generation: u64,
}

impl StoreState {
    fn partition(&mut self, is_engine: bool) -> &mut Partition {
        if is_engine {
            &mut self.engine
        } else {
            &mut self.other
        }
    }

    /// Partition holding `device_key`, or the one its prefix implies.
    fn partition_for(&self, device_key: &str) -> bool {
        if self.engine.devices.contains_key(device_key) {
            return true;
        }
        if self.other.devices.contains_key(device_key) {
            return false;
        }
        DeviceType::from_device_key(device_key)
            .map(DeviceType::is_engine)
            .unwrap_or(false)
    }
}

/// In-memory channel store. Clones share state.
///
/// Subject callbacks never run with the store locked, so an observer may call
/// back into the store.
#[derive(Clone, Default)]
pub struct MemoryChannelStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_mobile(state: &Weak<Mutex<StoreState>>, key: &str, is_engine: bool, value: Value) {
        if let Some(state) = state.upgrade() {
            lock(&state)
                .partition(is_engine)
                .mobile
                .insert(key.to_string(), value);
        }
    }

    /// Number of live mobile bindings in one partition.
    pub fn binding_count(&self, is_engine: bool) -> usize {
        lock(&self.state).partition(is_engine).bindings.len()
    }
}

impl ChannelStore for MemoryChannelStore {
    fn get_channel_subject(
        &self,
        device_key: &str,
        channel_key: &str,
        device_type: DeviceType,
    ) -> Stream<Value> {
        let is_engine = device_type.is_engine();
        lock(&self.state)
            .partition(is_engine)
            .subject(device_key, channel_key);

        let state = Arc::downgrade(&self.state);
        let (device_key, channel_key) = (device_key.to_string(), channel_key.to_string());
        Stream::new(move |observer: Observer<Value>| {
            let Some(state) = state.upgrade() else {
                return Subscription::empty();
            };
            let subject = lock(&state)
                .partition(is_engine)
                .subject(&device_key, &channel_key);
            subject.subscribe_observer(observer)
        })
    }

    fn update_channel(&self, device_key: &str, channel_key: &str, value: Value) {
        let subject = {
            let mut state = lock(&self.state);
            let is_engine = state.partition_for(device_key);
            state.partition(is_engine).subject(device_key, channel_key)
        };
        subject.next(value);
    }

    fn push(&self, telemetry: Telemetry) {
        let subject = lock(&self.state)
            .partition(telemetry.device_type.is_engine())
            .subject(&telemetry.device_key, &telemetry.channel_key);
        subject.next(telemetry.value);
    }

    fn set_subscription(
        &self,
        mobile_key: &str,
        stream: &Stream<Value>,
        is_engine: bool,
    ) -> Subscription {
        let (generation, previous) = {
            let mut state = lock(&self.state);
            let generation = state.next_generation;
            state.next_generation += 1;
            let previous = state.partition(is_engine).bindings.remove(mobile_key);
            (generation, previous)
        };
        if let Some(previous) = previous {
            previous.release();
        }

        let alive = Arc::new(AtomicBool::new(true));
        let subscription = {
            let weak = Arc::downgrade(&self.state);
            let alive = alive.clone();
            let key = mobile_key.to_string();
            stream.subscribe(move |value| {
                if alive.load(Ordering::SeqCst) {
                    Self::write_mobile(&weak, &key, is_engine, value);
                }
            })
        };

        let displaced = lock(&self.state).partition(is_engine).bindings.insert(
            mobile_key.to_string(),
            Binding {
                generation,
                alive,
                subscription,
            },
        );
        if let Some(displaced) = displaced {
            displaced.release();
        }

        let weak = Arc::downgrade(&self.state);
        let key = mobile_key.to_string();
        Subscription::new(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let owned = {
                let mut state = lock(&state);
                let partition = state.partition(is_engine);
                let owns = partition
                    .bindings
                    .get(&key)
                    .is_some_and(|binding| binding.generation == generation);
                if owns {
                    partition.mobile.remove(&key);
                    partition.bindings.remove(&key)
                } else {
                    None
                }
            };
            if let Some(binding) = owned {
                binding.release();
            }
        })
    }

    fn channel_value(&self, device_key: &str, channel_key: &str) -> Option<Value> {
        let state = lock(&self.state);
        state
            .other
            .existing(device_key, channel_key)
            .or_else(|| state.engine.existing(device_key, channel_key))
            .and_then(|subject| subject.value())
    }

    fn mobile_value(&self, mobile_key: &str) -> Option<Value> {
        let state = lock(&self.state);
        state
            .other
            .mobile
            .get(mobile_key)
            .or_else(|| state.engine.mobile.get(mobile_key))
            .cloned()
    }

    fn mobile_snapshot(&self, is_engine: bool) -> BTreeMap<String, Value> {
        lock(&self.state).partition(is_engine).mobile.clone()
    }

    fn mobile_matching(&self, pattern: &PathPattern) -> BTreeMap<String, Value> {
        let state = lock(&self.state);
        state
            .other
            .mobile
            .iter()
            .chain(state.engine.mobile.iter())
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn dispose_devices(&self, is_engine: bool) {
        let released = lock(&self.state).partition(is_engine).clear();
        for binding in released {
            binding.release();
        }
    }

    fn dispose(&self) {
        self.dispose_devices(true);
        self.dispose_devices(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(stream: &Stream<Value>) -> (Arc<Mutex<Vec<Value>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = stream.subscribe(move |v| sink.lock().unwrap().push(v));
        (seen, sub)
    }

    #[test]
    fn test_latest_value_replay() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("DC.1", "Voltage", DeviceType::Dc);

        let (early, _a) = record(&stream);
        store.update_channel("DC.1", "Voltage", json!(12.1));
        store.update_channel("DC.1", "Voltage", json!(12.6));
        let (late, _b) = record(&stream);

        assert_eq!(*early.lock().unwrap(), vec![json!(12.1), json!(12.6)]);
        assert_eq!(*late.lock().unwrap(), vec![json!(12.6)]);
    }

    #[test]
    fn test_lookup_miss_is_value_less() {
        let store = MemoryChannelStore::new();
        let (seen, _sub) = record(&store.get_channel_subject("Tank.9", "Level", DeviceType::Tank));

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.channel_value("Tank.9", "Level"), None);

        store.update_channel("Tank.9", "Level", json!(40));
        assert_eq!(*seen.lock().unwrap(), vec![json!(40)]);
        assert_eq!(store.channel_value("Tank.9", "Level"), Some(json!(40)));
    }

    #[test]
    fn test_set_subscription_writes_mobile_slot() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("DC.1", "Voltage", DeviceType::Dc);
        let _binding = store.set_subscription("battery.1.voltage", &stream, false);

        store.update_channel("DC.1", "Voltage", json!(12.4));
        assert_eq!(store.mobile_value("battery.1.voltage"), Some(json!(12.4)));
    }

    #[test]
    fn test_rewiring_disposes_previous_binding() {
        let store = MemoryChannelStore::new();
        let old = store.get_channel_subject("DC.1", "Voltage", DeviceType::Dc);
        let new = store.get_channel_subject("DC.2", "Voltage", DeviceType::Dc);

        let _first = store.set_subscription("battery.1.voltage", &old, false);
        let _second = store.set_subscription("battery.1.voltage", &new, false);

        store.update_channel("DC.2", "Voltage", json!(13.0));
        store.update_channel("DC.1", "Voltage", json!(11.0));

        assert_eq!(store.mobile_value("battery.1.voltage"), Some(json!(13.0)));
        assert_eq!(store.binding_count(false), 1);
    }

    #[test]
    fn test_stale_handle_does_not_release_new_binding() {
        let store = MemoryChannelStore::new();
        let a = store.get_channel_subject("DC.1", "Voltage", DeviceType::Dc);
        let b = store.get_channel_subject("DC.2", "Voltage", DeviceType::Dc);

        let mut first = store.set_subscription("battery.1.voltage", &a, false);
        let _second = store.set_subscription("battery.1.voltage", &b, false);
        first.dispose();

        store.update_channel("DC.2", "Voltage", json!(12.9));
        assert_eq!(store.mobile_value("battery.1.voltage"), Some(json!(12.9)));
        assert_eq!(store.binding_count(false), 1);
    }

    #[test]
    fn test_released_binding_removes_mobile_slot() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("DC.2", "Voltage", DeviceType::Dc);
        let mut binding = store.set_subscription("battery.2.voltage", &stream, false);
        store.update_channel("DC.2", "Voltage", json!(12.5));
        assert_eq!(store.mobile_value("battery.2.voltage"), Some(json!(12.5)));

        binding.dispose();
        assert_eq!(store.mobile_value("battery.2.voltage"), None);
        assert!(store.mobile_snapshot(false).is_empty());
        // device values survive the binding
        assert_eq!(store.channel_value("DC.2", "Voltage"), Some(json!(12.5)));
    }

    #[test]
    fn test_engine_dispose_leaves_other_partition() {
        let store = MemoryChannelStore::new();
        let rpm = store.get_channel_subject("Engine.0", "Speed", DeviceType::Engine);
        let volts = store.get_channel_subject("DC.1", "Voltage", DeviceType::Dc);
        let _e = store.set_subscription("engine.0.speed", &rpm, true);
        let _d = store.set_subscription("battery.1.voltage", &volts, false);

        store.update_channel("Engine.0", "Speed", json!(1800));
        store.update_channel("DC.1", "Voltage", json!(12.5));
        store.dispose_devices(true);
        store.update_channel("Engine.0", "Speed", json!(2000));

        assert!(store.mobile_snapshot(true).is_empty());
        assert_eq!(store.mobile_value("battery.1.voltage"), Some(json!(12.5)));
        assert_eq!(store.binding_count(false), 1);
    }

    #[test]
    fn test_stream_rebinds_after_partition_dispose() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("Engine.0", "Speed", DeviceType::Engine);
        store.update_channel("Engine.0", "Speed", json!(900));
        store.dispose_devices(true);

        let (seen, _sub) = record(&stream);
        store.update_channel("Engine.0", "Speed", json!(1000));

        assert_eq!(*seen.lock().unwrap(), vec![json!(1000)]);
    }

    #[test]
    fn test_push_uses_explicit_device_type() {
        let store = MemoryChannelStore::new();
        let stream = store.get_channel_subject("Engine.1", "Status", DeviceType::Engine);
        let _binding = store.set_subscription("engine.1.status", &stream, true);

        store.push(Telemetry::new(DeviceType::Engine, "Engine.1", "Status", json!("Running")));

        assert_eq!(
            store.mobile_snapshot(true).get("engine.1.status"),
            Some(&json!("Running"))
        );
        assert!(store.mobile_snapshot(false).is_empty());
    }

    #[test]
    fn test_mobile_matching() {
        let store = MemoryChannelStore::new();
        let mut bindings = Vec::new();
        for (device, key) in [("Tank.0", "tank.0.level"), ("Tank.1", "tank.1.level")] {
            let stream = store.get_channel_subject(device, "Level", DeviceType::Tank);
            bindings.push(store.set_subscription(key, &stream, false));
            store.update_channel(device, "Level", json!(50));
        }

        let pattern = PathPattern::new("tank.*.level").unwrap();
        let matched = store.mobile_matching(&pattern);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched.get("tank.1.level"), Some(&json!(50)));
    }

    #[test]
    fn test_observer_may_reenter_store() {
        let store = MemoryChannelStore::new();
        let inner = store.clone();
        let _sub = store
            .get_channel_subject("Circuit.3", "Level", DeviceType::Circuit)
            .subscribe(move |v| inner.update_channel("Circuit.3", "Mirror", v));

        store.update_channel("Circuit.3", "Level", json!(100));
        assert_eq!(store.channel_value("Circuit.3", "Mirror"), Some(json!(100)));
    }
}
