//! Empower graph model: Things, Channels, Links and alarm settings.
//!
//! A [`Thing`] is built in two steps. Construction declares channels and
//! records the stream feeding each one ([`Thing::bind`]); nothing is
//! subscribed yet. [`Thing::activate`] later installs every binding into the
//! store's mobile projection and keeps the returned handles, which
//! [`Thing::dispose`] releases.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::n2k::ConfigHeader;
use crate::path::ChannelPath;
use crate::store::ChannelStore;
use crate::stream::{Stream, Subscription};

/// Errors raised while assembling Things into a system.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Duplicate thing id: {0}")]
    DuplicateThing(String),

    #[error("Duplicate channel id: {0}")]
    DuplicateChannel(String),
}

// ============================================================================
// Channels
// ============================================================================

/// Semantic type of a channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Bool,
    Number,
    String,
    Point,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    Volts,
    Amps,
    Watts,
    Hertz,
    Celsius,
    Percent,
    Litres,
    AmpHours,
    Seconds,
    Hours,
    Rpm,
    Pascal,
    Knots,
    Degrees,
}

/// One addressable data point on a Thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub read_only: bool,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub unit: Option<Unit>,
    pub tags: Vec<String>,
}

impl Channel {
    /// A read-only channel without unit or tags.
    pub fn new(id: impl Into<String>, name: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            read_only: true,
            channel_type,
            unit: None,
            tags: Vec::new(),
        }
    }

    pub fn number(id: impl Into<String>, name: impl Into<String>, unit: Unit) -> Self {
        Self::new(id, name, ChannelType::Number).with_unit(unit)
    }

    pub fn boolean(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ChannelType::Bool)
    }

    pub fn string(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ChannelType::String)
    }

    pub fn point(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ChannelType::Point)
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

// ============================================================================
// Links
// ============================================================================

/// Directed, tag-annotated edge to another Thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub thing: String,
    pub tags: Vec<String>,
}

impl Link {
    pub fn new(thing: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            thing: thing.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

// ============================================================================
// Alarm settings
// ============================================================================

/// Which configured limit an alarm setting carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlarmKind {
    VeryLow,
    Low,
    High,
    VeryHigh,
    VeryLowVoltage,
    LowVoltage,
    HighVoltage,
    VeryHighVoltage,
}

#[derive(Debug)]
struct AlarmEntry {
    kind: AlarmKind,
    name: &'static str,
    tag: &'static str,
    severity: &'static str,
    unit: Unit,
}

static TANK_ALARMS: [AlarmEntry; 4] = [
    AlarmEntry {
        kind: AlarmKind::VeryLow,
        name: "Very Low Level",
        tag: "veryLow",
        severity: "critical",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::Low,
        name: "Low Level",
        tag: "low",
        severity: "warning",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::High,
        name: "High Level",
        tag: "high",
        severity: "warning",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::VeryHigh,
        name: "Very High Level",
        tag: "veryHigh",
        severity: "critical",
        unit: Unit::Percent,
    },
];

static BATTERY_ALARMS: [AlarmEntry; 8] = [
    AlarmEntry {
        kind: AlarmKind::VeryLow,
        name: "Very Low State of Charge",
        tag: "veryLow",
        severity: "critical",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::Low,
        name: "Low State of Charge",
        tag: "low",
        severity: "warning",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::High,
        name: "High State of Charge",
        tag: "high",
        severity: "warning",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::VeryHigh,
        name: "Very High State of Charge",
        tag: "veryHigh",
        severity: "critical",
        unit: Unit::Percent,
    },
    AlarmEntry {
        kind: AlarmKind::VeryLowVoltage,
        name: "Very Low Voltage",
        tag: "veryLowVoltage",
        severity: "critical",
        unit: Unit::Volts,
    },
    AlarmEntry {
        kind: AlarmKind::LowVoltage,
        name: "Low Voltage",
        tag: "lowVoltage",
        severity: "warning",
        unit: Unit::Volts,
    },
    AlarmEntry {
        kind: AlarmKind::HighVoltage,
        name: "High Voltage",
        tag: "highVoltage",
        severity: "warning",
        unit: Unit::Volts,
    },
    AlarmEntry {
        kind: AlarmKind::VeryHighVoltage,
        name: "Very High Voltage",
        tag: "veryHighVoltage",
        severity: "critical",
        unit: Unit::Volts,
    },
];

/// A configured alarm limit on a tank or battery.
///
/// Name, tags and metadata come from a static table per variant; kinds a
/// variant has no entry for cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmSetting {
    Tank { kind: AlarmKind, value: f64 },
    Battery { kind: AlarmKind, value: f64 },
}

impl AlarmSetting {
    pub fn tank(kind: AlarmKind, value: f64) -> Option<Self> {
        Self::lookup(&TANK_ALARMS, kind).map(|_| AlarmSetting::Tank { kind, value })
    }

    pub fn battery(kind: AlarmKind, value: f64) -> Option<Self> {
        Self::lookup(&BATTERY_ALARMS, kind).map(|_| AlarmSetting::Battery { kind, value })
    }

    fn lookup(table: &'static [AlarmEntry], kind: AlarmKind) -> Option<&'static AlarmEntry> {
        table.iter().find(|entry| entry.kind == kind)
    }

    fn entry(&self) -> Option<&'static AlarmEntry> {
        match self {
            AlarmSetting::Tank { kind, .. } => Self::lookup(&TANK_ALARMS, *kind),
            AlarmSetting::Battery { kind, .. } => Self::lookup(&BATTERY_ALARMS, *kind),
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            AlarmSetting::Tank { .. } => "tank",
            AlarmSetting::Battery { .. } => "battery",
        }
    }

    pub fn kind(&self) -> AlarmKind {
        match self {
            AlarmSetting::Tank { kind, .. } | AlarmSetting::Battery { kind, .. } => *kind,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            AlarmSetting::Tank { value, .. } | AlarmSetting::Battery { value, .. } => *value,
        }
    }

    pub fn name(&self) -> &'static str {
        self.entry().map(|e| e.name).unwrap_or_default()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags = vec![format!("empower:{}.alarm", self.scope())];
        if let Some(entry) = self.entry() {
            tags.push(format!("empower:alarm.{}", entry.tag));
        }
        tags
    }

    pub fn metadata(&self) -> BTreeMap<String, Value> {
        let mut metadata = BTreeMap::new();
        if let Some(entry) = self.entry() {
            metadata.insert("severity".to_string(), Value::from(entry.severity));
            let unit = serde_json::to_value(entry.unit).unwrap_or(Value::Null);
            metadata.insert("unit".to_string(), unit);
        }
        metadata
    }
}

impl Serialize for AlarmSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("AlarmSetting", 6)?;
        s.serialize_field("type", self.scope())?;
        s.serialize_field("limit", &self.kind())?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("value", &self.value())?;
        s.serialize_field("tags", &self.tags())?;
        s.serialize_field("metadata", &self.metadata())?;
        s.end()
    }
}

// ============================================================================
// Things
// ============================================================================

/// Kind of Thing; also the first segment of its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThingType {
    Hub,
    Inverter,
    Charger,
    Battery,
    Gnss,
    ShorePower,
    AcMeterInverter,
    AcMeterCharger,
    Tank,
    WaterPump,
    BilgePump,
    Light,
    GenericPowerSwitch,
    Climate,
    Engine,
}

impl ThingType {
    pub fn prefix(self) -> &'static str {
        match self {
            ThingType::Hub => "hub",
            ThingType::Inverter => "inverter",
            ThingType::Charger => "charger",
            ThingType::Battery => "battery",
            ThingType::Gnss => "gnss",
            ThingType::ShorePower => "shorePower",
            ThingType::AcMeterInverter => "acMeterInverter",
            ThingType::AcMeterCharger => "acMeterCharger",
            ThingType::Tank => "tank",
            ThingType::WaterPump => "waterPump",
            ThingType::BilgePump => "bilgePump",
            ThingType::Light => "light",
            ThingType::GenericPowerSwitch => "genericPowerSwitch",
            ThingType::Climate => "climate",
            ThingType::Engine => "engine",
        }
    }

    /// `"{type}.{instance}"`.
    pub fn thing_id(self, instance: u32) -> String {
        format!("{}.{}", self.prefix(), instance)
    }
}

/// A semantic device node.
#[derive(Debug, Serialize)]
pub struct Thing {
    pub id: String,
    #[serde(rename = "type")]
    pub thing_type: ThingType,
    pub name: String,
    pub metadata: BTreeMap<String, Value>,
    pub categories: Vec<String>,
    pub channels: BTreeMap<String, Channel>,
    pub links: Vec<Link>,
    #[serde(rename = "settings")]
    pub alarm_settings: Vec<AlarmSetting>,

    #[serde(skip)]
    bindings: Vec<(String, Stream<Value>)>,
    #[serde(skip)]
    subscriptions: Vec<Subscription>,
    #[serde(skip)]
    disposed: bool,
}

impl Thing {
    pub fn new(thing_type: ThingType, instance: u32, name: impl Into<String>) -> Self {
        Self {
            id: thing_type.thing_id(instance),
            thing_type,
            name: name.into(),
            metadata: BTreeMap::new(),
            categories: Vec::new(),
            channels: BTreeMap::new(),
            links: Vec::new(),
            alarm_settings: Vec::new(),
            bindings: Vec::new(),
            subscriptions: Vec::new(),
            disposed: false,
        }
    }

    /// Engine Things write to the engine partition of the mobile projection.
    pub fn is_engine(&self) -> bool {
        self.thing_type == ThingType::Engine
    }

    /// Full id of one of this Thing's channels.
    pub fn full_id(&self, channel_id: &str) -> String {
        ChannelPath::new(&self.id, channel_id).to_string()
    }

    /// Register `channel` and return its full id. The semantic tag
    /// `empower:{type}.{channel}` is added first.
    pub fn define_channel(&mut self, mut channel: Channel) -> Result<String, ModelError> {
        let full_id = self.full_id(&channel.id);
        if self.channels.contains_key(&full_id) {
            return Err(ModelError::DuplicateChannel(full_id));
        }
        channel
            .tags
            .insert(0, format!("empower:{}.{}", self.thing_type.prefix(), channel.id));
        self.channels.insert(full_id.clone(), channel);
        Ok(full_id)
    }

    /// Define `channel` and record the stream that feeds it.
    pub fn bind(&mut self, channel: Channel, stream: Stream<Value>) -> Result<String, ModelError> {
        let full_id = self.define_channel(channel)?;
        self.bindings.push((full_id.clone(), stream));
        Ok(full_id)
    }

    /// Install every binding into the mobile projection. Re-activating
    /// replaces the previous subscriptions; a disposed Thing stays inert.
    pub fn activate(&mut self, store: &dyn ChannelStore) {
        if self.disposed {
            return;
        }
        for mut subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
        let is_engine = self.is_engine();
        self.subscriptions = self
            .bindings
            .iter()
            .map(|(full_id, stream)| store.set_subscription(full_id, stream, is_engine))
            .collect();
    }

    /// Release every subscription and clear the channel registry. Only the
    /// first call has an effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for mut subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
        self.bindings.clear();
        self.channels.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// The stream recorded for a channel, by channel id.
    pub fn binding(&self, channel_id: &str) -> Option<&Stream<Value>> {
        let full_id = self.full_id(channel_id);
        self.bindings
            .iter()
            .find(|(id, _)| *id == full_id)
            .map(|(_, stream)| stream)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.get(&self.full_id(channel_id))
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn add_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn add_alarm(&mut self, setting: AlarmSetting) {
        self.alarm_settings.push(setting);
    }

    pub fn has_link_to(&self, thing_id: &str) -> bool {
        self.links.iter().any(|l| l.thing == thing_id)
    }
}

// ============================================================================
// Thing collections
// ============================================================================

/// Ordered Things with system-wide unique thing and channel ids.
#[derive(Debug, Default)]
struct ThingSet {
    things: Vec<Thing>,
    ids: HashSet<String>,
    channel_ids: HashSet<String>,
}

impl ThingSet {
    fn add(&mut self, thing: Thing) -> Result<(), ModelError> {
        if self.ids.contains(&thing.id) {
            return Err(ModelError::DuplicateThing(thing.id));
        }
        if let Some(dup) = thing.channels.keys().find(|id| self.channel_ids.contains(*id)) {
            return Err(ModelError::DuplicateChannel(dup.clone()));
        }
        self.ids.insert(thing.id.clone());
        self.channel_ids.extend(thing.channels.keys().cloned());
        self.things.push(thing);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<&Thing> {
        self.things.iter().find(|t| t.id == id)
    }

    fn activate(&mut self, store: &dyn ChannelStore) {
        for thing in &mut self.things {
            thing.activate(store);
        }
    }

    fn dispose(&mut self) {
        for thing in &mut self.things {
            thing.dispose();
        }
    }
}

impl Serialize for ThingSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.things)
    }
}

/// The processor's output: every Thing of one configuration.
#[derive(Debug, Default, Serialize)]
pub struct EmpowerSystem {
    pub metadata: ConfigHeader,
    things: ThingSet,
}

impl EmpowerSystem {
    pub fn new(metadata: ConfigHeader) -> Self {
        Self {
            metadata,
            things: ThingSet::default(),
        }
    }

    /// Append a Thing, rejecting duplicate thing or channel ids.
    pub fn add_thing(&mut self, thing: Thing) -> Result<(), ModelError> {
        self.things.add(thing)
    }

    pub fn things(&self) -> &[Thing] {
        &self.things.things
    }

    pub fn thing(&self, id: &str) -> Option<&Thing> {
        self.things.get(id)
    }

    pub fn things_of(&self, thing_type: ThingType) -> impl Iterator<Item = &Thing> {
        self.things().iter().filter(move |t| t.thing_type == thing_type)
    }

    pub fn len(&self) -> usize {
        self.things.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.things.is_empty()
    }

    pub fn activate(&mut self, store: &dyn ChannelStore) {
        self.things.activate(store);
    }

    pub fn dispose(&mut self) {
        self.things.dispose();
    }
}

/// Engine Things, built and replaced independently of the main system.
#[derive(Debug, Default, Serialize)]
pub struct EngineList {
    engines: ThingSet,
}

impl EngineList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thing(&mut self, thing: Thing) -> Result<(), ModelError> {
        self.engines.add(thing)
    }

    pub fn things(&self) -> &[Thing] {
        &self.engines.things
    }

    pub fn thing(&self, id: &str) -> Option<&Thing> {
        self.engines.get(id)
    }

    pub fn len(&self) -> usize {
        self.engines.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.things.is_empty()
    }

    pub fn activate(&mut self, store: &dyn ChannelStore) {
        self.engines.activate(store);
    }

    pub fn dispose(&mut self) {
        self.engines.dispose();
    }
}
