//! # empower-core
//!
//! Core Empower data model, channel store and stream pipeline.
//!
//! This crate provides:
//! - Push-based streams and transform stages
//! - The device channel store and mobile projection
//! - Thing/Channel/Link model types
//! - N2K configuration records and pipeline settings
//!
//! This crate is runtime-agnostic and contains no async code; time enters
//! only through the [`stream::Ticker`] trait.

pub mod config;
pub mod keys;
pub mod model;
pub mod n2k;
pub mod path;
pub mod store;
pub mod stream;
pub mod transform;

pub use config::{ConfigError, ConfigStorage, EmpowerSettings, FileConfigStorage};
pub use keys::DeviceType;
pub use model::{
    AlarmKind, AlarmSetting, Channel, ChannelType, EmpowerSystem, EngineList, Link, ModelError,
    Thing, ThingType, Unit,
};
pub use store::{ChannelStore, MemoryChannelStore, Telemetry};
pub use stream::{ManualTicker, Stream, Subject, Subscription, Ticker};
