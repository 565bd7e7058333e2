//! # empower-graph
//!
//! Resolves N2K configuration into the Empower Thing graph.
//!
//! This crate provides:
//! - The phased config processor and engine-list builder
//! - Thing builders per device family
//! - Alarm settings from configured limits
//! - A graph host that swaps graphs atomically on reload

pub mod alarms;
pub mod context;
pub mod error;
pub mod host;
pub mod processor;
pub mod streams;
pub mod things;

pub use error::ConfigBuildError;
pub use host::GraphHost;
pub use processor::ConfigProcessor;
