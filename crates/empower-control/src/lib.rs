//! # empower-control
//!
//! Circuit control envelopes and the two-leg actuation protocol.
//!
//! The transport that carries envelopes to the network is supplied by the
//! caller through the [`Transport`] trait.

pub mod codec;
pub mod control;
pub mod messages;

pub use codec::CodecError;
pub use control::{
    determine_circuit_control_operation, CircuitController, ControlError, Transport, TransportError,
};
pub use messages::{ControlOperation, ControlRequest, ControlResponse, ThrowType};
