//! Two-leg circuit actuation over an abstract transport.
//!
//! Every actuation is an action leg (`Activate` or `SetAbsolute`) followed,
//! after a settle interval, by a `Release` leg. The release leg is only sent
//! when the action leg succeeded. Transport failures and non-OK results are
//! reported as `false`; nothing is retried.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use empower_core::config::ControlSettings;
use empower_core::keys::{channels, device_key, DeviceType};
use empower_core::n2k::{Circuit, SwitchType};
use empower_core::ChannelStore;

use crate::codec::{decode_response, encode_request};
use crate::messages::{ControlOperation, ControlRequest, ThrowType};

/// Failure at the transport seam. Logged, then reported as `false`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error(
        "Circuit {circuit} with switch type {switch_type:?} cannot be switched {}",
        direction(.target_on)
    )]
    Rejected {
        circuit: u32,
        switch_type: SwitchType,
        target_on: bool,
    },
}

fn direction(target_on: &bool) -> &'static str {
    if *target_on {
        "on"
    } else {
        "off"
    }
}

/// Carries one encoded request and returns the encoded response.
pub trait Transport: Send + Sync {
    fn send(&self, payload: String) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Pick the operation that brings `circuit` from its current state to
/// `target_on`.
///
/// Complemented circuits always throw: single for ON, double for OFF. Other
/// circuits must have a switch type that can drive the requested direction.
pub fn determine_circuit_control_operation(
    circuit: &Circuit,
    current_is_on: bool,
    target_on: bool,
) -> Result<ControlOperation, ControlError> {
    if current_is_on == target_on {
        return Ok(ControlOperation::NoOp);
    }

    if circuit.has_complement {
        let throw = if target_on {
            ThrowType::SingleThrow
        } else {
            ThrowType::DoubleThrow
        };
        return Ok(ControlOperation::Throw(throw));
    }

    let switch_type = circuit.switch_type;
    let rejected = !switch_type.is_controllable()
        || (switch_type.is_on_only() && !target_on)
        || (switch_type.is_off_only() && target_on);
    if rejected {
        return Err(ControlError::Rejected {
            circuit: circuit.control_id,
            switch_type,
            target_on,
        });
    }
    Ok(ControlOperation::Throw(ThrowType::SingleThrow))
}

pub struct CircuitController<T> {
    transport: T,
    settle: Duration,
}

impl<T: Transport> CircuitController<T> {
    pub fn new(transport: T, settings: &ControlSettings) -> Self {
        Self {
            transport,
            settle: settings.settle_interval(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settle_interval(&self) -> Duration {
        self.settle
    }

    /// Throw a switch, then release it.
    pub async fn control_circuit_switch(&self, id: u32, throw_type: ThrowType) -> bool {
        self.two_leg(ControlRequest::Activate { id, throw_type }).await
    }

    /// Set a dimming level, then release.
    pub async fn control_circuit_level(&self, id: u32, level: u32) -> bool {
        self.two_leg(ControlRequest::SetAbsolute { id, level }).await
    }

    async fn two_leg(&self, action: ControlRequest) -> bool {
        let id = action.id();
        if !self.send_and_check(&action).await {
            debug!("{} of circuit {} failed, not releasing", action.kind(), id);
            return false;
        }
        tokio::time::sleep(self.settle).await;
        self.send_and_check(&ControlRequest::Release { id }).await
    }

    /// Send one request. True only for an `OK` result.
    pub async fn send_and_check(&self, request: &ControlRequest) -> bool {
        let payload = match encode_request(request) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        let response = match self.transport.send(payload).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} of circuit {} not sent: {}", request.kind(), request.id(), e);
                return false;
            }
        };

        match decode_response(&response) {
            Ok(response) if response.is_ok() => true,
            Ok(response) => {
                debug!(
                    "{} of circuit {} answered '{}'",
                    request.kind(),
                    request.id(),
                    response.result
                );
                false
            }
            Err(e) => {
                warn!("{} of circuit {}: {}", request.kind(), request.id(), e);
                false
            }
        }
    }

    /// Switch `circuit` on or off, reading its current level from `store`.
    /// A circuit already at target is not touched and reports success.
    pub async fn set_circuit_power(
        &self,
        circuit: &Circuit,
        store: &dyn ChannelStore,
        target_on: bool,
    ) -> Result<bool, ControlError> {
        let current_is_on = store
            .channel_value(
                &device_key(DeviceType::Circuit, circuit.control_id),
                channels::LEVEL,
            )
            .and_then(|level| level.as_f64())
            .is_some_and(|level| level > 0.0);

        match determine_circuit_control_operation(circuit, current_is_on, target_on)? {
            ControlOperation::NoOp => Ok(true),
            ControlOperation::Throw(throw_type) => {
                Ok(self.control_circuit_switch(circuit.control_id, throw_type).await)
            }
        }
    }
}
