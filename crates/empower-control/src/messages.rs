//! Control envelope types.
//!
//! Requests are tagged by `Type` and carry PascalCase fields:
//! - `{"Type":"Activate","Id":7,"ThrowType":"SingleThrow"}`
//! - `{"Type":"Release","Id":7}`
//! - `{"Type":"SetAbsolute","Id":7,"Level":40}`
//!
//! Every request is answered with `{"Result":"OK"}` or another result string.

use serde::{Deserialize, Serialize};

/// Result string of a successful request.
pub const RESULT_OK: &str = "OK";

/// Which contact of a switch is thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrowType {
    SingleThrow,
    DoubleThrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum ControlRequest {
    Activate {
        #[serde(rename = "Id")]
        id: u32,
        #[serde(rename = "ThrowType")]
        throw_type: ThrowType,
    },
    Release {
        #[serde(rename = "Id")]
        id: u32,
    },
    SetAbsolute {
        #[serde(rename = "Id")]
        id: u32,
        /// Dimming level, 0 to 100.
        #[serde(rename = "Level")]
        level: u32,
    },
}

impl ControlRequest {
    /// Control id the request addresses.
    pub fn id(&self) -> u32 {
        match self {
            ControlRequest::Activate { id, .. }
            | ControlRequest::Release { id }
            | ControlRequest::SetAbsolute { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlRequest::Activate { .. } => "Activate",
            ControlRequest::Release { .. } => "Release",
            ControlRequest::SetAbsolute { .. } => "SetAbsolute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    #[serde(rename = "Result")]
    pub result: String,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            result: RESULT_OK.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == RESULT_OK
    }
}

/// What it takes to bring a circuit to a target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOperation {
    /// Already at target.
    NoOp,
    Throw(ThrowType),
}
